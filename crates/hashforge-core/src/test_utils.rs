//! Shared test helpers for unit tests, integration tests and the example.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`.

use crate::catalog::StaticCatalog;
use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::equipment::EquipmentType;
use crate::state::PlayerState;
use crate::store::MemoryStore;

// ===========================================================================
// Catalogs
// ===========================================================================

/// Built-in content without headlines, so the market never bends production.
pub fn quiet_catalog() -> StaticCatalog {
    StaticCatalog {
        headlines: Vec::new(),
        ..StaticCatalog::builtin()
    }
}

// ===========================================================================
// Engines
// ===========================================================================

/// Default seed, no chaos rolls, built-in catalog, empty store.
pub fn calm_engine() -> Engine {
    Engine::new(EngineConfig::default().calm(), StaticCatalog::builtin(), MemoryStore::new())
        .expect("memory store accepts a fresh record")
}

/// Every rate is exactly what the fleet produces.
pub fn quiet_engine() -> Engine {
    quiet_engine_with(&[])
}

/// A quiet engine whose store already holds `equipment`.
pub fn quiet_engine_with(equipment: &[(EquipmentType, u32)]) -> Engine {
    quiet_engine_on(store_with(equipment))
}

/// A quiet engine plus a handle on its store.
pub fn quiet_engine_with_store() -> (Engine, MemoryStore) {
    let store = MemoryStore::new();
    (quiet_engine_on(store.clone()), store)
}

pub fn quiet_engine_on(store: MemoryStore) -> Engine {
    Engine::new(EngineConfig::default().calm(), quiet_catalog(), store)
        .expect("memory store loads")
}

/// Full chaos and headlines with a chosen seed.
pub fn engine_with_seed(seed: u64) -> Engine {
    Engine::new(EngineConfig::with_seed(seed), StaticCatalog::builtin(), MemoryStore::new())
        .expect("memory store accepts a fresh record")
}

/// Start at wall-clock 0 and hand the engine back.
pub fn started(mut engine: Engine) -> Engine {
    engine.start(0);
    engine
}

// ===========================================================================
// Stores
// ===========================================================================

/// A store holding a fresh record synced at 0 and `equipment`.
pub fn store_with(equipment: &[(EquipmentType, u32)]) -> MemoryStore {
    MemoryStore::with_state(PlayerState::new(0), equipment).expect("save file encodes")
}
