//! Drive a short headless session and print what happened.
//!
//! ```sh
//! RUST_LOG=hashforge_core=debug cargo run -p hashforge-core --example headless_session
//! ```

use hashforge_core::catalog::StaticCatalog;
use hashforge_core::command_queue::Command;
use hashforge_core::config::EngineConfig;
use hashforge_core::engine::Engine;
use hashforge_core::equipment::EquipmentType;
use hashforge_core::event::EventKind;
use hashforge_core::fixed::SECOND;
use hashforge_core::store::MemoryStore;
use std::cell::Cell;
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let store = MemoryStore::new();
    let mut engine = Engine::new(EngineConfig::with_seed(42), StaticCatalog::builtin(), store.clone())?;

    let encounters = Rc::new(Cell::new(0u32));
    let counter = encounters.clone();
    engine.on_event(EventKind::EncounterStarted, move |_| counter.set(counter.get() + 1));

    engine.start(0);

    // Hand-mine until the first GPU is affordable, then sell and buy.
    for _ in 0..60 {
        engine.execute(Command::Train)?;
    }
    let hashes = engine.state().hashes;
    engine.execute(Command::Convert { hashes })?;
    engine.debug_grant_credits(200.0);
    engine.execute(Command::BuyEquipment(EquipmentType::RefurbishedGpu))?;
    engine.execute(Command::BuyEquipment(EquipmentType::BoxFan))?;

    for minute in 1..=10 {
        engine.advance(60 * SECOND);
        let m = engine.metrics();
        println!(
            "[{minute:>2}m] hashes {:>8.1}  credits {:>8.2}  heat {:>5.1}%  draw {:>5.1} kW  stage {}",
            m.hashes, m.credits, m.heat, m.rates.power_draw, m.story_stage
        );
        if m.hashes > 10.0 {
            engine.submit(Command::Convert { hashes: m.hashes });
        }
    }

    engine.stop()?;
    println!("{} encounters rolled, {} store writes", encounters.get(), store.revision());
    for line in engine.terminal().iter().take(10) {
        println!("  {:?} {}", line.level, line.text);
    }
    Ok(())
}
