//! Hashforge Core -- the simulation engine for an idle crypto-mining game.
//!
//! A player record, an equipment fleet and a set of timed loops that mine,
//! heat, draw power, move the market, roll chaos encounters and advance the
//! story. The engine is headless: a front end drives it with commands and
//! reads back metrics, terminal lines and events.
//!
//! # Time
//!
//! The engine runs on a logical millisecond clock. [`engine::Engine::advance`]
//! moves it forward, running every task and timer that falls due in order:
//!
//! 1. **Commands** -- Queued commands are executed in submission order.
//! 2. **Tasks** -- Periodic loops (production, thermal, power, market, chaos,
//!    narrative, autosave) run at their cadence. A failing task is logged and
//!    the loop continues.
//! 3. **Timers** -- One-shot timers (encounter timeouts, upload steps) fire.
//!    A task and a timer due at the same instant run task first.
//! 4. **Delivery** -- Events emitted by each task, timer or command are
//!    delivered to listeners before the next one runs.
//!
//! Wall-clock seconds only enter through [`engine::Engine::start`] and the
//! foreground/background hooks, which credit offline earnings.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut engine = Engine::new(EngineConfig::default(), StaticCatalog::builtin(), MemoryStore::new())?;
//! engine.start(now_secs);
//! engine.execute(Command::Train)?;
//! engine.advance(SECOND);
//! println!("{:.0} hashes", engine.metrics().hashes);
//! ```
//!
//! # Key Types
//!
//! - [`engine::Engine`] -- Owns the state and runs the loops.
//! - [`command_queue::Command`] -- Every player transaction.
//! - [`state::PlayerState`] -- The persisted record.
//! - [`equipment::Fleet`] -- Owned units per equipment type.
//! - [`rates`] -- Pure rate calculations over the fleet and modifiers.
//! - [`catalog::Catalog`] -- Static content: specs, tech, dilemmas, headlines.
//! - [`store::StateStore`] -- Durable storage with change notification.
//! - [`event::EventBus`] -- Buffered events with passive listeners.

pub mod actions;
pub mod catalog;
pub mod chaos;
pub mod command_queue;
pub mod config;
pub mod dirty;
pub mod engine;
pub mod equipment;
pub mod error;
pub mod event;
pub mod faction;
pub mod fixed;
pub mod id;
pub mod market;
pub mod narrative;
pub mod offline;
pub mod progression;
pub mod rates;
pub mod rng;
pub mod serialize;
pub mod sim;
pub mod state;
pub mod store;
pub mod thermal;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
