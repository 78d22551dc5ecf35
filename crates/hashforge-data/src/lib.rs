//! Hashforge Data -- loads game content and engine tunables from RON, TOML
//! or JSON files.
//!
//! A data directory may hold any of `engine`, `equipment`, `tech_tree`,
//! `narrative`, `headlines`, `flavor` and `factions`, each in one format.
//! Missing files fall back to the built-in content.

pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, GameData, load_catalog, load_game_data};
