//! Serde data file structs for game content.
//!
//! These define the on-disk format for equipment overrides, the tech tree,
//! narrative dilemmas, headlines, flavor lines and faction perks. They are
//! deserialized from RON, JSON or TOML and then resolved into catalog types
//! by the loader.

use hashforge_core::equipment::EquipmentType;
use hashforge_core::faction::{Faction, FactionPerks};
use hashforge_core::narrative::Effect;
use serde::Deserialize;

// ===========================================================================
// Equipment
// ===========================================================================

/// Overrides for one built-in equipment spec. Absent fields keep the
/// built-in value.
#[derive(Debug, Clone, Deserialize)]
pub struct EquipmentData {
    pub equipment: EquipmentType,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub hash_rate: Option<f64>,
    #[serde(default)]
    pub power_kw: Option<f64>,
    #[serde(default)]
    pub heat: Option<f64>,
    #[serde(default)]
    pub grid_kw: Option<f64>,
    #[serde(default)]
    pub thermal_buffer: Option<f64>,
    #[serde(default)]
    pub is_generator: Option<bool>,
    #[serde(default)]
    pub efficiency_bonus: Option<f64>,
    #[serde(default)]
    pub base_cost: Option<f64>,
    #[serde(default)]
    pub cost_growth: Option<f64>,
}

// ===========================================================================
// Tech tree
// ===========================================================================

/// A tech node. Ids are assigned in file order starting at 1; prerequisites
/// refer to earlier nodes by name.
#[derive(Debug, Clone, Deserialize)]
pub struct TechData {
    pub name: String,
    pub cost: f64,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub prestige_multiplier: f64,
    #[serde(default)]
    pub production_bonus: f64,
    #[serde(default)]
    pub security_bonus: f64,
}

// ===========================================================================
// Narrative
// ===========================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct NarrativeData {
    pub id: u32,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default = "first_stage")]
    pub min_stage: u32,
    #[serde(default)]
    pub max_stage: Option<u32>,
    #[serde(default)]
    pub one_time: bool,
    #[serde(default)]
    pub requires_faction: Option<Faction>,
    pub options: Vec<OptionData>,
}

fn first_stage() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptionData {
    pub label: String,
    #[serde(default)]
    pub effects: Vec<Effect>,
}

// ===========================================================================
// Market and flavor
// ===========================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct HeadlineData {
    pub text: String,
    #[serde(default = "one")]
    pub sell_multiplier: f64,
    #[serde(default = "one")]
    pub production_multiplier: f64,
}

fn one() -> f64 {
    1.0
}

/// Flavor lines for every stage from `stage` up to the next entry.
#[derive(Debug, Clone, Deserialize)]
pub struct FlavorData {
    pub stage: u32,
    pub lines: Vec<String>,
}

// ===========================================================================
// Factions
// ===========================================================================

/// Perks for one faction. Absent perk fields are neutral.
#[derive(Debug, Clone, Deserialize)]
pub struct FactionData {
    pub faction: Faction,
    #[serde(default)]
    pub perks: FactionPerks,
}

// ===========================================================================
// Tests
// ===========================================================================
