//! Factions and the per-faction perk table.
//!
//! A faction is chosen on ascension and bends several formulas at once. All
//! of those coefficients live in one [`FactionPerks`] record per faction so a
//! data file can rebalance them without touching the formulas.

use crate::equipment::EquipmentType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A mutually exclusive progression branch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    #[default]
    Unaligned,
    /// Grid-scale operators: bigger grid, market shield.
    Corporate,
    /// Privacy hackers: production bonus, hard to attack.
    Cypherpunk,
    /// Post-human rigs: heat resistant, immune to purge side effects.
    Singularity,
}

impl Faction {
    pub const ALL: [Faction; 4] = [
        Faction::Unaligned,
        Faction::Corporate,
        Faction::Cypherpunk,
        Faction::Singularity,
    ];
}

/// Coefficients a faction applies to the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactionPerks {
    /// Production multiplier.
    pub production_bonus: f64,
    /// Multiplier on total power draw.
    pub power_multiplier: f64,
    /// Multiplier on the equipment part of grid capacity.
    pub capacity_multiplier: f64,
    /// Per-type multiplier on base power draw.
    pub power_discounts: BTreeMap<EquipmentType, f64>,
    /// Chance an overload does not trip the breaker.
    pub breaker_save_chance: f64,
    /// Scale on the 51% attack chance.
    pub attack_chance_scale: f64,
    /// Scale on integrity loss above the critical heat line.
    pub integrity_decay_scale: f64,
    /// Exempt from the post-purge cooling penalty and the purge power spike.
    pub purge_shielded: bool,
    /// Bearish headlines cannot push the sell rate below baseline.
    pub market_immune: bool,
    /// Fraction of any bearish production penalty that is waived.
    pub market_discount: f64,
}

impl Default for FactionPerks {
    fn default() -> Self {
        Self {
            production_bonus: 1.0,
            power_multiplier: 1.0,
            capacity_multiplier: 1.0,
            power_discounts: BTreeMap::new(),
            breaker_save_chance: 0.0,
            attack_chance_scale: 1.0,
            integrity_decay_scale: 1.0,
            purge_shielded: false,
            market_immune: false,
            market_discount: 0.0,
        }
    }
}

impl FactionPerks {
    /// Power discount for one equipment type (1.0 when none applies).
    pub fn discount(&self, ty: EquipmentType) -> f64 {
        self.power_discounts.get(&ty).copied().unwrap_or(1.0)
    }

    /// Whether this faction resists heat damage.
    pub fn heat_resistant(&self) -> bool {
        self.integrity_decay_scale < 1.0
    }
}

/// Perks for every faction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerkTable {
    perks: BTreeMap<Faction, FactionPerks>,
}

impl PerkTable {
    /// The built-in balance.
    pub fn builtin() -> Self {
        let mut perks = BTreeMap::new();
        perks.insert(Faction::Unaligned, FactionPerks::default());
        perks.insert(
            Faction::Corporate,
            FactionPerks {
                capacity_multiplier: 1.25,
                power_multiplier: 0.9,
                power_discounts: BTreeMap::from([(EquipmentType::AsicMiner, 0.8)]),
                market_immune: true,
                ..FactionPerks::default()
            },
        );
        perks.insert(
            Faction::Cypherpunk,
            FactionPerks {
                production_bonus: 1.15,
                attack_chance_scale: 0.5,
                market_discount: 0.5,
                ..FactionPerks::default()
            },
        );
        perks.insert(
            Faction::Singularity,
            FactionPerks {
                power_multiplier: 1.1,
                breaker_save_chance: 0.25,
                integrity_decay_scale: 0.5,
                purge_shielded: true,
                ..FactionPerks::default()
            },
        );
        Self { perks }
    }

    /// Perks for `faction`. Factions missing from a loaded table fall back to
    /// neutral perks.
    pub fn get(&self, faction: Faction) -> FactionPerks {
        self.perks.get(&faction).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, faction: Faction, perks: FactionPerks) {
        self.perks.insert(faction, perks);
    }
}

impl Default for PerkTable {
    fn default() -> Self {
        Self::builtin()
    }
}
