//! Equipment types, their static specs, and the owned-count ledger.
//!
//! Every [`EquipmentType`] maps to exactly one [`EquipmentSpec`] in an
//! [`EquipmentTable`]. The table is built from the exhaustive match in
//! [`builtin_spec`], so adding a variant without a spec fails to compile.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::{Index, IndexMut};

// ---------------------------------------------------------------------------
// Equipment type
// ---------------------------------------------------------------------------

/// A kind of equipment the player can own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentType {
    // -- Producers --
    RefurbishedGpu,
    GamingRig,
    AsicMiner,
    ImmersionTank,
    QuantumRig,
    // -- Cooling --
    BoxFan,
    AcUnit,
    LiquidChiller,
    HeatSinkArray,
    // -- Power --
    SmartPdu,
    GridUpgrade,
    SolarArray,
    DieselGenerator,
}

impl EquipmentType {
    pub const COUNT: usize = 13;

    /// Every variant in declaration order.
    pub const ALL: [EquipmentType; Self::COUNT] = [
        EquipmentType::RefurbishedGpu,
        EquipmentType::GamingRig,
        EquipmentType::AsicMiner,
        EquipmentType::ImmersionTank,
        EquipmentType::QuantumRig,
        EquipmentType::BoxFan,
        EquipmentType::AcUnit,
        EquipmentType::LiquidChiller,
        EquipmentType::HeatSinkArray,
        EquipmentType::SmartPdu,
        EquipmentType::GridUpgrade,
        EquipmentType::SolarArray,
        EquipmentType::DieselGenerator,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// Spec
// ---------------------------------------------------------------------------

/// Static attributes of one equipment type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentSpec {
    /// Display name.
    pub name: String,
    /// Hashes per second per unit, before modifiers.
    #[serde(default)]
    pub hash_rate: f64,
    /// Base power draw per unit in kW.
    #[serde(default)]
    pub power_kw: f64,
    /// Heat units per second per unit. Negative for cooling.
    #[serde(default)]
    pub heat: f64,
    /// Grid capacity contributed per unit in kW.
    #[serde(default)]
    pub grid_kw: f64,
    /// Thermal buffer contributed per unit.
    #[serde(default)]
    pub thermal_buffer: f64,
    /// Whether `grid_kw` is self-generated power.
    #[serde(default)]
    pub is_generator: bool,
    /// Fraction of total draw saved per unit (summed, capped at 0.60).
    #[serde(default)]
    pub efficiency_bonus: f64,
    /// Price of the first unit in credits.
    pub base_cost: f64,
    /// Price growth factor per owned unit.
    #[serde(default = "default_cost_growth")]
    pub cost_growth: f64,
}

fn default_cost_growth() -> f64 {
    1.15
}

impl EquipmentSpec {
    /// Whether owning this type adds heat. Meltdowns only destroy these.
    pub fn produces_heat(&self) -> bool {
        self.heat > 0.0
    }

    /// Price of the next unit when `owned` are already owned.
    pub fn price(&self, owned: u32) -> f64 {
        self.base_cost * self.cost_growth.powi(owned as i32)
    }

    /// Refund for selling one unit when `owned` are owned (half the price the
    /// most recent unit cost). Zero when nothing is owned.
    pub fn refund(&self, owned: u32) -> f64 {
        if owned == 0 {
            return 0.0;
        }
        self.price(owned - 1) * 0.5
    }
}

fn spec(name: &str, base_cost: f64) -> EquipmentSpec {
    EquipmentSpec {
        name: name.to_string(),
        hash_rate: 0.0,
        power_kw: 0.0,
        heat: 0.0,
        grid_kw: 0.0,
        thermal_buffer: 0.0,
        is_generator: false,
        efficiency_bonus: 0.0,
        base_cost,
        cost_growth: default_cost_growth(),
    }
}

/// The built-in spec for `ty`.
pub fn builtin_spec(ty: EquipmentType) -> EquipmentSpec {
    use EquipmentType::*;
    match ty {
        RefurbishedGpu => EquipmentSpec {
            hash_rate: 1.0,
            power_kw: 5.0,
            heat: 0.8,
            ..spec("Refurbished GPU", 50.0)
        },
        GamingRig => EquipmentSpec {
            hash_rate: 6.0,
            power_kw: 18.0,
            heat: 2.5,
            ..spec("Gaming Rig", 600.0)
        },
        AsicMiner => EquipmentSpec {
            hash_rate: 40.0,
            power_kw: 60.0,
            heat: 8.0,
            ..spec("ASIC Miner", 7_500.0)
        },
        ImmersionTank => EquipmentSpec {
            hash_rate: 220.0,
            power_kw: 150.0,
            heat: 6.0,
            thermal_buffer: 50.0,
            ..spec("Immersion Tank", 90_000.0)
        },
        QuantumRig => EquipmentSpec {
            hash_rate: 1_500.0,
            power_kw: 600.0,
            heat: 30.0,
            ..spec("Quantum Rig", 1_500_000.0)
        },
        BoxFan => EquipmentSpec {
            power_kw: 1.0,
            heat: -1.5,
            ..spec("Box Fan", 40.0)
        },
        AcUnit => EquipmentSpec {
            power_kw: 12.0,
            heat: -6.0,
            ..spec("AC Unit", 900.0)
        },
        LiquidChiller => EquipmentSpec {
            power_kw: 35.0,
            heat: -25.0,
            thermal_buffer: 40.0,
            ..spec("Liquid Chiller", 15_000.0)
        },
        HeatSinkArray => EquipmentSpec {
            thermal_buffer: 100.0,
            ..spec("Heat Sink Array", 2_000.0)
        },
        SmartPdu => EquipmentSpec {
            power_kw: 0.5,
            efficiency_bonus: 0.05,
            ..spec("Smart PDU", 3_000.0)
        },
        GridUpgrade => EquipmentSpec {
            grid_kw: 100.0,
            ..spec("Grid Upgrade", 5_000.0)
        },
        SolarArray => EquipmentSpec {
            grid_kw: 25.0,
            is_generator: true,
            ..spec("Solar Array", 4_000.0)
        },
        DieselGenerator => EquipmentSpec {
            grid_kw: 80.0,
            heat: 3.0,
            is_generator: true,
            ..spec("Diesel Generator", 12_000.0)
        },
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Closed map from every [`EquipmentType`] to its spec.
#[derive(Debug, Clone, PartialEq)]
pub struct EquipmentTable {
    specs: Vec<EquipmentSpec>,
}

impl EquipmentTable {
    /// The built-in specs for every type.
    pub fn builtin() -> Self {
        Self {
            specs: EquipmentType::ALL.iter().map(|&t| builtin_spec(t)).collect(),
        }
    }

    pub fn get(&self, ty: EquipmentType) -> &EquipmentSpec {
        &self.specs[ty.index()]
    }

    /// Replace the spec for `ty`.
    pub fn set(&mut self, ty: EquipmentType, spec: EquipmentSpec) {
        self.specs[ty.index()] = spec;
    }

    pub fn iter(&self) -> impl Iterator<Item = (EquipmentType, &EquipmentSpec)> {
        EquipmentType::ALL.iter().map(move |&t| (t, self.get(t)))
    }
}

impl Default for EquipmentTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Index<EquipmentType> for EquipmentTable {
    type Output = EquipmentSpec;

    fn index(&self, ty: EquipmentType) -> &EquipmentSpec {
        self.get(ty)
    }
}

impl IndexMut<EquipmentType> for EquipmentTable {
    fn index_mut(&mut self, ty: EquipmentType) -> &mut EquipmentSpec {
        &mut self.specs[ty.index()]
    }
}

// ---------------------------------------------------------------------------
// Fleet (owned counts)
// ---------------------------------------------------------------------------

/// Owned count per equipment type. Every type is always present; counts are
/// never negative and entries are never removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fleet {
    counts: BTreeMap<EquipmentType, u32>,
}

impl Default for Fleet {
    fn default() -> Self {
        Self::new()
    }
}

impl Fleet {
    /// A first-run fleet: every type at zero.
    pub fn new() -> Self {
        Self {
            counts: EquipmentType::ALL.iter().map(|&t| (t, 0)).collect(),
        }
    }

    /// Build from stored `(type, count)` rows. Types missing from `rows` stay
    /// at zero.
    pub fn from_rows(rows: impl IntoIterator<Item = (EquipmentType, u32)>) -> Self {
        let mut fleet = Self::new();
        for (ty, count) in rows {
            fleet.set(ty, count);
        }
        fleet
    }

    pub fn count(&self, ty: EquipmentType) -> u32 {
        self.counts.get(&ty).copied().unwrap_or(0)
    }

    pub fn set(&mut self, ty: EquipmentType, count: u32) {
        self.counts.insert(ty, count);
    }

    pub fn add(&mut self, ty: EquipmentType, n: u32) {
        let c = self.count(ty).saturating_add(n);
        self.set(ty, c);
    }

    /// Remove one unit. Returns false (and changes nothing) if none is owned.
    pub fn remove_one(&mut self, ty: EquipmentType) -> bool {
        match self.count(ty) {
            0 => false,
            c => {
                self.set(ty, c - 1);
                true
            }
        }
    }

    /// Zero every count.
    pub fn clear(&mut self) {
        for count in self.counts.values_mut() {
            *count = 0;
        }
    }

    /// `(type, count)` rows in type order, zeros included.
    pub fn rows(&self) -> Vec<(EquipmentType, u32)> {
        self.counts.iter().map(|(&t, &c)| (t, c)).collect()
    }

    pub fn total_units(&self) -> u64 {
        self.counts.values().map(|&c| c as u64).sum()
    }

    /// Σ f(spec) × count over every owned type.
    pub fn sum(&self, table: &EquipmentTable, f: impl Fn(&EquipmentSpec) -> f64) -> f64 {
        self.counts
            .iter()
            .filter(|&(_, &c)| c > 0)
            .map(|(&t, &c)| f(table.get(t)) * c as f64)
            .sum()
    }

    /// Owned units of heat-producing types, as `(type, count)` rows.
    pub fn heat_producers(&self, table: &EquipmentTable) -> Vec<(EquipmentType, u32)> {
        self.counts
            .iter()
            .filter(|&(&t, &c)| c > 0 && table.get(t).produces_heat())
            .map(|(&t, &c)| (t, c))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_lists_every_variant_once() {
        let mut seen = std::collections::BTreeSet::new();
        for ty in EquipmentType::ALL {
            assert!(seen.insert(ty));
        }
        assert_eq!(seen.len(), EquipmentType::COUNT);
        assert_eq!(
            EquipmentType::ALL[EquipmentType::DieselGenerator as usize],
            EquipmentType::DieselGenerator
        );
    }

    #[test]
    fn refurbished_gpu_mines_one_hash_per_second() {
        let table = EquipmentTable::builtin();
        assert_eq!(table[EquipmentType::RefurbishedGpu].hash_rate, 1.0);
    }

    #[test]
    fn price_grows_geometrically() {
        let spec = builtin_spec(EquipmentType::RefurbishedGpu);
        assert_eq!(spec.price(0), 50.0);
        assert!((spec.price(2) - 50.0 * 1.15 * 1.15).abs() < 1e-9);
    }

    #[test]
    fn refund_is_half_of_last_price() {
        let spec = builtin_spec(EquipmentType::RefurbishedGpu);
        assert_eq!(spec.refund(0), 0.0);
        assert_eq!(spec.refund(1), 25.0);
    }

    #[test]
    fn cooling_does_not_produce_heat() {
        let table = EquipmentTable::builtin();
        assert!(!table[EquipmentType::BoxFan].produces_heat());
        assert!(table[EquipmentType::DieselGenerator].produces_heat());
    }

    #[test]
    fn new_fleet_has_every_type_at_zero() {
        let fleet = Fleet::new();
        assert_eq!(fleet.rows().len(), EquipmentType::COUNT);
        assert_eq!(fleet.total_units(), 0);
    }

    #[test]
    fn remove_one_never_goes_negative() {
        let mut fleet = Fleet::new();
        assert!(!fleet.remove_one(EquipmentType::BoxFan));
        fleet.add(EquipmentType::BoxFan, 2);
        assert!(fleet.remove_one(EquipmentType::BoxFan));
        assert_eq!(fleet.count(EquipmentType::BoxFan), 1);
    }

    #[test]
    fn sum_weights_by_count() {
        let table = EquipmentTable::builtin();
        let fleet = Fleet::from_rows([
            (EquipmentType::RefurbishedGpu, 3),
            (EquipmentType::GamingRig, 1),
        ]);
        assert_eq!(fleet.sum(&table, |s| s.hash_rate), 9.0);
    }

    #[test]
    fn heat_producers_skip_coolers_and_empty_types() {
        let table = EquipmentTable::builtin();
        let fleet = Fleet::from_rows([
            (EquipmentType::AsicMiner, 2),
            (EquipmentType::AcUnit, 4),
        ]);
        assert_eq!(fleet.heat_producers(&table), vec![(EquipmentType::AsicMiner, 2)]);
    }

    #[test]
    fn table_override_replaces_one_spec() {
        let mut table = EquipmentTable::builtin();
        table[EquipmentType::BoxFan].heat = -3.0;
        assert_eq!(table.get(EquipmentType::BoxFan).heat, -3.0);
        assert_eq!(table.get(EquipmentType::AcUnit).heat, -6.0);
    }

    #[test]
    fn equipment_type_serializes_snake_case() {
        let json = serde_json::to_string(&EquipmentType::RefurbishedGpu).unwrap();
        assert_eq!(json, "\"refurbished_gpu\"");
    }
}
