//! The rate calculator: pure functions of the fleet and the active
//! modifiers. Nothing here mutates state, so the same inputs always give the
//! same rates and observers can recompute them freely.

use crate::equipment::{EquipmentTable, Fleet};
use crate::faction::FactionPerks;
use crate::state::Protocol;
use serde::{Deserialize, Serialize};

pub const BASE_GRID_KW: f64 = 100.0;
pub const BASE_THERMAL_BUFFER: f64 = 100.0;
/// Passive heat units shed per second.
pub const BASE_DISSIPATION: f64 = 1.0;
pub const EFFICIENCY_CAP: f64 = 0.60;

pub const OVERCLOCK_PRODUCTION: f64 = 1.5;
pub const OVERCLOCK_HEAT: f64 = 2.0;
pub const OVERCLOCK_POWER: f64 = 1.75;
pub const DIAGNOSTICS_PENALTY: f64 = 0.5;
pub const PURGE_THROTTLE: f64 = 0.5;
pub const PURGE_EXHAUST_DISSIPATION: f64 = 0.5;
pub const PURGE_SPIKE: f64 = 1.5;

pub const THROTTLE_START: f64 = 75.0;
pub const THROTTLE_SPAN: f64 = 25.0;
pub const THROTTLE_MAX_PENALTY: f64 = 0.9;

/// Everything besides the fleet that bends a rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Modifiers {
    pub perks: FactionPerks,
    pub overclock: bool,
    pub protocol: Protocol,
    /// Sum of production bonuses from unlocked tech.
    pub tech_bonus: f64,
    pub diagnostics_active: bool,
    pub airdrop_multiplier: f64,
    pub news_multiplier: f64,
    pub prestige_multiplier: f64,
    pub breaker_tripped: bool,
    pub purge_exhaust: bool,
    pub purge_spike: bool,
    pub heat: f64,
}

impl Default for Modifiers {
    fn default() -> Self {
        Self {
            perks: FactionPerks::default(),
            overclock: false,
            protocol: Protocol::Standard,
            tech_bonus: 0.0,
            diagnostics_active: false,
            airdrop_multiplier: 1.0,
            news_multiplier: 1.0,
            prestige_multiplier: 1.0,
            breaker_tripped: false,
            purge_exhaust: false,
            purge_spike: false,
            heat: 0.0,
        }
    }
}

impl Modifiers {
    fn exhaust_applies(&self) -> bool {
        self.purge_exhaust && !self.perks.purge_shielded
    }

    fn spike_applies(&self) -> bool {
        self.purge_spike && !self.perks.purge_shielded
    }
}

/// Production multiplier from heat: 1 up to 75%, falling linearly to 0.1 at
/// 100%.
pub fn thermal_throttle(heat: f64) -> f64 {
    1.0 - ((heat - THROTTLE_START) / THROTTLE_SPAN).clamp(0.0, 1.0) * THROTTLE_MAX_PENALTY
}

/// Σ hash_rate × count, before any modifier.
pub fn base_hash_rate(fleet: &Fleet, table: &EquipmentTable) -> f64 {
    fleet.sum(table, |s| s.hash_rate)
}

/// Hashes per second.
pub fn production_rate(fleet: &Fleet, table: &EquipmentTable, m: &Modifiers) -> f64 {
    if m.breaker_tripped {
        return 0.0;
    }
    let mut rate = base_hash_rate(fleet, table)
        * m.airdrop_multiplier
        * m.news_multiplier
        * m.prestige_multiplier
        * (1.0 + m.tech_bonus)
        * m.perks.production_bonus
        * m.protocol.production_bonus();
    if m.diagnostics_active {
        rate *= DIAGNOSTICS_PENALTY;
    }
    if m.overclock {
        rate *= OVERCLOCK_PRODUCTION;
    }
    if m.purge_exhaust {
        rate *= PURGE_THROTTLE;
    }
    rate * thermal_throttle(m.heat)
}

/// Net heat units per second. Overclock scales the signed fleet sum, coolers
/// included; base dissipation is unaffected.
pub fn heat_delta_units(fleet: &Fleet, table: &EquipmentTable, m: &Modifiers) -> f64 {
    let overclock = if m.overclock { OVERCLOCK_HEAT } else { 1.0 };
    let fleet_heat = fleet.sum(table, |s| s.heat) * overclock;
    let dissipation = if m.exhaust_applies() {
        BASE_DISSIPATION * PURGE_EXHAUST_DISSIPATION
    } else {
        BASE_DISSIPATION
    };
    fleet_heat - dissipation
}

pub fn thermal_buffer(fleet: &Fleet, table: &EquipmentTable) -> f64 {
    BASE_THERMAL_BUFFER + fleet.sum(table, |s| s.thermal_buffer)
}

/// Heat percentage points gained per second.
pub fn heat_percent_change(fleet: &Fleet, table: &EquipmentTable, m: &Modifiers) -> f64 {
    heat_delta_units(fleet, table, m) / thermal_buffer(fleet, table) * 100.0
}

/// Total draw in kW.
pub fn power_draw(fleet: &Fleet, table: &EquipmentTable, m: &Modifiers) -> f64 {
    let raw: f64 = fleet
        .rows()
        .into_iter()
        .filter(|&(_, c)| c > 0)
        .map(|(t, c)| table.get(t).power_kw * c as f64 * m.perks.discount(t))
        .sum();
    let efficiency = fleet.sum(table, |s| s.efficiency_bonus).min(EFFICIENCY_CAP);
    let mut draw = raw * (1.0 - efficiency) * m.perks.power_multiplier;
    if m.overclock {
        draw *= OVERCLOCK_POWER;
    }
    if m.spike_applies() {
        draw *= PURGE_SPIKE;
    }
    draw
}

/// Capacity in kW before the breaker trips.
pub fn grid_capacity(fleet: &Fleet, table: &EquipmentTable, m: &Modifiers) -> f64 {
    BASE_GRID_KW + fleet.sum(table, |s| s.grid_kw) * m.perks.capacity_multiplier
}

/// kW supplied by owned generators. Not billed.
pub fn self_generated_kw(fleet: &Fleet, table: &EquipmentTable) -> f64 {
    fleet.sum(table, |s| if s.is_generator { s.grid_kw } else { 0.0 })
}

/// Snapshot of every derived rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RateReport {
    pub production: f64,
    pub heat_delta_units: f64,
    pub thermal_buffer: f64,
    pub heat_percent_change: f64,
    pub power_draw: f64,
    pub grid_capacity: f64,
    pub self_generated_kw: f64,
    pub throttle: f64,
}

impl RateReport {
    pub fn compute(fleet: &Fleet, table: &EquipmentTable, m: &Modifiers) -> Self {
        Self {
            production: production_rate(fleet, table, m),
            heat_delta_units: heat_delta_units(fleet, table, m),
            thermal_buffer: thermal_buffer(fleet, table),
            heat_percent_change: heat_percent_change(fleet, table, m),
            power_draw: power_draw(fleet, table, m),
            grid_capacity: grid_capacity(fleet, table, m),
            self_generated_kw: self_generated_kw(fleet, table),
            throttle: thermal_throttle(m.heat),
        }
    }

    /// kW billed by the utility.
    pub fn billed_kw(&self) -> f64 {
        (self.power_draw - self.self_generated_kw).max(0.0)
    }

    pub fn overloaded(&self) -> bool {
        self.power_draw > self.grid_capacity
    }
}
