//! Thermal failure state machine and purge countdowns.
//!
//! ```text
//! Normal ──heat > 95──▶ IntegrityCritical ──heat ≤ 95──▶ Normal
//!    │                        │
//!    └──── integrity 0 or 5 ticks at 100% ────▶ MELTDOWN
//!                                                 ├─ heat producer owned: destroy one, Normal
//!                                                 └─ none owned: Lockout(15) ──▶ Normal
//! ```
//!
//! Checks run once per thermal tick, after the heat change has been applied.
//! Like the power crate, the monitor only reports transitions; steady states
//! produce no events.

use crate::equipment::{EquipmentTable, EquipmentType, Fleet};
use crate::faction::FactionPerks;
use crate::rng::SimRng;
use crate::state::{MAX_HEAT, MAX_INTEGRITY, PlayerState};
use serde::{Deserialize, Serialize};

/// Above this heat, integrity decays every tick.
pub const CRITICAL_HEAT: f64 = 95.0;
pub const BASE_INTEGRITY_DECAY: f64 = 1.0;
/// Consecutive ticks at 100% heat that force a meltdown.
pub const MELTDOWN_STREAK: u32 = 5;
pub const LOCKOUT_TICKS: u32 = 15;
pub const MELTDOWN_RESET_HEAT: f64 = 50.0;

// ---------------------------------------------------------------------------
// Status and events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ThermalStatus {
    #[default]
    Normal,
    IntegrityCritical,
    /// Production disabled until the countdown reaches zero.
    Lockout { remaining_ticks: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeltdownCause {
    IntegrityDepleted,
    SustainedMaxHeat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ThermalEvent {
    EnteredCritical { heat: f64 },
    IntegrityDamaged { amount: f64, integrity: f64 },
    Recovered { heat: f64 },
    Meltdown {
        cause: MeltdownCause,
        destroyed: Option<EquipmentType>,
    },
    LockoutStarted { ticks: u32 },
    LockoutEnded,
}

// ---------------------------------------------------------------------------
// ThermalMonitor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThermalMonitor {
    status: ThermalStatus,
    max_heat_streak: u32,
    meltdowns: u32,
}

impl ThermalMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> ThermalStatus {
        self.status
    }

    pub fn is_locked_out(&self) -> bool {
        matches!(self.status, ThermalStatus::Lockout { .. })
    }

    pub fn max_heat_streak(&self) -> u32 {
        self.max_heat_streak
    }

    pub fn meltdowns(&self) -> u32 {
        self.meltdowns
    }

    /// Run one tick of failure checks against the already-updated heat.
    pub fn check(
        &mut self,
        player: &mut PlayerState,
        fleet: &mut Fleet,
        table: &EquipmentTable,
        perks: &FactionPerks,
        rng: &mut SimRng,
    ) -> Vec<ThermalEvent> {
        let mut events = Vec::new();

        if let ThermalStatus::Lockout { remaining_ticks } = self.status {
            let remaining = remaining_ticks.saturating_sub(1);
            if remaining == 0 {
                self.status = ThermalStatus::Normal;
                events.push(ThermalEvent::LockoutEnded);
            } else {
                self.status = ThermalStatus::Lockout {
                    remaining_ticks: remaining,
                };
            }
            return events;
        }

        if player.heat >= MAX_HEAT {
            self.max_heat_streak += 1;
        } else {
            self.max_heat_streak = 0;
        }

        if player.heat > CRITICAL_HEAT {
            if self.status == ThermalStatus::Normal {
                self.status = ThermalStatus::IntegrityCritical;
                events.push(ThermalEvent::EnteredCritical { heat: player.heat });
            }
            let amount = BASE_INTEGRITY_DECAY * perks.integrity_decay_scale;
            player.set_integrity(player.integrity - amount);
            events.push(ThermalEvent::IntegrityDamaged {
                amount,
                integrity: player.integrity,
            });
        } else if self.status == ThermalStatus::IntegrityCritical {
            self.status = ThermalStatus::Normal;
            events.push(ThermalEvent::Recovered { heat: player.heat });
        }

        let cause = if player.integrity <= 0.0 {
            Some(MeltdownCause::IntegrityDepleted)
        } else if self.max_heat_streak >= MELTDOWN_STREAK {
            Some(MeltdownCause::SustainedMaxHeat)
        } else {
            None
        };
        if let Some(cause) = cause {
            self.meltdown(cause, player, fleet, table, rng, &mut events);
        }
        events
    }

    fn meltdown(
        &mut self,
        cause: MeltdownCause,
        player: &mut PlayerState,
        fleet: &mut Fleet,
        table: &EquipmentTable,
        rng: &mut SimRng,
        events: &mut Vec<ThermalEvent>,
    ) {
        self.meltdowns += 1;
        self.max_heat_streak = 0;
        player.set_heat(MELTDOWN_RESET_HEAT);
        player.set_integrity(MAX_INTEGRITY);

        let destroyed = pick_victim(fleet, table, rng);
        if let Some(ty) = destroyed {
            fleet.remove_one(ty);
            self.status = ThermalStatus::Normal;
        }
        events.push(ThermalEvent::Meltdown { cause, destroyed });
        if destroyed.is_none() {
            self.status = ThermalStatus::Lockout {
                remaining_ticks: LOCKOUT_TICKS,
            };
            events.push(ThermalEvent::LockoutStarted {
                ticks: LOCKOUT_TICKS,
            });
        }
    }

    /// Clear every failure state (ascension wipes the floor).
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Choose one owned heat-producing unit uniformly across units, so a type is
/// picked in proportion to how many of it are owned.
fn pick_victim(fleet: &Fleet, table: &EquipmentTable, rng: &mut SimRng) -> Option<EquipmentType> {
    let producers = fleet.heat_producers(table);
    let total: u64 = producers.iter().map(|&(_, c)| c as u64).sum();
    if total == 0 {
        return None;
    }
    let mut roll = rng.below(total);
    for (ty, count) in producers {
        if roll < count as u64 {
            return Some(ty);
        }
        roll -= count as u64;
    }
    None
}

// ---------------------------------------------------------------------------
// Purge countdowns
// ---------------------------------------------------------------------------

/// Remaining thermal ticks of each purge phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeState {
    pub exhaust_remaining: u32,
    pub spike_remaining: u32,
    pub cooldown_remaining: u32,
}

impl PurgeState {
    pub fn ready(&self) -> bool {
        self.cooldown_remaining == 0
    }

    pub fn exhaust_active(&self) -> bool {
        self.exhaust_remaining > 0
    }

    pub fn spike_active(&self) -> bool {
        self.spike_remaining > 0
    }

    pub fn start(&mut self, exhaust: u32, spike: u32, cooldown: u32) {
        self.exhaust_remaining = exhaust;
        self.spike_remaining = spike;
        self.cooldown_remaining = cooldown;
    }

    /// Count every phase down by one tick. Returns true if the exhaust phase
    /// just ended.
    pub fn tick(&mut self) -> bool {
        let was_exhausting = self.exhaust_active();
        self.exhaust_remaining = self.exhaust_remaining.saturating_sub(1);
        self.spike_remaining = self.spike_remaining.saturating_sub(1);
        self.cooldown_remaining = self.cooldown_remaining.saturating_sub(1);
        was_exhausting && !self.exhaust_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faction::{Faction, PerkTable};

    fn setup(heat: f64, fleet: Fleet) -> (PlayerState, Fleet, EquipmentTable, SimRng) {
        let mut p = PlayerState::new(0);
        p.set_heat(heat);
        (p, fleet, EquipmentTable::builtin(), SimRng::new(7))
    }

    #[test]
    fn above_critical_line_costs_one_integrity() {
        let (mut p, mut fleet, table, mut rng) =
            setup(96.0, Fleet::from_rows([(EquipmentType::AsicMiner, 1)]));
        let mut m = ThermalMonitor::new();
        let events = m.check(&mut p, &mut fleet, &table, &FactionPerks::default(), &mut rng);
        assert_eq!(p.integrity, 99.0);
        assert_eq!(m.status(), ThermalStatus::IntegrityCritical);
        assert!(matches!(events[0], ThermalEvent::EnteredCritical { .. }));
    }

    #[test]
    fn heat_resistant_faction_decays_slower() {
        let (mut p, mut fleet, table, mut rng) = setup(96.0, Fleet::new());
        let perks = PerkTable::builtin().get(Faction::Singularity);
        ThermalMonitor::new().check(&mut p, &mut fleet, &table, &perks, &mut rng);
        assert_eq!(p.integrity, 99.5);
    }

    #[test]
    fn cooling_below_line_recovers_without_regen() {
        let (mut p, mut fleet, table, mut rng) = setup(96.0, Fleet::new());
        let perks = FactionPerks::default();
        let mut m = ThermalMonitor::new();
        m.check(&mut p, &mut fleet, &table, &perks, &mut rng);
        p.set_heat(90.0);
        let events = m.check(&mut p, &mut fleet, &table, &perks, &mut rng);
        assert_eq!(m.status(), ThermalStatus::Normal);
        assert_eq!(p.integrity, 99.0);
        assert_eq!(events, vec![ThermalEvent::Recovered { heat: 90.0 }]);
    }

    #[test]
    fn steady_normal_is_silent() {
        let (mut p, mut fleet, table, mut rng) = setup(40.0, Fleet::new());
        let events =
            ThermalMonitor::new().check(&mut p, &mut fleet, &table, &FactionPerks::default(), &mut rng);
        assert!(events.is_empty());
    }

    #[test]
    fn sustained_max_heat_melts_down_a_producer() {
        let (mut p, mut fleet, table, mut rng) =
            setup(100.0, Fleet::from_rows([(EquipmentType::GamingRig, 3)]));
        let perks = FactionPerks::default();
        let mut m = ThermalMonitor::new();
        for _ in 0..4 {
            m.check(&mut p, &mut fleet, &table, &perks, &mut rng);
            p.set_heat(100.0);
        }
        assert_eq!(m.max_heat_streak(), 4);
        let events = m.check(&mut p, &mut fleet, &table, &perks, &mut rng);
        assert!(events.contains(&ThermalEvent::Meltdown {
            cause: MeltdownCause::SustainedMaxHeat,
            destroyed: Some(EquipmentType::GamingRig),
        }));
        assert_eq!(fleet.count(EquipmentType::GamingRig), 2);
        assert_eq!(p.heat, 50.0);
        assert_eq!(p.integrity, 100.0);
        assert_eq!(m.status(), ThermalStatus::Normal);
        assert_eq!(m.meltdowns(), 1);
    }

    #[test]
    fn depleted_integrity_melts_down() {
        let (mut p, mut fleet, table, mut rng) =
            setup(97.0, Fleet::from_rows([(EquipmentType::AsicMiner, 1)]));
        p.set_integrity(1.0);
        let mut m = ThermalMonitor::new();
        let events = m.check(&mut p, &mut fleet, &table, &FactionPerks::default(), &mut rng);
        assert!(events.contains(&ThermalEvent::Meltdown {
            cause: MeltdownCause::IntegrityDepleted,
            destroyed: Some(EquipmentType::AsicMiner),
        }));
        assert_eq!(fleet.count(EquipmentType::AsicMiner), 0);
    }

    #[test]
    fn meltdown_without_producers_locks_out() {
        let (mut p, mut fleet, table, mut rng) =
            setup(97.0, Fleet::from_rows([(EquipmentType::BoxFan, 2)]));
        p.set_integrity(0.5);
        let perks = FactionPerks::default();
        let mut m = ThermalMonitor::new();
        let events = m.check(&mut p, &mut fleet, &table, &perks, &mut rng);
        assert!(events.contains(&ThermalEvent::LockoutStarted { ticks: LOCKOUT_TICKS }));
        assert_eq!(fleet.count(EquipmentType::BoxFan), 2);
        assert!(m.is_locked_out());

        for _ in 0..LOCKOUT_TICKS - 1 {
            assert!(m.check(&mut p, &mut fleet, &table, &perks, &mut rng).is_empty());
        }
        let events = m.check(&mut p, &mut fleet, &table, &perks, &mut rng);
        assert_eq!(events, vec![ThermalEvent::LockoutEnded]);
        assert_eq!(m.status(), ThermalStatus::Normal);
    }

    #[test]
    fn victim_choice_follows_unit_counts() {
        let table = EquipmentTable::builtin();
        let fleet = Fleet::from_rows([
            (EquipmentType::RefurbishedGpu, 99),
            (EquipmentType::QuantumRig, 1),
        ]);
        let mut rng = SimRng::new(11);
        let gpu_hits = (0..1_000)
            .filter(|_| pick_victim(&fleet, &table, &mut rng) == Some(EquipmentType::RefurbishedGpu))
            .count();
        assert!(gpu_hits > 900, "got {gpu_hits}");
    }

    #[test]
    fn purge_phases_count_down_independently() {
        let mut purge = PurgeState::default();
        assert!(purge.ready());
        purge.start(2, 1, 3);
        assert!(!purge.ready());
        assert!(!purge.tick());
        assert!(purge.exhaust_active());
        assert!(!purge.spike_active());
        assert!(purge.tick());
        assert!(!purge.ready());
        purge.tick();
        assert!(purge.ready());
    }
}
