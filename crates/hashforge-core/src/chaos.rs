//! Chaos encounters: timed tap challenges rolled by the chaos task.
//!
//! Each kind runs `Inactive → Active → (Resolved | Expired) → Inactive`. The
//! timeout is a one-shot scheduler timer whose id is stored with the active
//! encounter so a successful resolution can cancel it.

use crate::faction::FactionPerks;
use crate::fixed::{Fixed64, Ticks, probability, secs};
use crate::id::TimerId;
use crate::rng::SimRng;
use crate::state::Protocol;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChaosKind {
    /// Intruders skim credits unless fought off.
    Breach,
    /// A supply drop; tap once to claim a production boost.
    Airdrop,
    /// Faulty cells halve production until found.
    Diagnostics,
    /// 51% attack on staked funds.
    Attack,
}

impl ChaosKind {
    pub const ALL: [ChaosKind; 4] = [
        ChaosKind::Breach,
        ChaosKind::Airdrop,
        ChaosKind::Diagnostics,
        ChaosKind::Attack,
    ];

    fn slot(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            ChaosKind::Breach => "breach",
            ChaosKind::Airdrop => "airdrop",
            ChaosKind::Diagnostics => "diagnostics",
            ChaosKind::Attack => "51% attack",
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChaosConfig {
    pub breach_chance: Fixed64,
    pub airdrop_chance: Fixed64,
    pub diagnostics_chance: Fixed64,
    pub attack_chance: Fixed64,

    pub breach_taps: u32,
    pub breach_timeout: Ticks,
    /// Fraction of credits stolen by an expired breach.
    pub breach_steal_fraction: f64,
    /// Upper bound on the security discount from tech.
    pub max_security_discount: f64,

    pub airdrop_timeout: Ticks,
    pub airdrop_multiplier: f64,
    /// Boost duration in thermal ticks.
    pub airdrop_boost_ticks: u32,
    pub airdrop_bonus_fraction: f64,
    pub airdrop_min_bonus: f64,

    pub diagnostics_cells: u32,
    pub diagnostics_faults: u32,
    pub diagnostics_timeout: Ticks,
    pub diagnostics_hash_loss: f64,

    pub attack_taps: u32,
    pub attack_timeout: Ticks,
    pub attack_confiscation: f64,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            breach_chance: probability(0.05),
            airdrop_chance: probability(0.10),
            diagnostics_chance: probability(0.05),
            attack_chance: probability(0.05),
            breach_taps: 10,
            breach_timeout: secs(10),
            breach_steal_fraction: 0.20,
            max_security_discount: 0.8,
            airdrop_timeout: secs(15),
            airdrop_multiplier: 2.0,
            airdrop_boost_ticks: 30,
            airdrop_bonus_fraction: 0.05,
            airdrop_min_bonus: 50.0,
            diagnostics_cells: 9,
            diagnostics_faults: 3,
            diagnostics_timeout: secs(30),
            diagnostics_hash_loss: 0.25,
            attack_taps: 20,
            attack_timeout: secs(15),
            attack_confiscation: 0.5,
        }
    }
}

impl ChaosConfig {
    /// All four chances zeroed, for tests and calm sessions.
    pub fn disabled() -> Self {
        Self {
            breach_chance: Fixed64::ZERO,
            airdrop_chance: Fixed64::ZERO,
            diagnostics_chance: Fixed64::ZERO,
            attack_chance: Fixed64::ZERO,
            ..Self::default()
        }
    }

    pub fn timeout(&self, kind: ChaosKind) -> Ticks {
        match kind {
            ChaosKind::Breach => self.breach_timeout,
            ChaosKind::Airdrop => self.airdrop_timeout,
            ChaosKind::Diagnostics => self.diagnostics_timeout,
            ChaosKind::Attack => self.attack_timeout,
        }
    }

    /// Taps needed to resolve. Diagnostics counts faulty cells.
    pub fn taps(&self, kind: ChaosKind) -> u32 {
        match kind {
            ChaosKind::Breach => self.breach_taps,
            ChaosKind::Airdrop => 1,
            ChaosKind::Diagnostics => self.diagnostics_faults.min(self.diagnostics_cells),
            ChaosKind::Attack => self.attack_taps,
        }
    }

    /// Effective chance of `kind` this roll.
    pub fn chance(&self, kind: ChaosKind, protocol: Protocol, perks: &FactionPerks) -> Fixed64 {
        match kind {
            ChaosKind::Breach => {
                self.breach_chance * Fixed64::from_num(protocol.breach_chance_scale())
            }
            ChaosKind::Airdrop => self.airdrop_chance,
            ChaosKind::Diagnostics => self.diagnostics_chance,
            ChaosKind::Attack => self.attack_chance * Fixed64::from_num(perks.attack_chance_scale),
        }
    }

    /// Credits lost to an expired breach.
    pub fn breach_loss(&self, credits: f64, security_bonus: f64) -> f64 {
        let discount = security_bonus.clamp(0.0, self.max_security_discount);
        credits * self.breach_steal_fraction * (1.0 - discount)
    }

    /// Credits granted on claiming an airdrop.
    pub fn airdrop_bonus(&self, credits: f64) -> f64 {
        (credits * self.airdrop_bonus_fraction).max(self.airdrop_min_bonus)
    }
}

// ---------------------------------------------------------------------------
// Encounter state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncounterState {
    #[default]
    Inactive,
    Active { taps_remaining: u32, timeout: TimerId },
}

/// Outcome of one player tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapOutcome {
    Progress { remaining: u32 },
    Resolved { timeout: TimerId },
    /// Diagnostics cell that was not faulty.
    Nominal,
    Inactive,
}

/// Every encounter slot plus the diagnostics grid and airdrop boost.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Encounters {
    slots: [EncounterState; 4],
    faulty_cells: BTreeSet<u32>,
    grid_size: u32,
    airdrop_boost_remaining: u32,
}

impl Encounters {
    pub fn state(&self, kind: ChaosKind) -> EncounterState {
        self.slots[kind.slot()]
    }

    pub fn is_active(&self, kind: ChaosKind) -> bool {
        matches!(self.state(kind), EncounterState::Active { .. })
    }

    pub fn active_kinds(&self) -> Vec<ChaosKind> {
        ChaosKind::ALL
            .into_iter()
            .filter(|&k| self.is_active(k))
            .collect()
    }

    pub fn diagnostics_active(&self) -> bool {
        self.is_active(ChaosKind::Diagnostics)
    }

    /// Faulty cell indices of the current diagnostics grid.
    pub fn faulty_cells(&self) -> &BTreeSet<u32> {
        &self.faulty_cells
    }

    pub fn grid_size(&self) -> u32 {
        self.grid_size
    }

    /// Mark `kind` active. Diagnostics lays out its faulty cells with `rng`.
    pub fn activate(
        &mut self,
        kind: ChaosKind,
        config: &ChaosConfig,
        timeout: TimerId,
        rng: &mut SimRng,
    ) {
        let taps_remaining = config.taps(kind);
        if kind == ChaosKind::Diagnostics {
            self.grid_size = config.diagnostics_cells;
            self.faulty_cells.clear();
            while (self.faulty_cells.len() as u32) < taps_remaining {
                self.faulty_cells
                    .insert(rng.below(self.grid_size as u64) as u32);
            }
        }
        self.slots[kind.slot()] = EncounterState::Active {
            taps_remaining,
            timeout,
        };
    }

    /// Point an active encounter at a new timeout timer. Returns false if
    /// `kind` is inactive.
    pub fn retime(&mut self, kind: ChaosKind, timeout: TimerId) -> bool {
        match &mut self.slots[kind.slot()] {
            EncounterState::Active { timeout: t, .. } => {
                *t = timeout;
                true
            }
            EncounterState::Inactive => false,
        }
    }

    /// One tap on a counted encounter.
    pub fn tap(&mut self, kind: ChaosKind) -> TapOutcome {
        match self.slots[kind.slot()] {
            EncounterState::Inactive => TapOutcome::Inactive,
            EncounterState::Active {
                taps_remaining,
                timeout,
            } => {
                let remaining = taps_remaining.saturating_sub(1);
                if remaining == 0 {
                    self.finish(kind);
                    TapOutcome::Resolved { timeout }
                } else {
                    self.slots[kind.slot()] = EncounterState::Active {
                        taps_remaining: remaining,
                        timeout,
                    };
                    TapOutcome::Progress { remaining }
                }
            }
        }
    }

    /// Tap one diagnostics cell. Only faulty cells make progress.
    pub fn tap_cell(&mut self, index: u32) -> TapOutcome {
        if !self.diagnostics_active() {
            return TapOutcome::Inactive;
        }
        if !self.faulty_cells.remove(&index) {
            return TapOutcome::Nominal;
        }
        self.tap(ChaosKind::Diagnostics)
    }

    /// Deactivate `kind` after its timer fired. Returns false if it was not
    /// active (already resolved).
    pub fn expire(&mut self, kind: ChaosKind) -> bool {
        if !self.is_active(kind) {
            return false;
        }
        self.finish(kind);
        true
    }

    fn finish(&mut self, kind: ChaosKind) {
        self.slots[kind.slot()] = EncounterState::Inactive;
        if kind == ChaosKind::Diagnostics {
            self.faulty_cells.clear();
            self.grid_size = 0;
        }
    }

    pub fn start_airdrop_boost(&mut self, ticks: u32) {
        self.airdrop_boost_remaining = ticks;
    }

    pub fn airdrop_boost_active(&self) -> bool {
        self.airdrop_boost_remaining > 0
    }

    pub fn airdrop_boost_remaining(&self) -> u32 {
        self.airdrop_boost_remaining
    }

    /// Count the boost down one tick. Returns true when it just ran out.
    pub fn tick_airdrop_boost(&mut self) -> bool {
        if self.airdrop_boost_remaining == 0 {
            return false;
        }
        self.airdrop_boost_remaining -= 1;
        self.airdrop_boost_remaining == 0
    }

    /// Drop everything, returning the timers that must be cancelled.
    pub fn clear(&mut self) -> Vec<TimerId> {
        let timers = self
            .slots
            .iter()
            .filter_map(|s| match *s {
                EncounterState::Active { timeout, .. } => Some(timeout),
                EncounterState::Inactive => None,
            })
            .collect();
        *self = Self::default();
        timers
    }
}

/// Run one independent Bernoulli trial per inactive kind and return the
/// kinds that should start.
pub fn roll_encounters(
    encounters: &Encounters,
    config: &ChaosConfig,
    protocol: Protocol,
    perks: &FactionPerks,
    rng: &mut SimRng,
) -> Vec<ChaosKind> {
    ChaosKind::ALL
        .into_iter()
        .filter(|&kind| {
            // Roll every kind so the rng stream does not depend on which
            // encounters happen to be running.
            let hit = rng.chance(config.chance(kind, protocol, perks));
            hit && !encounters.is_active(kind)
        })
        .collect()
}
