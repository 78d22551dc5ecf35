//! The player record and the engine's transient session state.
//!
//! [`PlayerState`] is the persisted half: every setter clamps so the record
//! satisfies its invariants after any transaction (heat and integrity in
//! [0, 100], hashes and credits never negative). [`SessionState`] is the
//! engine-only half that is rebuilt on every start.

use crate::chaos::Encounters;
use crate::event::{LogLine, RingLog};
use crate::faction::Faction;
use crate::id::{NarrativeId, TechId};
use crate::market::MarketState;
use crate::narrative::{ActiveDilemma, FlavorClock};
use crate::progression::UploadProgress;
use crate::rates::RateReport;
use crate::thermal::{PurgeState, ThermalMonitor};
use hashforge_power::{BillingMeter, Breaker};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const MAX_HEAT: f64 = 100.0;
pub const MAX_INTEGRITY: f64 = 100.0;
/// Story stage of a brand-new save.
pub const FIRST_STAGE: u32 = 1;

// ---------------------------------------------------------------------------
// Protocol
// ---------------------------------------------------------------------------

/// The active mining protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    #[default]
    Standard,
    /// More hashes, same exposure.
    HighYield,
    /// Fewer hashes, half the breach chance.
    Stealth,
}

impl Protocol {
    pub fn production_bonus(self) -> f64 {
        match self {
            Protocol::Standard => 1.0,
            Protocol::HighYield => 1.2,
            Protocol::Stealth => 0.9,
        }
    }

    pub fn breach_chance_scale(self) -> f64 {
        match self {
            Protocol::Stealth => 0.5,
            _ => 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// PlayerState
// ---------------------------------------------------------------------------

/// The single persisted player-progress record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Primary resource.
    pub hashes: f64,
    /// Currency.
    pub credits: f64,
    pub staked: f64,
    /// Thermal load, percent of capacity.
    pub heat: f64,
    /// Credits owed to the utility.
    pub power_bill: f64,
    pub integrity: f64,
    pub prestige_multiplier: f64,
    /// Prestige currency.
    pub insight: f64,
    pub unlocked_tech: BTreeSet<TechId>,
    pub story_stage: u32,
    pub faction: Faction,
    /// Unix seconds of the last persisted sync.
    pub last_sync: u64,
    /// One-time narrative events already offered.
    pub triggered_events: BTreeSet<NarrativeId>,
    pub protocol: Protocol,
    pub ascensions: u32,
    /// Credits ever earned this run; drives story progression.
    pub lifetime_credits: f64,
}

impl PlayerState {
    /// A brand-new save synced at `now`.
    pub fn new(now: u64) -> Self {
        Self {
            hashes: 0.0,
            credits: 0.0,
            staked: 0.0,
            heat: 0.0,
            power_bill: 0.0,
            integrity: MAX_INTEGRITY,
            prestige_multiplier: 1.0,
            insight: 0.0,
            unlocked_tech: BTreeSet::new(),
            story_stage: FIRST_STAGE,
            faction: Faction::Unaligned,
            last_sync: now,
            triggered_events: BTreeSet::new(),
            protocol: Protocol::Standard,
            ascensions: 0,
            lifetime_credits: 0.0,
        }
    }

    pub fn add_hashes(&mut self, amount: f64) {
        self.hashes = (self.hashes + amount).max(0.0);
    }

    /// Add (or, if negative, remove) credits. Positive amounts count toward
    /// lifetime earnings.
    pub fn add_credits(&mut self, amount: f64) {
        if amount > 0.0 {
            self.lifetime_credits += amount;
        }
        self.credits = (self.credits + amount).max(0.0);
    }

    /// Return credits that were not earned (refunds, unstaking).
    pub fn deposit(&mut self, amount: f64) {
        self.credits += amount.max(0.0);
    }

    /// Spend exactly `amount` credits, or nothing.
    pub fn try_spend_credits(&mut self, amount: f64) -> bool {
        if amount > self.credits {
            return false;
        }
        self.credits = (self.credits - amount).max(0.0);
        true
    }

    pub fn set_heat(&mut self, heat: f64) {
        self.heat = heat.clamp(0.0, MAX_HEAT);
    }

    pub fn add_heat(&mut self, delta: f64) {
        self.set_heat(self.heat + delta);
    }

    pub fn set_integrity(&mut self, integrity: f64) {
        self.integrity = integrity.clamp(0.0, MAX_INTEGRITY);
    }

    pub fn add_insight(&mut self, amount: f64) {
        self.insight = (self.insight + amount).max(0.0);
    }

    /// Raise the story stage. Never lowers it.
    pub fn advance_stage(&mut self, stage: u32) -> bool {
        if stage > self.story_stage {
            self.story_stage = stage;
            true
        } else {
            false
        }
    }

    /// Set the faction if none is chosen yet. Returns whether it changed.
    pub fn choose_faction(&mut self, faction: Faction) -> bool {
        if self.faction == Faction::Unaligned && faction != Faction::Unaligned {
            self.faction = faction;
            true
        } else {
            false
        }
    }

    /// Re-establish every invariant. Used after loading foreign records.
    pub fn normalize(&mut self) {
        self.hashes = self.hashes.max(0.0);
        self.credits = self.credits.max(0.0);
        self.staked = self.staked.max(0.0);
        self.power_bill = self.power_bill.max(0.0);
        self.insight = self.insight.max(0.0);
        self.set_heat(self.heat);
        self.set_integrity(self.integrity);
        self.prestige_multiplier = self.prestige_multiplier.max(1.0);
        self.story_stage = self.story_stage.max(FIRST_STAGE);
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Engine-internal state that is never persisted.
#[derive(Debug)]
pub struct SessionState {
    pub paused: bool,
    pub overclock: bool,
    pub breaker: Breaker,
    pub meter: BillingMeter,
    pub thermal: ThermalMonitor,
    pub purge: PurgeState,
    pub encounters: Encounters,
    pub market: MarketState,
    /// At most one dilemma is presented at a time.
    pub dilemma: Option<ActiveDilemma>,
    pub flavor: FlavorClock,
    pub upload: Option<UploadProgress>,
    /// Headlines, most recent first.
    pub news: RingLog<String>,
    /// User-visible log lines, most recent first.
    pub terminal: RingLog<LogLine>,
    /// Rates published by the most recent production tick.
    pub last_rates: RateReport,
    /// Staking-yield accumulator in power ticks.
    pub stake_ticks: u32,
    /// A bill settlement came due while paused.
    pub settlement_due: bool,
    /// A staking payout came due while paused.
    pub yield_due: bool,
}

impl SessionState {
    pub fn new(meter: BillingMeter, news_capacity: usize, log_capacity: usize) -> Self {
        Self {
            paused: false,
            overclock: false,
            breaker: Breaker::new(),
            meter,
            thermal: ThermalMonitor::new(),
            purge: PurgeState::default(),
            encounters: Encounters::default(),
            market: MarketState::default(),
            dilemma: None,
            flavor: FlavorClock::default(),
            upload: None,
            news: RingLog::new(news_capacity),
            terminal: RingLog::new(log_capacity),
            last_rates: RateReport::default(),
            stake_ticks: 0,
            settlement_due: false,
            yield_due: false,
        }
    }
}
