//! Power Module for the hashforge engine.
//!
//! Models the two stateful parts of the rig's power supply: the main breaker
//! and the utility meter. Load and capacity figures are computed elsewhere
//! (they are pure functions of the fleet); this crate only decides what
//! happens when they are compared, and when the bill comes due.
//!
//! # Design
//!
//! - The breaker trips when draw exceeds capacity, unless the caller's save
//!   roll succeeds. A tripped breaker stays tripped until a manual reset whose
//!   projected load fits the grid.
//! - The meter accrues billed energy every power tick and reports when a
//!   settlement period has elapsed. Settlement never fails hard: an unpayable
//!   bill is carried over.
//! - Events fire only on *transitions*, not every tick.

use serde::{Deserialize, Serialize};

/// Power ticks between bill settlements (one tick per second, five minutes).
pub const DEFAULT_SETTLEMENT_PERIOD: u32 = 300;

/// Credits charged per kW drawn for one second.
pub const DEFAULT_PRICE_PER_KW_SECOND: f64 = 0.001;

// ---------------------------------------------------------------------------
// Power events
// ---------------------------------------------------------------------------

/// Events emitted by the power module on state transitions.
#[derive(Debug, Clone, PartialEq)]
pub enum PowerEvent {
    /// Draw exceeded capacity and the breaker opened.
    BreakerTripped { draw: f64, capacity: f64, tick: u64 },
    /// Draw exceeded capacity but the save roll kept the breaker closed.
    SurgeAbsorbed { draw: f64, capacity: f64, tick: u64 },
    /// A manual reset closed the breaker.
    BreakerReset { tick: u64 },
    /// The bill was paid in full.
    BillPaid { amount: f64, tick: u64 },
    /// The bill could not be paid and was carried over.
    BillUnpaid { owed: f64, available: f64, tick: u64 },
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BreakerError {
    #[error("breaker is not tripped")]
    NotTripped,

    #[error("projected load {projected:.1} kW exceeds grid capacity {capacity:.1} kW")]
    Overloaded { projected: f64, capacity: f64 },
}

// ---------------------------------------------------------------------------
// Breaker
// ---------------------------------------------------------------------------

/// Position of the main breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BreakerState {
    #[default]
    Closed,
    Tripped {
        since_tick: u64,
    },
}

/// The main breaker between the grid and the rig.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Breaker {
    state: BreakerState,
    /// Lifetime trip count.
    trips: u32,
}

impl Breaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn is_tripped(&self) -> bool {
        matches!(self.state, BreakerState::Tripped { .. })
    }

    pub fn trips(&self) -> u32 {
        self.trips
    }

    /// Compare draw against capacity. A closed breaker trips when
    /// `draw > capacity` unless `save` returns true. The save roll is only
    /// consulted on an overload, so callers can pass an RNG draw without
    /// desynchronizing the stream on quiet ticks.
    pub fn check(
        &mut self,
        draw: f64,
        capacity: f64,
        tick: u64,
        save: impl FnOnce() -> bool,
    ) -> Option<PowerEvent> {
        if self.is_tripped() || draw <= capacity {
            return None;
        }

        if save() {
            return Some(PowerEvent::SurgeAbsorbed {
                draw,
                capacity,
                tick,
            });
        }

        self.state = BreakerState::Tripped { since_tick: tick };
        self.trips += 1;
        Some(PowerEvent::BreakerTripped {
            draw,
            capacity,
            tick,
        })
    }

    /// Manually close a tripped breaker. Rejected with no state change when
    /// the projected load still exceeds capacity.
    pub fn reset(
        &mut self,
        projected: f64,
        capacity: f64,
        tick: u64,
    ) -> Result<PowerEvent, BreakerError> {
        if !self.is_tripped() {
            return Err(BreakerError::NotTripped);
        }
        if projected > capacity {
            return Err(BreakerError::Overloaded {
                projected,
                capacity,
            });
        }
        self.state = BreakerState::Closed;
        Ok(PowerEvent::BreakerReset { tick })
    }

    /// Close the breaker unconditionally. Used by resets of the whole rig.
    pub fn force_close(&mut self) {
        self.state = BreakerState::Closed;
    }
}

// ---------------------------------------------------------------------------
// Billing
// ---------------------------------------------------------------------------

/// The utility meter. The running bill itself is part of the persisted player
/// record, so the meter only owns the settlement cadence and the tariff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingMeter {
    /// Credits per kW-second.
    pub price_per_kw_second: f64,
    /// Power ticks per settlement.
    pub settlement_period: u32,
    /// Power ticks counted since the last settlement.
    ticks_since_settlement: u32,
}

impl Default for BillingMeter {
    fn default() -> Self {
        Self::new(DEFAULT_PRICE_PER_KW_SECOND, DEFAULT_SETTLEMENT_PERIOD)
    }
}

impl BillingMeter {
    pub fn new(price_per_kw_second: f64, settlement_period: u32) -> Self {
        Self {
            price_per_kw_second,
            settlement_period: settlement_period.max(1),
            ticks_since_settlement: 0,
        }
    }

    pub fn ticks_since_settlement(&self) -> u32 {
        self.ticks_since_settlement
    }

    /// Charge one second of `billed_kw` to `bill`. Negative loads (a rig that
    /// generates more than it draws) are not credited.
    pub fn accrue(&self, bill: &mut f64, billed_kw: f64) {
        *bill += billed_kw.max(0.0) * self.price_per_kw_second;
    }

    /// Count one power tick. Returns true when a settlement is due. The
    /// cadence keeps counting even on ticks where nothing was accrued.
    pub fn tick(&mut self) -> bool {
        self.ticks_since_settlement += 1;
        if self.ticks_since_settlement >= self.settlement_period {
            self.ticks_since_settlement = 0;
            true
        } else {
            false
        }
    }

    /// Settle `bill` against `funds`. Pays in full or not at all; an unpaid
    /// bill stays on the books. Returns `None` when nothing was owed.
    pub fn settle(bill: &mut f64, funds: &mut f64, tick: u64) -> Option<PowerEvent> {
        if *bill <= 0.0 {
            *bill = 0.0;
            return None;
        }
        if *funds >= *bill {
            let amount = *bill;
            *funds -= amount;
            *bill = 0.0;
            Some(PowerEvent::BillPaid { amount, tick })
        } else {
            Some(PowerEvent::BillUnpaid {
                owed: *bill,
                available: *funds,
                tick,
            })
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
