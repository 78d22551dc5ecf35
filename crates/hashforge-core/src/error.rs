//! Error taxonomy for player transactions and tick handlers.

use crate::chaos::ChaosKind;
use crate::sim::TaskKind;
use crate::store::StoreError;
use hashforge_power::BreakerError;
use hashforge_tech_tree::TechTreeError;

/// A rejected player transaction. Rejections never mutate state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActionError {
    #[error("insufficient funds: need {needed:.2}, have {available:.2}")]
    InsufficientFunds { needed: f64, available: f64 },

    #[error("not allowed: {0}")]
    InvalidTransition(String),

    #[error("breaker cannot reset: {0}")]
    Breaker(#[from] BreakerError),

    #[error("{0}")]
    Tech(#[from] TechTreeError),

    #[error("{action} on cooldown for {remaining} more ticks")]
    OnCooldown { action: &'static str, remaining: u32 },

    #[error("no active {} encounter", .0.label())]
    EncounterInactive(ChaosKind),

    #[error("no dilemma awaiting a choice")]
    NoActiveDilemma,

    #[error("dilemma has no option {0}")]
    UnknownOption(usize),

    #[error("rig is locked out after a meltdown")]
    LockedOut,

    #[error("engine is not running")]
    NotRunning,
}

impl ActionError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        ActionError::InvalidTransition(reason.into())
    }
}

/// A tick handler failed. The scheduler logs it and keeps running.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TickError {
    #[error("store write failed: {0}")]
    Store(#[from] StoreError),

    #[error("catalog missing {0}")]
    MissingContent(String),

    /// Raised by the debug fault hook.
    #[error("injected fault in {0:?} task")]
    InjectedFault(TaskKind),
}
