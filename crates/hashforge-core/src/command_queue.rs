//! Player commands and the queue that defers them to the next advance.
//!
//! A command is one atomic player transaction. Callers either execute it
//! immediately ([`Engine::execute`](crate::engine::Engine::execute)) or
//! submit it; submitted commands run in submission order at the start of the
//! next `advance`, before any task fires.

use crate::chaos::ChaosKind;
use crate::equipment::EquipmentType;
use crate::fixed::Ticks;
use crate::id::TechId;
use crate::progression::AscensionBranch;
use crate::state::Protocol;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Command enum
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    BuyEquipment(EquipmentType),
    SellEquipment(EquipmentType),
    /// Mine one hash by hand.
    Train,
    /// Sell hashes for credits at the current rate.
    Convert { hashes: f64 },
    Stake { credits: f64 },
    Unstake { credits: f64 },
    Purge,
    Repair,
    ResetBreaker,
    ToggleOverclock,
    SetProtocol(Protocol),
    TapEncounter(ChaosKind),
    TapDiagnosticsCell(u32),
    ResolveDilemma { option: usize },
    UnlockTech(TechId),
    ConfirmAscension(AscensionBranch),
    CancelAscension,
    Pause,
    Resume,
    /// App returned to the foreground at `now` (unix seconds).
    Foreground { now: u64 },
    /// App moved to the background at `now` (unix seconds).
    Background { now: u64 },
}

impl Command {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::BuyEquipment(_) => "buy",
            Command::SellEquipment(_) => "sell",
            Command::Train => "train",
            Command::Convert { .. } => "convert",
            Command::Stake { .. } => "stake",
            Command::Unstake { .. } => "unstake",
            Command::Purge => "purge",
            Command::Repair => "repair",
            Command::ResetBreaker => "reset_breaker",
            Command::ToggleOverclock => "overclock",
            Command::SetProtocol(_) => "protocol",
            Command::TapEncounter(_) => "tap",
            Command::TapDiagnosticsCell(_) => "tap_cell",
            Command::ResolveDilemma { .. } => "resolve_dilemma",
            Command::UnlockTech(_) => "unlock_tech",
            Command::ConfirmAscension(_) => "ascend",
            Command::CancelAscension => "cancel_ascension",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::Foreground { .. } => "foreground",
            Command::Background { .. } => "background",
        }
    }
}

// ---------------------------------------------------------------------------
// CommandQueue
// ---------------------------------------------------------------------------

/// Commands waiting for the next advance, with optional history for replay.
#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: Vec<Command>,
    /// Executed commands: (clock, command).
    history: Vec<(Ticks, Command)>,
    /// 0 = no history.
    max_history: usize,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            max_history,
            ..Self::default()
        }
    }

    pub fn push(&mut self, command: Command) {
        self.pending.push(command);
    }

    pub fn push_batch(&mut self, commands: impl IntoIterator<Item = Command>) {
        self.pending.extend(commands);
    }

    /// Drain pending commands in submission order, recording them in history
    /// at `tick`.
    pub fn drain(&mut self, tick: Ticks) -> Vec<Command> {
        let commands = std::mem::take(&mut self.pending);
        if self.max_history > 0 {
            self.history
                .extend(commands.iter().map(|c| (tick, c.clone())));
            let excess = self.history.len().saturating_sub(self.max_history);
            self.history.drain(..excess);
        }
        commands
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn history(&self) -> &[(Ticks, Command)] {
        &self.history
    }
}
