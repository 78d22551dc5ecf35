//! Story stages, flavor lines, and narrative dilemmas.
//!
//! Dilemma outcomes are data: each option carries a list of [`Effect`]s and
//! [`apply_effect`] is the only place that interprets them.

use crate::equipment::{EquipmentType, Fleet};
use crate::faction::Faction;
use crate::fixed::Ticks;
use crate::id::NarrativeId;
use crate::state::PlayerState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Lifetime credits needed to leave stage 1.
pub const STAGE_TWO_CREDITS: f64 = 1_000.0;
pub const STAGE_THREE_CREDITS: f64 = 50_000.0;
pub const STAGE_FOUR_CREDITS: f64 = 1_000_000.0;
/// Stage reachable only through a dilemma. Unlocks ascension regardless of
/// potential.
pub const AWAKENING_STAGE: u32 = 5;

/// Seconds between flavor rolls on stage 1.
pub const EARLY_FLAVOR_SECS: u32 = 12;
pub const LATE_FLAVOR_SECS: u32 = 60;
pub const FLAVOR_CHANCE: f64 = 0.7;

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// One state change applied when a dilemma option is chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    AddHashes(f64),
    AddCredits(f64),
    /// Multiply credits (losses included).
    ScaleCredits(f64),
    AddInsight(f64),
    AddHeat(f64),
    DamageIntegrity(f64),
    RepairIntegrity(f64),
    GrantEquipment { equipment: EquipmentType, count: u32 },
    AdvanceStage(u32),
    /// Ignored once a faction is chosen.
    SetFaction(Faction),
    Log(String),
}

/// What an effect did, for logging and change tracking.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Resources,
    Thermal,
    Fleet,
    Stage(u32),
    Faction(Faction),
    Log(String),
    Ignored,
}

pub fn apply_effect(effect: &Effect, player: &mut PlayerState, fleet: &mut Fleet) -> Applied {
    match effect {
        Effect::AddHashes(n) => {
            player.add_hashes(*n);
            Applied::Resources
        }
        Effect::AddCredits(n) => {
            player.add_credits(*n);
            Applied::Resources
        }
        Effect::ScaleCredits(factor) => {
            let delta = player.credits * (factor - 1.0);
            player.add_credits(delta);
            Applied::Resources
        }
        Effect::AddInsight(n) => {
            player.add_insight(*n);
            Applied::Resources
        }
        Effect::AddHeat(n) => {
            player.add_heat(*n);
            Applied::Thermal
        }
        Effect::DamageIntegrity(n) => {
            player.set_integrity(player.integrity - n);
            Applied::Thermal
        }
        Effect::RepairIntegrity(n) => {
            player.set_integrity(player.integrity + n);
            Applied::Thermal
        }
        Effect::GrantEquipment { equipment, count } => {
            fleet.add(*equipment, *count);
            Applied::Fleet
        }
        Effect::AdvanceStage(stage) => {
            if player.advance_stage(*stage) {
                Applied::Stage(*stage)
            } else {
                Applied::Ignored
            }
        }
        Effect::SetFaction(faction) => {
            if player.choose_faction(*faction) {
                Applied::Faction(*faction)
            } else {
                Applied::Ignored
            }
        }
        Effect::Log(line) => Applied::Log(line.clone()),
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DilemmaOption {
    pub label: String,
    #[serde(default)]
    pub effects: Vec<Effect>,
}

/// A dilemma the catalog can offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeEvent {
    pub id: NarrativeId,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default = "first_stage")]
    pub min_stage: u32,
    #[serde(default)]
    pub max_stage: Option<u32>,
    /// Never offered again once triggered.
    #[serde(default)]
    pub one_time: bool,
    #[serde(default)]
    pub requires_faction: Option<Faction>,
    pub options: Vec<DilemmaOption>,
}

fn first_stage() -> u32 {
    1
}

impl NarrativeEvent {
    pub fn fits_stage(&self, stage: u32) -> bool {
        stage >= self.min_stage && self.max_stage.is_none_or(|max| stage <= max)
    }

    pub fn eligible(&self, ctx: &RollContext<'_>) -> bool {
        self.fits_stage(ctx.stage)
            && self.requires_faction.is_none_or(|f| f == ctx.faction)
            && !(self.one_time && ctx.triggered.contains(&self.id))
    }
}

/// Inputs the catalog consults when choosing a dilemma.
#[derive(Debug, Clone, Copy)]
pub struct RollContext<'a> {
    pub stage: u32,
    pub faction: Faction,
    pub triggered: &'a BTreeSet<NarrativeId>,
}

impl<'a> RollContext<'a> {
    pub fn of(player: &'a PlayerState) -> Self {
        Self {
            stage: player.story_stage,
            faction: player.faction,
            triggered: &player.triggered_events,
        }
    }
}

/// The dilemma currently awaiting a choice.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveDilemma {
    pub event: NarrativeEvent,
    pub presented_at: Ticks,
}

// ---------------------------------------------------------------------------
// Story stage and flavor
// ---------------------------------------------------------------------------

/// The stage `player` has earned, or `None` if it is unchanged. Stage 5 is
/// never reached here.
pub fn evaluate_stage(player: &PlayerState, fleet: &Fleet) -> Option<u32> {
    let earned = if player.lifetime_credits >= STAGE_FOUR_CREDITS {
        4
    } else if fleet.count(EquipmentType::AsicMiner) > 0
        || player.lifetime_credits >= STAGE_THREE_CREDITS
    {
        3
    } else if player.lifetime_credits >= STAGE_TWO_CREDITS {
        2
    } else {
        1
    };
    (earned > player.story_stage).then_some(earned)
}

/// Seconds-of-play accumulator gating flavor lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlavorClock {
    accumulated: u32,
}

impl FlavorClock {
    pub fn threshold(stage: u32) -> u32 {
        if stage <= 1 {
            EARLY_FLAVOR_SECS
        } else {
            LATE_FLAVOR_SECS
        }
    }

    /// Add one second. Returns true (and resets) when the stage threshold is
    /// reached.
    pub fn tick(&mut self, stage: u32) -> bool {
        self.accumulated += 1;
        if self.accumulated >= Self::threshold(stage) {
            self.accumulated = 0;
            true
        } else {
            false
        }
    }

    pub fn accumulated(&self) -> u32 {
        self.accumulated
    }
}
