//! Tech unlocks and ascension (prestige reset).

use crate::equipment::Fleet;
use crate::faction::Faction;
use crate::id::{TechId, TimerId};
use crate::narrative::AWAKENING_STAGE;
use crate::state::{MAX_INTEGRITY, PlayerState};
use hashforge_tech_tree::{TechTree, TechTreeError, UnlockReceipt};
use serde::{Deserialize, Serialize};

/// Credits per unit of squared potential.
pub const POTENTIAL_DIVISOR: f64 = 10_000.0;
pub const MIN_POTENTIAL: f64 = 1.0;
/// Prestige multiplier gained per point of potential.
pub const MULTIPLIER_PER_POTENTIAL: f64 = 0.1;
/// Story stage after an ascension.
pub const STAGE_FLOOR: u32 = 2;
pub const UPLOAD_STEPS: u32 = 10;

/// The path chosen when ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AscensionBranch {
    /// Keep the current faction.
    Continue,
    Corporate,
    Cypherpunk,
    Singularity,
}

impl AscensionBranch {
    /// Faction after ascending along this branch from `current`.
    pub fn faction(self, current: Faction) -> Faction {
        match self {
            AscensionBranch::Continue => current,
            AscensionBranch::Corporate => Faction::Corporate,
            AscensionBranch::Cypherpunk => Faction::Cypherpunk,
            AscensionBranch::Singularity => Faction::Singularity,
        }
    }
}

/// sqrt(credits / 10 000).
pub fn potential(credits: f64) -> f64 {
    (credits.max(0.0) / POTENTIAL_DIVISOR).sqrt()
}

/// Enough potential, or the awakening stage.
pub fn can_ascend(player: &PlayerState) -> bool {
    potential(player.credits) >= MIN_POTENTIAL || player.story_stage >= AWAKENING_STAGE
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AscensionReport {
    pub branch: AscensionBranch,
    pub potential: f64,
    pub multiplier_gained: f64,
    pub insight_gained: f64,
    pub faction: Faction,
}

/// Run the ascension reset. Callers check [`can_ascend`] first; this applies
/// unconditionally so a completed upload always lands.
pub fn ascend(player: &mut PlayerState, fleet: &mut Fleet, branch: AscensionBranch) -> AscensionReport {
    let potential = potential(player.credits);
    let multiplier_gained = potential * MULTIPLIER_PER_POTENTIAL;

    player.hashes = 0.0;
    player.credits = 0.0;
    player.heat = 0.0;
    player.power_bill = 0.0;
    player.staked = 0.0;
    player.lifetime_credits = 0.0;
    player.integrity = MAX_INTEGRITY;
    player.prestige_multiplier += multiplier_gained;
    player.add_insight(potential);
    // Every branch re-enters at the floor stage; the branch only picks the
    // faction.
    player.story_stage = STAGE_FLOOR;
    player.faction = branch.faction(player.faction);
    player.ascensions += 1;
    fleet.clear();

    AscensionReport {
        branch,
        potential,
        multiplier_gained,
        insight_gained: potential,
        faction: player.faction,
    }
}

/// Validate and apply a tech unlock: spends insight, records the node and
/// raises the prestige multiplier by the node's bonus.
pub fn unlock_tech(
    tree: &TechTree,
    player: &mut PlayerState,
    id: TechId,
) -> Result<UnlockReceipt, TechTreeError> {
    let receipt = tree.unlock(id, &mut player.unlocked_tech, &mut player.insight)?;
    player.prestige_multiplier += receipt.prestige_multiplier;
    Ok(receipt)
}

/// Progress of the cancellable upload that precedes the reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub branch: AscensionBranch,
    pub step: u32,
    pub total_steps: u32,
    /// Timer for the next step.
    pub next_step: TimerId,
}

impl UploadProgress {
    pub fn new(branch: AscensionBranch, next_step: TimerId) -> Self {
        Self {
            branch,
            step: 0,
            total_steps: UPLOAD_STEPS,
            next_step,
        }
    }

    /// Advance one step. Returns true when the upload is complete.
    pub fn advance(&mut self) -> bool {
        self.step = (self.step + 1).min(self.total_steps);
        self.step >= self.total_steps
    }

    pub fn percent(&self) -> f64 {
        if self.total_steps == 0 {
            return 100.0;
        }
        self.step as f64 / self.total_steps as f64 * 100.0
    }
}
