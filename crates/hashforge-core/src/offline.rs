//! Offline catch-up: credit the time the app spent in the background.

use crate::state::PlayerState;
use serde::{Deserialize, Serialize};

/// Gaps shorter than this are ignored.
pub const MIN_GAP_SECS: u64 = 60;
/// Longest gap that is credited.
pub const MAX_GAP_SECS: u64 = 86_400;
/// Heat percentage points shed per offline second (100% per hour).
pub const OFFLINE_COOLING_PER_SEC: f64 = 100.0 / 3_600.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OfflineConfig {
    pub min_gap_secs: u64,
    pub max_gap_secs: u64,
    pub cooling_per_sec: f64,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            min_gap_secs: MIN_GAP_SECS,
            max_gap_secs: MAX_GAP_SECS,
            cooling_per_sec: OFFLINE_COOLING_PER_SEC,
        }
    }
}

/// What a catch-up credited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OfflineReport {
    /// Seconds credited (after the cap).
    pub elapsed_secs: u64,
    pub hashes_earned: f64,
    pub heat_cooled: f64,
}

impl OfflineReport {
    pub fn is_empty(&self) -> bool {
        self.elapsed_secs == 0
    }
}

/// Credit `rate` hashes per second for the time since `last_sync` and cool
/// the rig, then sync to `now`. Gaps under the minimum credit nothing but
/// still sync, so calling twice for one gap never double-credits.
pub fn catch_up(player: &mut PlayerState, rate: f64, now: u64, config: &OfflineConfig) -> OfflineReport {
    let gap = now.saturating_sub(player.last_sync);
    player.last_sync = now.max(player.last_sync);
    if gap < config.min_gap_secs {
        return OfflineReport::default();
    }

    let elapsed = gap.min(config.max_gap_secs);
    let hashes_earned = rate.max(0.0) * elapsed as f64;
    let heat_cooled = (elapsed as f64 * config.cooling_per_sec).min(player.heat);

    player.add_hashes(hashes_earned);
    player.set_heat(player.heat - heat_cooled);

    OfflineReport {
        elapsed_secs: elapsed,
        hashes_earned,
        heat_cooled,
    }
}
