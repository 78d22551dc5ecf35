//! Engine tunables. Every cadence, chance and constant a designer might want
//! to rebalance lives here rather than in the handlers.

use crate::chaos::ChaosConfig;
use crate::fixed::{Fixed64, SECOND, Ticks, probability, secs};
use crate::offline::OfflineConfig;
use crate::sim::{TaskKind, TaskSchedule};
use hashforge_power::{DEFAULT_PRICE_PER_KW_SECOND, DEFAULT_SETTLEMENT_PERIOD};
use serde::{Deserialize, Serialize};

/// Task cadences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schedules {
    pub production: TaskSchedule,
    pub thermal: TaskSchedule,
    pub power: TaskSchedule,
    pub market: TaskSchedule,
    pub chaos: TaskSchedule,
    pub narrative_flavor: TaskSchedule,
    pub narrative_dilemma: TaskSchedule,
    pub autosave: TaskSchedule,
    /// Delay between ascension upload steps.
    pub upload_step: Ticks,
}

impl Default for Schedules {
    fn default() -> Self {
        Self {
            production: TaskSchedule::every(SECOND),
            thermal: TaskSchedule::with_warmup(SECOND, SECOND / 2),
            power: TaskSchedule::every(SECOND),
            market: TaskSchedule::with_warmup(secs(45), 0),
            chaos: TaskSchedule::every(secs(60)),
            narrative_flavor: TaskSchedule::every(SECOND),
            narrative_dilemma: TaskSchedule::with_warmup(secs(120), secs(10)),
            autosave: TaskSchedule::with_warmup(secs(10), secs(5)),
            upload_step: SECOND / 2,
        }
    }
}

impl Schedules {
    pub fn get(&self, kind: TaskKind) -> TaskSchedule {
        match kind {
            TaskKind::Production => self.production,
            TaskKind::Thermal => self.thermal,
            TaskKind::Power => self.power,
            TaskKind::Market => self.market,
            TaskKind::Chaos => self.chaos,
            TaskKind::NarrativeFlavor => self.narrative_flavor,
            TaskKind::NarrativeDilemma => self.narrative_dilemma,
            TaskKind::Autosave => self.autosave,
        }
    }

    pub fn all(&self) -> impl Iterator<Item = (TaskKind, TaskSchedule)> + '_ {
        TaskKind::ALL.into_iter().map(|k| (k, self.get(k)))
    }
}

/// Purge phases, in thermal ticks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PurgeConfig {
    pub heat_drop: f64,
    pub exhaust_ticks: u32,
    pub spike_ticks: u32,
    pub cooldown_ticks: u32,
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self {
            heat_drop: 40.0,
            exhaust_ticks: 30,
            spike_ticks: 10,
            cooldown_ticks: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seed for every roll the engine makes.
    pub seed: u64,
    pub schedules: Schedules,
    pub chaos: ChaosConfig,
    pub purge: PurgeConfig,
    pub offline: OfflineConfig,

    pub price_per_kw_second: f64,
    /// Power ticks between bill settlements.
    pub settlement_period: u32,
    /// Fraction of staked credits paid per minute.
    pub staking_yield_per_minute: f64,
    /// Credits per missing integrity point.
    pub repair_cost_per_point: f64,
    /// Chance a flavor line is logged when the flavor clock fills.
    pub flavor_chance: Fixed64,

    pub terminal_capacity: usize,
    pub news_capacity: usize,
    /// Delivered events kept for inspection.
    pub event_history: usize,
    /// Executed commands kept for replay. 0 disables history.
    pub command_history: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: 0x4A54_5348,
            schedules: Schedules::default(),
            chaos: ChaosConfig::default(),
            purge: PurgeConfig::default(),
            offline: OfflineConfig::default(),
            price_per_kw_second: DEFAULT_PRICE_PER_KW_SECOND,
            settlement_period: DEFAULT_SETTLEMENT_PERIOD,
            staking_yield_per_minute: 0.0005,
            repair_cost_per_point: 10.0,
            flavor_chance: probability(crate::narrative::FLAVOR_CHANCE),
            terminal_capacity: 64,
            news_capacity: 8,
            event_history: 256,
            command_history: 0,
        }
    }
}

impl EngineConfig {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// No chaos rolls. Useful for deterministic scenarios.
    pub fn calm(mut self) -> Self {
        self.chaos = ChaosConfig::disabled();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cadences() {
        let s = Schedules::default();
        assert_eq!(s.get(TaskKind::Production), TaskSchedule::every(1_000));
        assert_eq!(s.get(TaskKind::Thermal).warmup, 500);
        assert_eq!(s.get(TaskKind::Market).warmup, 0);
        assert_eq!(s.get(TaskKind::NarrativeDilemma).interval, 120_000);
        assert_eq!(s.get(TaskKind::Autosave).warmup, 5_000);
        assert_eq!(s.all().count(), TaskKind::ALL.len());
    }

    #[test]
    fn calm_disables_chaos_only() {
        let config = EngineConfig::with_seed(9).calm();
        assert_eq!(config.seed, 9);
        assert_eq!(config.chaos.breach_chance, Fixed64::ZERO);
        assert_eq!(config.settlement_period, 300);
    }

    #[test]
    fn partial_config_deserializes_with_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"seed": 3, "news_capacity": 4}"#).unwrap();
        assert_eq!(config.seed, 3);
        assert_eq!(config.news_capacity, 4);
        assert_eq!(config.terminal_capacity, 64);
    }
}
