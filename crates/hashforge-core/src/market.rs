//! Market sentiment: headline rolls that move the sell rate and production.

use crate::faction::FactionPerks;
use crate::rng::SimRng;
use serde::{Deserialize, Serialize};

/// Credits paid per hash at neutral sentiment.
pub const BASE_SELL_RATE: f64 = 0.10;
pub const DRIFT_MIN: f64 = 0.8;
pub const DRIFT_MAX: f64 = 1.2;

/// A news headline and its effect on the market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Headline {
    pub text: String,
    #[serde(default = "one")]
    pub sell_multiplier: f64,
    #[serde(default = "one")]
    pub production_multiplier: f64,
}

fn one() -> f64 {
    1.0
}

impl Headline {
    pub fn new(text: &str, sell_multiplier: f64, production_multiplier: f64) -> Self {
        Self {
            text: text.to_string(),
            sell_multiplier,
            production_multiplier,
        }
    }
}

/// Current market conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketState {
    pub sell_multiplier: f64,
    pub production_multiplier: f64,
    pub drift: f64,
    pub headline: Option<String>,
    pub rolls: u64,
}

impl Default for MarketState {
    fn default() -> Self {
        Self {
            sell_multiplier: 1.0,
            production_multiplier: 1.0,
            drift: 1.0,
            headline: None,
            rolls: 0,
        }
    }
}

impl MarketState {
    /// Credits per hash right now.
    pub fn sell_rate(&self) -> f64 {
        BASE_SELL_RATE * self.drift * self.sell_multiplier
    }

    /// Roll a new headline and drift. Returns the headline text, or `None`
    /// when there are no headlines to choose from (drift still moves).
    pub fn roll(
        &mut self,
        headlines: &[Headline],
        perks: &FactionPerks,
        rng: &mut SimRng,
    ) -> Option<String> {
        self.rolls += 1;
        self.drift = rng.range_f64(DRIFT_MIN, DRIFT_MAX);
        let headline = rng.pick(headlines)?;

        self.sell_multiplier = if perks.market_immune {
            headline.sell_multiplier.max(1.0)
        } else {
            headline.sell_multiplier
        };
        self.production_multiplier = if headline.production_multiplier < 1.0 {
            let penalty = (1.0 - headline.production_multiplier) * (1.0 - perks.market_discount);
            1.0 - penalty
        } else {
            headline.production_multiplier
        };
        self.headline = Some(headline.text.clone());
        self.headline.clone()
    }
}
