//! Engine parameters.
//!
//! Maps to the `[engine]` table of `scholarsim.toml`:
//!
//! ```toml
//! [engine]
//! step_size = 0.1
//! base_score = 70.0
//! noise_amplitude = 5.0
//! neutral_baseline = 1.0
//! seed = 42
//! deterministic = true
//!
//! [engine.weights]
//! internal = 0.4
//! external = 0.3
//! institutional = 0.3
//! ```

use crate::lookup::LookupBuilder;
use crate::perturbation::{RandomWalk, DEFAULT_STEP_SIZE};
use crate::scoring::{
    FactorWeights, ScoringEngine, DEFAULT_BASE_SCORE, DEFAULT_NOISE_AMPLITUDE, NEUTRAL_BASELINE,
};
use scholarsim_data::RatingRange;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub step_size: f64,
    pub rating_range: RatingRange,
    pub weights: FactorWeights,
    pub base_score: f64,
    pub noise_amplitude: f64,
    pub neutral_baseline: f64,
    pub seed: Option<u64>,
    pub deterministic: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_size: DEFAULT_STEP_SIZE,
            rating_range: RatingRange::CANONICAL,
            weights: FactorWeights::default(),
            base_score: DEFAULT_BASE_SCORE,
            noise_amplitude: DEFAULT_NOISE_AMPLITUDE,
            neutral_baseline: NEUTRAL_BASELINE,
            seed: None,
            deterministic: false,
        }
    }
}

impl EngineConfig {
    /// Returns the first rule the parameters break, if any.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.step_size.is_finite() && self.step_size >= 0.0,
            "Step size must be non-negative"
        );
        anyhow::ensure!(
            self.rating_range.is_valid(),
            "Rating range must be finite with min < max"
        );
        let width = self.rating_range.max - self.rating_range.min;
        anyhow::ensure!(
            width.is_finite() && self.step_size <= width,
            "Step size must not exceed the rating range width ({width})"
        );
        anyhow::ensure!(
            self.weights.internal >= 0.0
                && self.weights.external >= 0.0
                && self.weights.institutional >= 0.0,
            "Factor weights must be non-negative"
        );
        anyhow::ensure!(
            (self.weights.sum() - 1.0).abs() <= 1e-6,
            "Factor weights must sum to 1.0 (got {})",
            self.weights.sum()
        );
        anyhow::ensure!(
            self.base_score.is_finite() && self.base_score >= 0.0,
            "Base score must be non-negative"
        );
        anyhow::ensure!(
            self.noise_amplitude >= 0.0 && (2.0 * self.noise_amplitude).is_finite(),
            "Noise amplitude must be non-negative and span a finite interval"
        );
        anyhow::ensure!(
            self.neutral_baseline.is_finite(),
            "Neutral baseline must be finite"
        );
        anyhow::ensure!(
            !self.deterministic || self.seed.is_some(),
            "Deterministic mode needs a seed"
        );
        Ok(())
    }

    /// Seed used for tick generators; `None` draws from OS entropy.
    #[must_use]
    pub fn effective_seed(&self) -> Option<u64> {
        if self.deterministic {
            self.seed
        } else {
            None
        }
    }

    #[must_use]
    pub fn lookup_builder(&self) -> LookupBuilder {
        LookupBuilder::new(self.rating_range)
    }

    #[must_use]
    pub fn random_walk(&self) -> RandomWalk {
        RandomWalk::new(self.step_size, self.rating_range)
    }

    #[must_use]
    pub fn scoring(&self) -> ScoringEngine {
        ScoringEngine {
            weights: self.weights,
            base_score: self.base_score,
            noise_amplitude: self.noise_amplitude,
            baseline: self.neutral_baseline,
            range: self.rating_range,
        }
    }

    /// Hash of every parameter that changes tick results. Stored next to the
    /// cached state so a run resumed under different parameters is visible.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(format!("{:?}", self.rating_range).as_bytes());
        hasher.update(format!("{:?}", self.weights).as_bytes());
        hasher.update(self.step_size.to_le_bytes());
        hasher.update(self.base_score.to_le_bytes());
        hasher.update(self.noise_amplitude.to_le_bytes());
        hasher.update(self.neutral_baseline.to_le_bytes());
        hex::encode(hasher.finalize())
    }
}
