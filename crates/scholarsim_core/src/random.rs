//! Injectable randomness for perturbation and score noise.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Source of uniform samples used by the engine.
///
/// Every `rand::Rng` is a source; tests can substitute [`FixedSource`] to pin
/// every draw to an exact position inside the requested interval.
pub trait RandomSource {
    /// Draws a sample from the closed interval `[low, high]`.
    fn uniform(&mut self, low: f64, high: f64) -> f64;
}

impl<R: Rng + ?Sized> RandomSource for R {
    /// Empty, reversed or NaN intervals yield `low`. An interval too wide for
    /// its width to be represented is sampled around its midpoint instead.
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        if low.is_nan() || high.is_nan() || low >= high {
            return low;
        }
        if (high - low).is_finite() {
            return self.gen_range(low..=high);
        }
        let half = high / 2.0 - low / 2.0;
        if !half.is_finite() {
            return low;
        }
        let mid = low / 2.0 + high / 2.0;
        (mid + half * self.gen_range(-1.0..=1.0)).clamp(low, high)
    }
}

/// Returns the point at `fraction` of every requested interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedSource {
    pub fraction: f64,
}

impl FixedSource {
    /// Always the centre of the interval, so symmetric draws are exactly zero.
    #[must_use]
    pub fn midpoint() -> Self {
        Self { fraction: 0.5 }
    }

    #[must_use]
    pub fn low() -> Self {
        Self { fraction: 0.0 }
    }

    #[must_use]
    pub fn high() -> Self {
        Self { fraction: 1.0 }
    }
}

impl RandomSource for FixedSource {
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.fraction.clamp(0.0, 1.0)
    }
}

/// Per-tick generator. With a seed every tick of a run is reproducible across
/// processes; without one the generator is seeded from OS entropy.
#[must_use]
pub fn tick_rng(seed: Option<u64>, tick: u64) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed ^ tick.wrapping_mul(0x9E37_79B9_7F4A_7C15)),
        None => ChaCha8Rng::from_entropy(),
    }
}
