//! Scripted viseme cycle
//!
//! Approximates speech without audio analysis: walks a fixed ordered list of
//! mouth shapes at a fixed tick, with randomized intensity in a bounded
//! range each tick. Used when no live audio signal is available (e.g. the
//! browser-local synthesis fallback).

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{LipSyncStrategy, MorphWeights, morphs};

/// Time each viseme holds before advancing
const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Intensity floor for each tick
const MIN_INTENSITY: f32 = 0.3;

/// Random intensity span above the floor
const INTENSITY_SPAN: f32 = 0.5;

/// Cycles through mouth shapes on a fixed clock
pub struct ScriptedCycle {
    index: usize,
    last_tick: Option<Duration>,
    rng: StdRng,
}

impl Default for ScriptedCycle {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedCycle {
    /// Create a cycle starting at the first viseme
    #[must_use]
    pub fn new() -> Self {
        Self {
            index: 0,
            last_tick: None,
            rng: StdRng::from_entropy(),
        }
    }

    /// Create a cycle with a fixed seed, for deterministic tests
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            index: 0,
            last_tick: None,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl LipSyncStrategy for ScriptedCycle {
    fn tick(&mut self, elapsed: Duration, weights: &mut MorphWeights) {
        let due = self
            .last_tick
            .is_none_or(|last| elapsed.saturating_sub(last) >= TICK_INTERVAL);
        if !due {
            return;
        }
        self.last_tick = Some(elapsed);

        for viseme in morphs::TALKING_CYCLE {
            weights.set(viseme, 0.0);
        }

        let intensity = MIN_INTENSITY + self.rng.r#gen::<f32>() * INTENSITY_SPAN;
        weights.set(morphs::TALKING_CYCLE[self.index], intensity);
        weights.set(morphs::MOUTH_OPEN, intensity * 0.7);

        self.index = (self.index + 1) % morphs::TALKING_CYCLE.len();
    }
}
