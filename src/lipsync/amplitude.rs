//! Amplitude-driven lip sync
//!
//! Samples the live playback level each frame and maps it to mouth openness
//! plus a small discrete set of mouth shapes by fixed thresholds: loud maps
//! to the open vowel, medium to the rounded vowel, quiet to neutral/closed.

use std::time::Duration;

use crate::playback::OutputLevel;

use super::{LipSyncStrategy, MorphWeights, morphs};

/// Volume above this maps to the open-vowel shape
const OPEN_VOWEL_THRESHOLD: f32 = 0.5;

/// Volume above this (and below open) maps to the rounded-vowel shape
const ROUNDED_VOWEL_THRESHOLD: f32 = 0.2;

/// Maps the live output level to mouth shapes
pub struct AmplitudeDriven {
    level: OutputLevel,
}

impl AmplitudeDriven {
    /// Create a strategy reading from the given level tap
    #[must_use]
    pub const fn new(level: OutputLevel) -> Self {
        Self { level }
    }
}

impl LipSyncStrategy for AmplitudeDriven {
    fn tick(&mut self, _elapsed: Duration, weights: &mut MorphWeights) {
        let volume = self.level.get();

        weights.set(morphs::VISEME_AA, 0.0);
        weights.set(morphs::VISEME_O, 0.0);
        weights.set(morphs::VISEME_SIL, 0.0);

        if volume > OPEN_VOWEL_THRESHOLD {
            weights.set(morphs::VISEME_AA, volume);
        } else if volume > ROUNDED_VOWEL_THRESHOLD {
            weights.set(morphs::VISEME_O, volume);
        } else {
            weights.set(morphs::VISEME_SIL, 1.0 - volume);
        }

        weights.set(morphs::MOUTH_OPEN, volume);
    }
}
