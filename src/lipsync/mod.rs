//! Lip-sync weight generation
//!
//! Maps speech to facial morph-target weights each rendered frame. Two
//! interchangeable strategies, selected by whether a live audio signal is
//! available: a scripted viseme cycle (no audio analysis) and an
//! amplitude-driven mapping from the playback level. Strategy selection is
//! explicit at construction, not branching in the frame loop.

mod amplitude;
mod scripted;

use std::collections::BTreeMap;
use std::time::Duration;

pub use amplitude::AmplitudeDriven;
pub use scripted::ScriptedCycle;

/// Morph target names carried by the avatar asset
pub mod morphs {
    pub const MOUTH_OPEN: &str = "mouthOpen";
    pub const EYES_CLOSED: &str = "eyesClosed";

    /// Open-vowel shape (high volume)
    pub const VISEME_AA: &str = "viseme_aa";
    /// Rounded-vowel shape (medium volume)
    pub const VISEME_O: &str = "viseme_O";
    pub const VISEME_E: &str = "viseme_E";
    pub const VISEME_I: &str = "viseme_I";
    pub const VISEME_U: &str = "viseme_U";
    /// Neutral/closed
    pub const VISEME_SIL: &str = "viseme_sil";

    /// The cycle the scripted strategy walks through
    pub const TALKING_CYCLE: [&str; 6] =
        [VISEME_AA, VISEME_O, VISEME_E, VISEME_I, VISEME_U, VISEME_SIL];
}

/// Named morph-target weights in [0, 1]
///
/// Transient: recomputed every frame, never persisted. Ordered map so the
/// wire form is stable for renderers and tests.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct MorphWeights(BTreeMap<String, f32>);

impl MorphWeights {
    /// Set a weight, clamped to [0, 1]
    pub fn set(&mut self, name: &str, value: f32) {
        self.0.insert(name.to_string(), value.clamp(0.0, 1.0));
    }

    /// Current weight for a morph, zero if unset
    #[must_use]
    pub fn get(&self, name: &str) -> f32 {
        self.0.get(name).copied().unwrap_or(0.0)
    }

    /// Zero every mouth-shape weight
    pub fn zero_all(&mut self) {
        for value in self.0.values_mut() {
            *value = 0.0;
        }
    }

    /// Whether every weight is zero
    #[must_use]
    pub fn is_all_zero(&self) -> bool {
        self.0.values().all(|v| v.abs() < f32::EPSILON)
    }

    /// Iterate name/weight pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Subtle head sway applied while the driver is active
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct HeadSway {
    /// Rotation around the vertical axis, radians
    pub yaw: f32,
    /// Nod rotation, radians
    pub pitch: f32,
}

/// A per-frame weight strategy
pub trait LipSyncStrategy: Send {
    /// Update `weights` for the frame at `elapsed` since `start()`
    fn tick(&mut self, elapsed: Duration, weights: &mut MorphWeights);
}

/// Drives morph weights each frame while speech plays
///
/// `start()` begins per-frame updates until `stop()`; `stop()` zeroes all
/// weights within one frame and is idempotent.
pub struct LipSyncDriver {
    strategy: Box<dyn LipSyncStrategy>,
    weights: MorphWeights,
    active: bool,
}

impl LipSyncDriver {
    /// Create a driver with the given strategy
    #[must_use]
    pub fn new(strategy: Box<dyn LipSyncStrategy>) -> Self {
        Self {
            strategy,
            weights: MorphWeights::default(),
            active: false,
        }
    }

    /// Begin per-frame updates
    pub fn start(&mut self) {
        self.active = true;
    }

    /// Stop updates and zero all weights
    ///
    /// No-op when already stopped.
    pub fn stop(&mut self) {
        if !self.active && self.weights.is_all_zero() {
            return;
        }
        self.active = false;
        self.weights.zero_all();
    }

    /// Whether the driver is producing weights
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Compute the frame at `elapsed` since the driver was created
    ///
    /// Inactive drivers hold every weight at zero and no sway.
    pub fn frame(&mut self, elapsed: Duration) -> (&MorphWeights, HeadSway) {
        if !self.active {
            return (&self.weights, HeadSway::default());
        }

        self.strategy.tick(elapsed, &mut self.weights);

        let t = elapsed.as_secs_f32();
        let sway = HeadSway {
            yaw: (t * 2.0).sin() * 0.08,
            pitch: (t * 3.0).sin() * 0.03,
        };
        (&self.weights, sway)
    }

    /// Current weights without advancing the strategy
    #[must_use]
    pub const fn weights(&self) -> &MorphWeights {
        &self.weights
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedOpen;

    impl LipSyncStrategy for FixedOpen {
        fn tick(&mut self, _elapsed: Duration, weights: &mut MorphWeights) {
            weights.set(morphs::MOUTH_OPEN, 0.8);
        }
    }

    #[test]
    fn stop_zeroes_weights_and_is_idempotent() {
        let mut driver = LipSyncDriver::new(Box::new(FixedOpen));
        driver.start();
        driver.frame(Duration::from_millis(16));
        assert!(driver.weights().get(morphs::MOUTH_OPEN) > 0.0);

        driver.stop();
        assert!(driver.weights().is_all_zero());

        // Already stopped: still a no-op with all weights zero
        driver.stop();
        assert!(driver.weights().is_all_zero());
        assert!(!driver.is_active());
    }

    #[test]
    fn inactive_driver_emits_zero_weights_and_no_sway() {
        let mut driver = LipSyncDriver::new(Box::new(FixedOpen));
        let (weights, sway) = driver.frame(Duration::from_secs(1));
        assert!(weights.is_all_zero());
        assert_eq!(sway, HeadSway::default());
    }

    #[test]
    fn active_driver_applies_head_sway() {
        let mut driver = LipSyncDriver::new(Box::new(FixedOpen));
        driver.start();
        let (_, sway) = driver.frame(Duration::from_millis(400));
        assert!(sway.yaw.abs() <= 0.08 + f32::EPSILON);
        assert!(sway.pitch.abs() <= 0.03 + f32::EPSILON);
        assert!(sway.yaw.abs() > 0.0);
    }

    #[test]
    fn weights_clamp_to_unit_range() {
        let mut weights = MorphWeights::default();
        weights.set(morphs::VISEME_AA, 1.7);
        assert!((weights.get(morphs::VISEME_AA) - 1.0).abs() < f32::EPSILON);
        weights.set(morphs::VISEME_AA, -0.3);
        assert!(weights.get(morphs::VISEME_AA).abs() < f32::EPSILON);
    }
}
