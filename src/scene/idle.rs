//! Ambient motion while nothing else animates the head
//!
//! A gentle sway plus occasional blinks keep the avatar from freezing
//! between utterances. Blinks fire randomly with a small per-frame
//! probability and hold the lids closed briefly.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::lipsync::HeadSway;

/// Per-frame chance a blink starts
const BLINK_PROBABILITY: f64 = 0.005;

/// How long the lids stay closed once a blink starts
const BLINK_DURATION: Duration = Duration::from_millis(150);

/// Idle sway amplitude, radians
const IDLE_SWAY: f32 = 0.03;

/// Eyelid and sway state for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdleFrame {
    /// Head rotation from the idle sway
    pub sway: HeadSway,
    /// Eyelid closure weight, 1.0 mid-blink
    pub eyes_closed: f32,
}

/// Generates sway and blinks from elapsed time
pub struct IdleMotion {
    rng: StdRng,
    blink_until: Option<Duration>,
}

impl IdleMotion {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            blink_until: None,
        }
    }

    /// Deterministic variant for tests
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            blink_until: None,
        }
    }

    /// Compute the idle frame at `elapsed` since the scene started
    pub fn frame(&mut self, elapsed: Duration) -> IdleFrame {
        let blinking = match self.blink_until {
            Some(until) if elapsed < until => true,
            _ => {
                if self.rng.r#gen::<f64>() < BLINK_PROBABILITY {
                    self.blink_until = Some(elapsed + BLINK_DURATION);
                    true
                } else {
                    self.blink_until = None;
                    false
                }
            }
        };

        IdleFrame {
            sway: HeadSway {
                yaw: elapsed.as_secs_f32().sin() * IDLE_SWAY,
                pitch: 0.0,
            },
            eyes_closed: if blinking { 1.0 } else { 0.0 },
        }
    }
}

impl Default for IdleMotion {
    fn default() -> Self {
        Self::new()
    }
}
