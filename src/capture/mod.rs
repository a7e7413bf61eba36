//! Speech capture
//!
//! Microphone input and energy-based utterance endpointing. Capture is active
//! only while the conversation is Listening; the session runner enforces
//! that gating.

mod endpoint;
mod mic;

pub use endpoint::{EndpointState, UtteranceDetector, rms};
pub use mic::{Microphone, SAMPLE_RATE, encode_wav};
