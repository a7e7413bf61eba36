//! Upstream AI providers
//!
//! Thin request/response clients behind capability traits, so the session
//! and the proxy endpoints never see providers directly and tests can
//! substitute fakes.

mod chat;
mod stt;
mod tts;

pub use chat::{ChatBackend, OpenAiChat};
pub use stt::SpeechToText;
pub use tts::{SpeechSynthesizer, TextToSpeech};
