//! Astra Gateway - Conversational avatar gateway
//!
//! This library provides the core functionality for the astra gateway:
//! - Conversation state machine (listen, think, speak)
//! - Speech capture with energy-based utterance endpointing
//! - STT/TTS/chat provider proxies
//! - Lip-sync morph weights and subtitle timing for browser renderers
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                Browser renderers                     │
//! │   3D avatar  │  subtitles  │  optional mic/speaker  │
//! └────────────────────┬────────────────────────────────┘
//!                      │ ws + http
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Astra Gateway                        │
//! │   Session  │  Controller  │  Capture  │  Lip sync   │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │              Speech & chat providers                 │
//! │   Chat completion  │  Whisper STT  │  TTS           │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod capture;
pub mod config;
pub mod conversation;
pub mod error;
pub mod lipsync;
pub mod playback;
pub mod providers;
pub mod scene;
pub mod session;

pub use config::Config;
pub use conversation::{ConversationController, ConversationEvent, Effect, Phase};
pub use error::{Error, Result};
pub use session::Session;
