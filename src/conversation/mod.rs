//! Conversation state machine and history
//!
//! The controller owns the listening/thinking/speaking loop; everything else
//! in the crate is a stateless transformer or a passive renderer feed.

mod controller;
mod history;

pub use controller::{
    ConversationController, ConversationEvent, Effect, Phase, SILENCE_DIRECTIVE,
};
pub use history::{History, Role, Turn};
