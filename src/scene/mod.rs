//! Presentation state for connected renderers
//!
//! The gateway owns no rendering. It computes per-frame avatar state (morph
//! weights, head rotation), idle motion, and subtitle reveal timing, and
//! ships them to browser renderers over the websocket. This module is the
//! renderer-facing vocabulary for that stream.

mod idle;
mod subtitle;

pub use idle::{IdleFrame, IdleMotion};
pub use subtitle::SubtitleTicker;

use serde::Serialize;

use crate::lipsync::{HeadSway, MorphWeights};

/// Default avatar asset served to renderers that bring none of their own
pub const DEFAULT_AVATAR_URL: &str =
    "https://models.readyplayer.me/64bfa15f0e72c63d7c3934a6.glb";

/// The avatar asset a renderer should load
///
/// `placeholder` tells the renderer to fall back to a simple primitive head
/// when the asset fails to load rather than presenting nothing.
#[derive(Debug, Clone, Serialize)]
pub struct AvatarDescriptor {
    /// Asset URL (glTF binary with morph targets)
    pub url: String,
    /// Whether a primitive stand-in is acceptable on load failure
    pub placeholder: bool,
}

impl AvatarDescriptor {
    /// Descriptor for a configured asset URL
    #[must_use]
    pub const fn new(url: String) -> Self {
        Self {
            url,
            placeholder: true,
        }
    }
}

impl Default for AvatarDescriptor {
    fn default() -> Self {
        Self::new(DEFAULT_AVATAR_URL.to_string())
    }
}

/// One frame of avatar state, broadcast at the frame tick
#[derive(Debug, Clone, Serialize)]
pub struct AvatarFrame {
    /// Morph-target weights by name
    pub weights: MorphWeights,
    /// Head rotation for this frame
    pub head: HeadSway,
}
