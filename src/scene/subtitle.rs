//! Subtitle reveal timing
//!
//! Reveals the reply text a word at a time while it is spoken so the
//! caption roughly tracks the voice without per-word audio alignment.

use std::time::Duration;

/// Fixed cadence between revealed words
pub const WORD_INTERVAL: Duration = Duration::from_millis(280);

/// Word-by-word reveal of a single utterance
///
/// Pure function of elapsed time, so callers can poll it at any frame rate.
#[derive(Debug, Clone)]
pub struct SubtitleTicker {
    words: Vec<String>,
}

impl SubtitleTicker {
    /// Split `text` on whitespace for word-at-a-time reveal
    #[must_use]
    pub fn new(text: &str) -> Self {
        Self {
            words: text.split_whitespace().map(str::to_string).collect(),
        }
    }

    /// The text visible at `elapsed` since speech began
    ///
    /// The first word shows immediately; each interval reveals one more.
    #[must_use]
    pub fn revealed(&self, elapsed: Duration) -> String {
        if self.words.is_empty() {
            return String::new();
        }
        let shown = (elapsed.as_millis() / WORD_INTERVAL.as_millis()) as usize + 1;
        self.words[..shown.min(self.words.len())].join(" ")
    }

    /// Whether every word is visible at `elapsed`
    #[must_use]
    pub fn is_complete(&self, elapsed: Duration) -> bool {
        self.revealed(elapsed).len() == self.words.join(" ").len()
    }
}
