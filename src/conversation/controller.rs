//! Conversation state machine
//!
//! The controller is the only component with cross-cutting state: it owns the
//! history, the current phase, and the in-progress transcript, and decides
//! when capture runs, when the chat backend is called, and when synthesized
//! speech plays. It is a pure state machine — events in, effects out — so the
//! whole turn-taking contract is testable without audio hardware, timers, or
//! a network. The session runner interprets the effects.
//!
//! Phase gating doubles as concurrency control: a chat request is only issued
//! from Listening (which stops capture), and its result is only accepted in
//! Thinking, so at most one request of each kind is ever outstanding.

use std::time::Duration;

use crate::config::TimingConfig;

use super::history::{History, Turn};

/// Directive turn injected when the user says nothing for the long-silence
/// window, sent through the normal chat path so the reply threads naturally.
pub const SILENCE_DIRECTIVE: &str =
    "(The user has been quiet for a while. Gently ask a short follow-up \
     question to keep the conversation going.)";

/// Current phase of the conversation
///
/// Exactly one phase is active at a time. Listening and Speaking are mutually
/// exclusive by construction: every transition into one emits the effect that
/// stops the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Session not yet started
    Idle,
    /// Capture active, waiting for the user
    Listening,
    /// Chat request outstanding
    Thinking,
    /// Synthesized speech playing, lip-sync active
    Speaking,
    /// Error shown, timed recovery back to Listening armed
    Recovering,
}

impl Phase {
    /// Wire name for status events
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Thinking => "thinking",
            Self::Speaking => "speaking",
            Self::Recovering => "recovering",
        }
    }
}

/// Input events, raised by capture, timers, backends, and playback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationEvent {
    /// Begin the session with the opening line
    Start,
    /// Cumulative transcript replacement (not a delta)
    TranscriptUpdate(String),
    /// Recognizer finalized the current utterance
    TranscriptFinal(String),
    /// Quiet interval elapsed since the last transcript update
    ShortSilenceElapsed,
    /// No speech at all within the long window
    LongSilenceElapsed,
    /// Assistant reply arrived
    ChatResult(String),
    /// Chat backend failed
    ChatError(String),
    /// Synthesis or playback failed after any fallback was tried
    SynthesisFailed(String),
    /// Playback of the current reply finished
    SpeechEnded,
    /// Fixed-delay error recovery elapsed
    RetryElapsed,
}

/// Output effects for the session runner to interpret
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Start speech capture after the given debounce
    StartCapture { debounce: Duration },
    /// Stop speech capture
    StopCapture,
    /// Issue a chat request with the full ordered history
    RequestChat(Vec<Turn>),
    /// Synthesize and play the text, driving lip-sync and subtitles
    Speak(String),
    /// Stop playback and zero lip-sync weights
    StopSpeaking,
    /// (Re)arm the short-silence timer
    ArmShortSilence(Duration),
    /// (Re)arm the long-silence timer
    ArmLongSilence(Duration),
    /// Cancel both silence timers
    CancelSilenceTimers,
    /// Arm the error-recovery timer
    ArmRetry(Duration),
    /// Surface a user-visible status message
    ShowStatus(String),
}

/// The conversation controller
#[derive(Debug)]
pub struct ConversationController {
    timing: TimingConfig,
    opening_line: String,
    history: History,
    phase: Phase,
    transcript: String,
    started: bool,
}

impl ConversationController {
    /// Create a controller in Idle with a system-seeded history
    #[must_use]
    pub fn new(
        timing: TimingConfig,
        system_prompt: impl Into<String>,
        opening_line: impl Into<String>,
    ) -> Self {
        Self {
            timing,
            opening_line: opening_line.into(),
            history: History::new(system_prompt),
            phase: Phase::Idle,
            transcript: String::new(),
            started: false,
        }
    }

    /// Current phase
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Conversation history so far
    #[must_use]
    pub const fn history(&self) -> &History {
        &self.history
    }

    /// Current in-progress transcript
    #[must_use]
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Apply one event, returning the effects to run
    ///
    /// Events that don't apply to the current phase are dropped: that is the
    /// gating that keeps stale backend results and timer fires from a prior
    /// phase from corrupting the session.
    pub fn handle(&mut self, event: ConversationEvent) -> Vec<Effect> {
        match (self.phase, event) {
            (Phase::Idle, ConversationEvent::Start) => self.start(),

            (Phase::Listening, ConversationEvent::TranscriptUpdate(text)) => {
                self.transcript = text;
                vec![
                    Effect::ArmShortSilence(self.timing.short_silence),
                    Effect::ArmLongSilence(self.timing.long_silence),
                ]
            }
            (Phase::Listening, ConversationEvent::TranscriptFinal(text)) => self.finalize(text),
            (Phase::Listening, ConversationEvent::ShortSilenceElapsed) => {
                let text = std::mem::take(&mut self.transcript);
                self.finalize(text)
            }
            (Phase::Listening, ConversationEvent::LongSilenceElapsed) => {
                tracing::info!("long silence, asking a follow-up");
                self.history.push(Turn::user(SILENCE_DIRECTIVE));
                self.request_chat()
            }

            (Phase::Thinking, ConversationEvent::ChatResult(text)) => {
                self.history.push(Turn::assistant(text.clone()));
                self.phase = Phase::Speaking;
                vec![Effect::Speak(text)]
            }
            (Phase::Thinking, ConversationEvent::ChatError(err)) => {
                tracing::warn!(error = %err, "chat failed, recovery armed");
                self.phase = Phase::Recovering;
                vec![
                    Effect::ShowStatus(format!("The connection faltered: {err}")),
                    Effect::ArmRetry(self.timing.retry_delay),
                ]
            }

            (Phase::Speaking, ConversationEvent::SpeechEnded) => {
                let mut effects = vec![Effect::StopSpeaking];
                self.enter_listening(&mut effects);
                effects
            }
            (Phase::Speaking, ConversationEvent::SynthesisFailed(err)) => {
                tracing::warn!(error = %err, "synthesis failed, resuming listening");
                let mut effects = vec![
                    Effect::StopSpeaking,
                    Effect::ShowStatus(format!("I lost my voice for a moment: {err}")),
                ];
                self.enter_listening(&mut effects);
                effects
            }

            (Phase::Recovering, ConversationEvent::RetryElapsed) => {
                let mut effects = Vec::new();
                self.enter_listening(&mut effects);
                effects
            }

            (phase, event) => {
                tracing::debug!(phase = phase.as_str(), ?event, "event dropped by phase gate");
                Vec::new()
            }
        }
    }

    /// Idle → Speaking with the fixed opening line, one-shot per session
    fn start(&mut self) -> Vec<Effect> {
        if self.started {
            return Vec::new();
        }
        self.started = true;
        self.phase = Phase::Speaking;
        self.history.push(Turn::assistant(self.opening_line.clone()));
        vec![Effect::Speak(self.opening_line.clone())]
    }

    /// Handle a finalized utterance while Listening
    fn finalize(&mut self, text: String) -> Vec<Effect> {
        let trimmed = text.trim();
        if trimmed.chars().count() <= self.timing.min_transcript_chars {
            // Noise rejection: back to Listening without touching the backend
            tracing::debug!(text = trimmed, "transcript below threshold, ignored");
            self.transcript.clear();
            return vec![
                Effect::CancelSilenceTimers,
                Effect::ArmLongSilence(self.timing.long_silence),
            ];
        }

        tracing::info!(utterance = trimmed, "user turn finalized");
        self.history.push(Turn::user(trimmed.to_string()));
        self.request_chat()
    }

    /// Listening → Thinking, issuing a chat request with the full history
    fn request_chat(&mut self) -> Vec<Effect> {
        self.phase = Phase::Thinking;
        self.transcript.clear();
        vec![
            Effect::StopCapture,
            Effect::CancelSilenceTimers,
            Effect::RequestChat(self.history.turns().to_vec()),
        ]
    }

    /// Enter Listening: reset the transcript, restart capture, arm the long
    /// window. The short timer stays unarmed until the first transcript
    /// update.
    fn enter_listening(&mut self, effects: &mut Vec<Effect>) {
        self.phase = Phase::Listening;
        self.transcript.clear();
        effects.push(Effect::StartCapture { debounce: self.timing.speaking_debounce });
        effects.push(Effect::ArmLongSilence(self.timing.long_silence));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::history::Role;

    fn controller() -> ConversationController {
        ConversationController::new(TimingConfig::default(), "seed prompt", "hello there")
    }

    fn speak_then_listen(c: &mut ConversationController) {
        c.handle(ConversationEvent::Start);
        c.handle(ConversationEvent::SpeechEnded);
        assert_eq!(c.phase(), Phase::Listening);
    }

    #[test]
    fn start_speaks_the_opening_line_once() {
        let mut c = controller();
        let effects = c.handle(ConversationEvent::Start);
        assert_eq!(effects, vec![Effect::Speak("hello there".to_string())]);
        assert_eq!(c.phase(), Phase::Speaking);
        assert_eq!(c.history().last().unwrap().content, "hello there");

        // One-shot for the session
        assert!(c.handle(ConversationEvent::Start).is_empty());
    }

    #[test]
    fn utterance_flows_through_a_full_turn() {
        let mut c = controller();
        speak_then_listen(&mut c);

        let effects = c.handle(ConversationEvent::TranscriptFinal(
            "What does Mars in retrograde mean for me?".to_string(),
        ));
        assert_eq!(c.phase(), Phase::Thinking);
        let Some(Effect::RequestChat(turns)) = effects.last() else {
            panic!("expected a chat request, got {effects:?}");
        };
        assert_eq!(turns.last().unwrap().role, Role::User);
        assert!(turns.last().unwrap().content.contains("Mars"));

        let effects = c.handle(ConversationEvent::ChatResult("Bold choices ahead.".to_string()));
        assert_eq!(c.phase(), Phase::Speaking);
        assert_eq!(effects, vec![Effect::Speak("Bold choices ahead.".to_string())]);
        assert_eq!(c.history().last().unwrap().role, Role::Assistant);

        let effects = c.handle(ConversationEvent::SpeechEnded);
        assert_eq!(c.phase(), Phase::Listening);
        assert_eq!(effects[0], Effect::StopSpeaking);
    }

    #[test]
    fn every_chat_request_carries_the_full_history() {
        let mut c = controller();
        speak_then_listen(&mut c);
        c.handle(ConversationEvent::TranscriptFinal("first question".to_string()));
        c.handle(ConversationEvent::ChatResult("first answer".to_string()));
        c.handle(ConversationEvent::SpeechEnded);

        let effects = c.handle(ConversationEvent::TranscriptFinal("second question".to_string()));
        let Some(Effect::RequestChat(turns)) = effects.last() else {
            panic!("expected a chat request");
        };
        // system seed + opening + q1 + a1 + q2, none lost or duplicated
        assert_eq!(turns.len(), 5);
        assert_eq!(turns[0].role, Role::System);
        assert_eq!(turns[2].content, "first question");
        assert_eq!(turns[4].content, "second question");
    }

    #[test]
    fn noise_rejection_skips_the_backend() {
        let mut c = controller();
        speak_then_listen(&mut c);
        let before = c.history().len();

        let effects = c.handle(ConversationEvent::TranscriptFinal("um".to_string()));
        assert_eq!(c.phase(), Phase::Listening);
        assert_eq!(c.history().len(), before);
        assert!(!effects.iter().any(|e| matches!(e, Effect::RequestChat(_))));
        assert!(effects.contains(&Effect::ArmLongSilence(TimingConfig::default().long_silence)));
    }

    #[test]
    fn transcript_updates_restart_both_silence_timers() {
        let mut c = controller();
        speak_then_listen(&mut c);

        let effects = c.handle(ConversationEvent::TranscriptUpdate("what does".to_string()));
        assert_eq!(
            effects,
            vec![
                Effect::ArmShortSilence(TimingConfig::default().short_silence),
                Effect::ArmLongSilence(TimingConfig::default().long_silence),
            ]
        );
        // Wholesale replacement, not a merge
        c.handle(ConversationEvent::TranscriptUpdate("what does mars".to_string()));
        assert_eq!(c.transcript(), "what does mars");
    }

    #[test]
    fn short_silence_finalizes_the_current_transcript() {
        let mut c = controller();
        speak_then_listen(&mut c);
        c.handle(ConversationEvent::TranscriptUpdate("tell me about venus".to_string()));

        let effects = c.handle(ConversationEvent::ShortSilenceElapsed);
        assert_eq!(c.phase(), Phase::Thinking);
        let Some(Effect::RequestChat(turns)) = effects.last() else {
            panic!("expected a chat request");
        };
        assert_eq!(turns.last().unwrap().content, "tell me about venus");
    }

    #[test]
    fn short_silence_with_empty_transcript_is_noise() {
        let mut c = controller();
        speak_then_listen(&mut c);
        let effects = c.handle(ConversationEvent::ShortSilenceElapsed);
        assert_eq!(c.phase(), Phase::Listening);
        assert!(!effects.iter().any(|e| matches!(e, Effect::RequestChat(_))));
    }

    #[test]
    fn long_silence_injects_the_follow_up_directive() {
        let mut c = controller();
        speak_then_listen(&mut c);

        let effects = c.handle(ConversationEvent::LongSilenceElapsed);
        assert_eq!(c.phase(), Phase::Thinking);
        let Some(Effect::RequestChat(turns)) = effects.last() else {
            panic!("expected a chat request");
        };
        let last = turns.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert_eq!(last.content, SILENCE_DIRECTIVE);
    }

    #[test]
    fn chat_error_recovers_to_listening_without_duplicating_turns() {
        let mut c = controller();
        speak_then_listen(&mut c);
        c.handle(ConversationEvent::TranscriptFinal("a real question".to_string()));
        let len_before = c.history().len();

        let effects = c.handle(ConversationEvent::ChatError("upstream 500".to_string()));
        assert_eq!(c.phase(), Phase::Recovering);
        assert!(effects.iter().any(|e| matches!(e, Effect::ShowStatus(_))));
        assert!(effects.contains(&Effect::ArmRetry(TimingConfig::default().retry_delay)));

        let effects = c.handle(ConversationEvent::RetryElapsed);
        assert_eq!(c.phase(), Phase::Listening);
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::StartCapture { .. })));
        assert_eq!(c.history().len(), len_before);
    }

    #[test]
    fn synthesis_failure_resumes_listening() {
        let mut c = controller();
        c.handle(ConversationEvent::Start);
        let effects = c.handle(ConversationEvent::SynthesisFailed("no audio".to_string()));
        assert_eq!(c.phase(), Phase::Listening);
        assert_eq!(effects[0], Effect::StopSpeaking);
    }

    #[test]
    fn listening_and_speaking_are_mutually_exclusive() {
        let mut c = controller();
        c.handle(ConversationEvent::Start);
        // Transitions into Speaking never leave capture running, and
        // transitions into Listening always stop playback first.
        c.handle(ConversationEvent::SpeechEnded);
        c.handle(ConversationEvent::TranscriptFinal("what about saturn".to_string()));
        let effects = c.handle(ConversationEvent::ChatResult("rings".to_string()));
        assert_eq!(c.phase(), Phase::Speaking);
        assert!(!effects.iter().any(|e| matches!(e, Effect::StartCapture { .. })));
    }

    #[test]
    fn stale_events_are_dropped_by_the_phase_gate() {
        let mut c = controller();
        // Not listening: transcripts ignored
        assert!(c.handle(ConversationEvent::TranscriptFinal("hello".to_string())).is_empty());
        // Not thinking: results ignored
        assert!(c.handle(ConversationEvent::ChatResult("stray".to_string())).is_empty());
        // Not recovering: retry ignored
        assert!(c.handle(ConversationEvent::RetryElapsed).is_empty());
        assert_eq!(c.phase(), Phase::Idle);
        assert_eq!(c.history().len(), 1);
    }
}
