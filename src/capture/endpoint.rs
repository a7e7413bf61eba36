//! Utterance endpointing
//!
//! Segments the microphone stream into utterances with local energy
//! detection: speech begins when RMS energy crosses a threshold and ends
//! after a sustained run of quiet samples. The segmented audio goes to STT;
//! the conversation-level silence windows are the controller's job, not
//! this detector's.

/// Minimum audio energy threshold to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum duration of speech to produce an utterance (in samples at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800; // 0.3 seconds

/// Silence duration to consider end of utterance (in samples)
const SILENCE_SAMPLES: usize = 8000; // 0.5 seconds

/// State of the utterance detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    /// Waiting for speech
    Idle,
    /// Accumulating a candidate utterance
    Capturing,
}

/// Segments raw audio into utterances by energy
pub struct UtteranceDetector {
    state: EndpointState,
    speech_buffer: Vec<f32>,
    silence_counter: usize,
}

impl Default for UtteranceDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl UtteranceDetector {
    /// Create a new detector in the idle state
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: EndpointState::Idle,
            speech_buffer: Vec::new(),
            silence_counter: 0,
        }
    }

    /// Process audio samples
    ///
    /// Returns true when a complete utterance is ready to take.
    pub fn process(&mut self, samples: &[f32]) -> bool {
        let energy = rms(samples);
        let is_speech = energy > ENERGY_THRESHOLD;

        match self.state {
            EndpointState::Idle => {
                if is_speech {
                    self.state = EndpointState::Capturing;
                    self.speech_buffer.clear();
                    self.speech_buffer.extend_from_slice(samples);
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech detected, capturing");
                }
            }
            EndpointState::Capturing => {
                self.speech_buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                tracing::trace!(
                    buffer_len = self.speech_buffer.len(),
                    silence = self.silence_counter,
                    is_speech,
                    energy,
                    "capturing state"
                );

                // Speech content excludes the trailing silence in the buffer
                let speech_len = self.speech_buffer.len() - self.silence_counter.min(self.speech_buffer.len());
                if self.silence_counter > SILENCE_SAMPLES && speech_len > MIN_SPEECH_SAMPLES {
                    tracing::debug!(samples = self.speech_buffer.len(), "utterance complete");
                    return true;
                }

                // Too much silence without enough speech: spurious trigger
                if self.silence_counter > SILENCE_SAMPLES * 2 {
                    tracing::trace!("spurious trigger, resetting");
                    self.reset();
                }
            }
        }

        false
    }

    /// Whether speech is currently being accumulated
    #[must_use]
    pub fn is_capturing(&self) -> bool {
        self.state == EndpointState::Capturing
    }

    /// Take the utterance audio, resetting the detector
    pub fn take_utterance(&mut self) -> Vec<f32> {
        let samples = std::mem::take(&mut self.speech_buffer);
        self.reset();
        samples
    }

    /// Accumulated speech so far
    #[must_use]
    pub fn speech_buffer(&self) -> &[f32] {
        &self.speech_buffer
    }

    /// Reset to idle
    pub fn reset(&mut self) {
        self.state = EndpointState::Idle;
        self.speech_buffer.clear();
        self.silence_counter = 0;
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> EndpointState {
        self.state
    }
}

/// RMS energy of a sample window
///
/// Shared by the detector and the mic diagnostics in the CLI.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(duration_secs: f32, amplitude: f32) -> Vec<f32> {
        let n = (16000.0 * duration_secs) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / 16000.0;
                amplitude * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
            })
            .collect()
    }

    fn silence(duration_secs: f32) -> Vec<f32> {
        vec![0.0; (16000.0 * duration_secs) as usize]
    }

    #[test]
    fn energy_calculation() {
        assert!(rms(&silence(0.01)) < 0.001);
        assert!(rms(&vec![0.5f32; 100]) > 0.4);
    }

    #[test]
    fn silence_never_starts_capture() {
        let mut detector = UtteranceDetector::new();
        assert!(!detector.process(&silence(0.1)));
        assert_eq!(detector.state(), EndpointState::Idle);
    }

    #[test]
    fn speech_then_silence_completes_an_utterance() {
        let mut detector = UtteranceDetector::new();

        detector.process(&tone(0.5, 0.3));
        assert_eq!(detector.state(), EndpointState::Capturing);

        let complete = detector.process(&silence(0.6));
        assert!(complete);

        let samples = detector.take_utterance();
        assert!(samples.len() > MIN_SPEECH_SAMPLES);
        assert_eq!(detector.state(), EndpointState::Idle);
        assert!(detector.speech_buffer().is_empty());
    }

    #[test]
    fn short_blip_resets_without_an_utterance() {
        let mut detector = UtteranceDetector::new();

        // 0.1s of sound is under the minimum speech length
        detector.process(&tone(0.1, 0.3));
        let complete = detector.process(&silence(1.2));
        assert!(!complete);
        assert_eq!(detector.state(), EndpointState::Idle);
    }

    #[test]
    fn buffer_accumulates_across_chunks() {
        let mut detector = UtteranceDetector::new();
        let chunk = tone(0.1, 0.3);
        detector.process(&chunk);
        detector.process(&chunk);
        assert_eq!(detector.speech_buffer().len(), chunk.len() * 2);
    }
}
