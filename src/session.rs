//! Session runner
//!
//! Owns the live conversation: it feeds events into the controller,
//! interprets the effects it returns (capture, timers, chat, speech), and
//! broadcasts the presentation stream to connected renderers. All I/O
//! lives here so the controller stays a pure state machine.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};

use crate::api::events::WsOutgoing;
use crate::api::{ApiServer, ApiState};
use crate::capture::{Microphone, UtteranceDetector, encode_wav};
use crate::config::Config;
use crate::conversation::{ConversationController, ConversationEvent, Effect};
use crate::lipsync::{AmplitudeDriven, LipSyncDriver, MorphWeights, ScriptedCycle, morphs};
use crate::playback::{AudioPlayback, StopFlag};
use crate::providers::{
    ChatBackend, OpenAiChat, SpeechSynthesizer, SpeechToText, TextToSpeech,
};
use crate::scene::{AvatarDescriptor, AvatarFrame, IdleMotion, SubtitleTicker};
use crate::{Error, Result};

/// Frame tick for the presentation stream, ~30fps
const FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// How often buffered capture audio is drained into the endpointer
const CAPTURE_POLL: Duration = Duration::from_millis(100);

/// A queued playback request for the audio thread
struct PlaybackJob {
    audio: Vec<u8>,
    stop: StopFlag,
}

/// The live conversation session
pub struct Session {
    config: Config,
    controller: ConversationController,
    chat: Arc<dyn ChatBackend>,
    stt: Option<Arc<SpeechToText>>,
    synth: Arc<TextToSpeech>,
    auto_start: bool,
}

impl Session {
    /// Build a session from configuration
    ///
    /// # Errors
    ///
    /// Returns error when no provider key is configured.
    pub fn new(config: Config, auto_start: bool) -> Result<Self> {
        let openai_key = config
            .api_keys
            .openai
            .clone()
            .ok_or_else(|| Error::Config("OPENAI_API_KEY is required".to_string()))?;

        let chat: Arc<dyn ChatBackend> = Arc::new(OpenAiChat::new(
            openai_key.clone(),
            config.chat_model.clone(),
            config.max_tokens,
        )?);

        let stt = SpeechToText::new(openai_key.clone(), config.voice.stt_model.clone())
            .map(Arc::new)
            .ok();

        let mut synth = TextToSpeech::new_openai(
            openai_key,
            config.voice.tts_voice.clone(),
            config.voice.tts_speed,
            config.voice.tts_model.clone(),
        )?;
        if let Some(elevenlabs_key) = config.api_keys.elevenlabs.clone() {
            synth = synth.with_fallback(TextToSpeech::new_elevenlabs(
                elevenlabs_key,
                config.voice.elevenlabs_voice_id.clone(),
            )?);
        }

        let controller = ConversationController::new(
            config.timing,
            config.system_prompt.clone(),
            config.opening_line.clone(),
        );

        Ok(Self {
            config,
            controller,
            chat,
            stt,
            synth: Arc::new(synth),
            auto_start,
        })
    }

    /// Run the session until shutdown
    ///
    /// # Errors
    ///
    /// Returns error when the API server cannot bind.
    #[allow(clippy::too_many_lines, clippy::future_not_send)]
    pub async fn run(mut self, shutdown_rx: &mut mpsc::Receiver<()>) -> Result<()> {
        let (events_tx, mut events_rx) = mpsc::channel::<ConversationEvent>(32);
        let (updates_tx, _) = broadcast::channel::<WsOutgoing>(64);

        let api_state = Arc::new(ApiState {
            chat: self.chat.clone(),
            synth: self.synth.clone(),
            avatar: AvatarDescriptor::new(self.config.avatar.model_url.clone()),
            updates: updates_tx.clone(),
            events: events_tx.clone(),
        });
        let _api_handle = ApiServer::new(api_state, self.config.server.port).spawn();

        // Playback runs on its own thread: cpal streams are not Send. With
        // voice disabled there is no thread and renderers play replies
        // themselves.
        let (jobs_tx, level) = if self.config.voice.enabled {
            let (jobs_tx, level) = spawn_playback_thread(events_tx.clone());
            (Some(jobs_tx), level)
        } else {
            (None, None)
        };

        // Amplitude lip sync when the output level tap exists, otherwise the
        // scripted viseme cycle
        let mut lipsync = match level {
            Some(level) => LipSyncDriver::new(Box::new(AmplitudeDriven::new(level))),
            None => LipSyncDriver::new(Box::new(ScriptedCycle::new())),
        };
        let mut idle = IdleMotion::new();

        let mut mic = if self.config.voice.enabled {
            match Microphone::open().and_then(|mut mic| mic.start().map(|()| mic)) {
                Ok(mic) => Some(mic),
                Err(e) => {
                    tracing::warn!(error = %e, "microphone unavailable, renderer-side capture only");
                    None
                }
            }
        } else {
            tracing::info!("voice disabled in config, renderer-side capture only");
            None
        };
        let mut detector = UtteranceDetector::new();

        let started_at = Instant::now();
        let mut frame_tick = tokio::time::interval(FRAME_INTERVAL);
        let mut capture_tick = tokio::time::interval(CAPTURE_POLL);

        let mut timers = Timers::default();
        let mut listening = false;
        let mut speech_stop = StopFlag::default();
        let mut subtitle: Option<(SubtitleTicker, Instant)> = None;
        let mut last_subtitle = String::new();
        let mut last_phase = self.controller.phase();

        if self.auto_start {
            let _ = events_tx.send(ConversationEvent::Start).await;
        }

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("shutdown requested");
                    break;
                }
                Some(event) = events_rx.recv() => {
                    let effects = self.controller.handle(event);
                    for effect in effects {
                        self.apply_effect(
                            effect,
                            &events_tx,
                            &updates_tx,
                            jobs_tx.as_ref(),
                            &mut timers,
                            &mut listening,
                            &mut speech_stop,
                            &mut lipsync,
                            &mut subtitle,
                            &mut detector,
                            mic.as_ref(),
                        );
                    }
                    let phase = self.controller.phase();
                    if phase != last_phase {
                        last_phase = phase;
                        let _ = updates_tx.send(WsOutgoing::Phase { phase: phase.as_str() });
                    }
                }
                _ = frame_tick.tick() => {
                    let elapsed = started_at.elapsed();
                    fire_due_timers(&mut timers, &events_tx, &mut listening, &mut detector, mic.as_ref());

                    let idle_frame = idle.frame(elapsed);
                    let (weights, sway) = lipsync.frame(elapsed);
                    let mut weights: MorphWeights = weights.clone();
                    weights.set(morphs::EYES_CLOSED, idle_frame.eyes_closed);
                    let head = if lipsync.is_active() { sway } else { idle_frame.sway };
                    let _ = updates_tx.send(WsOutgoing::Frame {
                        frame: AvatarFrame { weights, head },
                    });

                    if let Some((ticker, since)) = &subtitle {
                        let revealed = ticker.revealed(since.elapsed());
                        if revealed != last_subtitle {
                            last_subtitle = revealed.clone();
                            let _ = updates_tx.send(WsOutgoing::Subtitle { text: revealed });
                        }
                    }
                }
                _ = capture_tick.tick() => {
                    self.poll_capture(mic.as_ref(), &mut detector, listening, &events_tx);
                }
            }
        }

        speech_stop.stop();
        if let Some(mic) = &mut mic {
            mic.stop();
        }
        Ok(())
    }

    /// Interpret one controller effect
    #[allow(clippy::too_many_arguments)]
    fn apply_effect(
        &self,
        effect: Effect,
        events_tx: &mpsc::Sender<ConversationEvent>,
        updates_tx: &broadcast::Sender<WsOutgoing>,
        jobs_tx: Option<&std::sync::mpsc::Sender<PlaybackJob>>,
        timers: &mut Timers,
        listening: &mut bool,
        speech_stop: &mut StopFlag,
        lipsync: &mut LipSyncDriver,
        subtitle: &mut Option<(SubtitleTicker, Instant)>,
        detector: &mut UtteranceDetector,
        mic: Option<&Microphone>,
    ) {
        match effect {
            Effect::StartCapture { debounce } => {
                timers.capture_start = Some(Instant::now() + debounce);
            }
            Effect::StopCapture => {
                *listening = false;
                timers.capture_start = None;
                detector.reset();
                if let Some(mic) = mic {
                    mic.drain();
                }
            }
            Effect::RequestChat(turns) => {
                let chat = self.chat.clone();
                let events = events_tx.clone();
                tokio::spawn(async move {
                    let event = match chat.reply(&turns).await {
                        Ok(content) => ConversationEvent::ChatResult(content),
                        Err(e) => ConversationEvent::ChatError(e.to_string()),
                    };
                    let _ = events.send(event).await;
                });
            }
            Effect::Speak(text) => {
                // Supersede any reply still playing
                speech_stop.stop();
                let stop = StopFlag::default();
                *speech_stop = stop.clone();
                *subtitle = Some((SubtitleTicker::new(&text), Instant::now()));
                lipsync.start();

                let Some(jobs_tx) = jobs_tx else {
                    // No local playback: the renderer synthesizes the reply
                    // via /api/tts and reports speech_ended when done
                    let _ = updates_tx.send(WsOutgoing::Speak { text });
                    return;
                };

                let synth = self.synth.clone();
                let events = events_tx.clone();
                let jobs = jobs_tx.clone();
                tokio::spawn(async move {
                    match synth.synthesize(&text).await {
                        Ok(audio) => {
                            if !stop.is_stopped()
                                && jobs.send(PlaybackJob { audio, stop }).is_err()
                            {
                                let _ = events
                                    .send(ConversationEvent::SynthesisFailed(
                                        "playback thread gone".to_string(),
                                    ))
                                    .await;
                            }
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "synthesis failed");
                            let _ = events
                                .send(ConversationEvent::SynthesisFailed(e.to_string()))
                                .await;
                        }
                    }
                });
            }
            Effect::StopSpeaking => {
                speech_stop.stop();
                lipsync.stop();
                *subtitle = None;
            }
            Effect::ArmShortSilence(duration) => {
                timers.short_silence = Some(Instant::now() + duration);
            }
            Effect::ArmLongSilence(duration) => {
                timers.long_silence = Some(Instant::now() + duration);
            }
            Effect::CancelSilenceTimers => {
                timers.short_silence = None;
                timers.long_silence = None;
            }
            Effect::ArmRetry(duration) => {
                timers.retry = Some(Instant::now() + duration);
            }
            Effect::ShowStatus(message) => {
                let _ = updates_tx.send(WsOutgoing::Status { message });
            }
        }
    }

    /// Drain buffered audio into the endpointer and dispatch completed
    /// utterances to transcription
    fn poll_capture(
        &self,
        mic: Option<&Microphone>,
        detector: &mut UtteranceDetector,
        listening: bool,
        events_tx: &mpsc::Sender<ConversationEvent>,
    ) {
        let Some(mic) = mic else { return };
        let samples = mic.drain();
        if !listening || samples.is_empty() {
            return;
        }

        let complete = detector.process(&samples);

        // Speech in progress holds off the silence timers
        if detector.is_capturing() {
            let _ = events_tx.try_send(ConversationEvent::TranscriptUpdate(String::new()));
        }

        if complete {
            let utterance = detector.take_utterance();
            detector.reset();
            let Some(stt) = self.stt.clone() else {
                return;
            };
            let events = events_tx.clone();
            tokio::spawn(async move {
                match encode_wav(&utterance) {
                    Ok(wav) => match stt.transcribe(&wav).await {
                        Ok(text) => {
                            let _ = events.send(ConversationEvent::TranscriptFinal(text)).await;
                        }
                        Err(e) => tracing::warn!(error = %e, "transcription failed"),
                    },
                    Err(e) => tracing::warn!(error = %e, "wav encoding failed"),
                }
            });
        }
    }
}

/// Pending deadlines, polled at the frame tick
#[derive(Default)]
struct Timers {
    short_silence: Option<Instant>,
    long_silence: Option<Instant>,
    retry: Option<Instant>,
    capture_start: Option<Instant>,
}

/// Fire any deadline that has passed, at frame-tick granularity
fn fire_due_timers(
    timers: &mut Timers,
    events_tx: &mpsc::Sender<ConversationEvent>,
    listening: &mut bool,
    detector: &mut UtteranceDetector,
    mic: Option<&Microphone>,
) {
    let now = Instant::now();

    if timers.capture_start.is_some_and(|at| now >= at) {
        timers.capture_start = None;
        *listening = true;
        detector.reset();
        if let Some(mic) = mic {
            mic.drain();
        }
    }
    if timers.short_silence.is_some_and(|at| now >= at) {
        timers.short_silence = None;
        let _ = events_tx.try_send(ConversationEvent::ShortSilenceElapsed);
    }
    if timers.long_silence.is_some_and(|at| now >= at) {
        timers.long_silence = None;
        let _ = events_tx.try_send(ConversationEvent::LongSilenceElapsed);
    }
    if timers.retry.is_some_and(|at| now >= at) {
        timers.retry = None;
        let _ = events_tx.try_send(ConversationEvent::RetryElapsed);
    }
}

/// Spawn the dedicated playback thread
///
/// Returns the job sender and the output level tap, or `None` for the tap
/// when no output device is available.
fn spawn_playback_thread(
    events_tx: mpsc::Sender<ConversationEvent>,
) -> (
    std::sync::mpsc::Sender<PlaybackJob>,
    Option<crate::playback::OutputLevel>,
) {
    let (jobs_tx, jobs_rx) = std::sync::mpsc::channel::<PlaybackJob>();
    let (level_tx, level_rx) = std::sync::mpsc::channel();

    std::thread::spawn(move || {
        let playback = match AudioPlayback::new() {
            Ok(playback) => {
                let _ = level_tx.send(playback.level());
                playback
            }
            Err(e) => {
                tracing::warn!(error = %e, "no output device, playback disabled");
                drop(level_tx);
                return;
            }
        };

        while let Ok(job) = jobs_rx.recv() {
            if job.stop.is_stopped() {
                continue;
            }
            match playback.play_mp3(&job.audio, &job.stop) {
                Ok(()) => {
                    if !job.stop.is_stopped() {
                        let _ = events_tx.blocking_send(ConversationEvent::SpeechEnded);
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "playback failed");
                    let _ = events_tx
                        .blocking_send(ConversationEvent::SynthesisFailed(e.to_string()));
                }
            }
        }
    });

    let level = level_rx.recv_timeout(Duration::from_secs(2)).ok();
    (jobs_tx, level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiKeys, AvatarConfig, ServerConfig, TimingConfig, VoiceConfig};
    use secrecy::SecretString;

    fn voiceless_session() -> Session {
        let config = Config {
            chat_model: "gpt-4o-mini".to_string(),
            max_tokens: 60,
            system_prompt: "test prompt".to_string(),
            opening_line: "hello".to_string(),
            voice: VoiceConfig {
                enabled: false,
                ..VoiceConfig::default()
            },
            timing: TimingConfig::default(),
            avatar: AvatarConfig::default(),
            server: ServerConfig::default(),
            api_keys: ApiKeys {
                openai: Some(SecretString::from("test-key")),
                elevenlabs: None,
            },
        };
        match Session::new(config, false) {
            Ok(session) => session,
            Err(e) => panic!("session construction failed: {e}"),
        }
    }

    #[test]
    fn speak_is_handed_to_the_renderer_without_local_playback() {
        let session = voiceless_session();
        let (events_tx, _events_rx) = mpsc::channel(4);
        let (updates_tx, mut updates_rx) = broadcast::channel(4);
        let mut timers = Timers::default();
        let mut listening = false;
        let mut stop = StopFlag::default();
        let mut lipsync = LipSyncDriver::new(Box::new(ScriptedCycle::new()));
        let mut subtitle = None;
        let mut detector = UtteranceDetector::new();

        session.apply_effect(
            Effect::Speak("the stars align".to_string()),
            &events_tx,
            &updates_tx,
            None,
            &mut timers,
            &mut listening,
            &mut stop,
            &mut lipsync,
            &mut subtitle,
            &mut detector,
            None,
        );

        // Subtitles and lip sync still run; the audio goes client-side
        assert!(lipsync.is_active());
        assert!(subtitle.is_some());
        match updates_rx.try_recv() {
            Ok(WsOutgoing::Speak { text }) => assert_eq!(text, "the stars align"),
            other => panic!("expected a speak message, got {other:?}"),
        }
    }
}
