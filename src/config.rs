//! Gateway configuration
//!
//! Defaults, overlaid by `~/.config/astra/config.toml` when present, then by
//! environment variables. All file fields are optional — the file is a
//! partial overlay on top of defaults.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

use crate::Result;

/// Default chat model (the upstream the original front-end proxied to)
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// Default max tokens per assistant reply (kept short for spoken output)
pub const DEFAULT_MAX_TOKENS: u32 = 60;

/// Resolved runtime configuration
#[derive(Debug)]
pub struct Config {
    /// Chat model identifier
    pub chat_model: String,
    /// Max tokens per assistant reply
    pub max_tokens: u32,
    /// System prompt seeding the conversation history
    pub system_prompt: String,
    /// Fixed opening line spoken when the session starts
    pub opening_line: String,
    /// Voice (STT/TTS) settings
    pub voice: VoiceConfig,
    /// Conversation timing tunables
    pub timing: TimingConfig,
    /// Avatar asset reference for connected renderers
    pub avatar: AvatarConfig,
    /// API server settings
    pub server: ServerConfig,
    /// Upstream provider credentials
    pub api_keys: ApiKeys,
}

/// Voice processing settings
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable microphone capture and speaker playback
    pub enabled: bool,
    /// STT model (e.g. "whisper-1")
    pub stt_model: String,
    /// TTS model (e.g. "tts-1-hd")
    pub tts_model: String,
    /// TTS voice identifier (e.g. "nova")
    pub tts_voice: String,
    /// TTS speed multiplier
    pub tts_speed: f64,
    /// ElevenLabs voice id for the alternate synthesis path
    pub elevenlabs_voice_id: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stt_model: "whisper-1".to_string(),
            tts_model: "tts-1-hd".to_string(),
            tts_voice: "nova".to_string(),
            tts_speed: 1.0,
            // "Rachel", the ElevenLabs default voice
            elevenlabs_voice_id: "21m00Tcm4TlvDq8ikWAM".to_string(),
        }
    }
}

/// Conversation timing tunables
///
/// The minimum transcript length is a heuristic carried from the original
/// app, not a contract; very short valid replies in some languages may want
/// a lower value.
#[derive(Debug, Clone, Copy)]
pub struct TimingConfig {
    /// Quiet interval after the last transcript update before the current
    /// transcript is treated as final
    pub short_silence: Duration,
    /// Window of zero transcript activity before the follow-up-question path
    pub long_silence: Duration,
    /// Delay before re-entering Listening after an upstream error
    pub retry_delay: Duration,
    /// Debounce between speech ending and capture restarting
    pub speaking_debounce: Duration,
    /// Trimmed transcripts at or below this length are treated as noise
    pub min_transcript_chars: usize,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            short_silence: Duration::from_millis(2500),
            long_silence: Duration::from_secs(10),
            retry_delay: Duration::from_secs(3),
            speaking_debounce: Duration::from_millis(400),
            min_transcript_chars: 3,
        }
    }
}

/// Avatar asset reference passed through to renderers
#[derive(Debug, Clone)]
pub struct AvatarConfig {
    /// URL of a glTF model with named morph targets and bones
    pub model_url: String,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            model_url: "https://models.readyplayer.me/64bfa15f0e72c63d7c3934a6.glb\
                        ?morphTargets=ARKit,Oculus+Visemes,mouthOpen,mouthSmile,eyesClosed\
                        &textureSizeLimit=1024&textureFormat=png"
                .to_string(),
        }
    }
}

/// API server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port the axum server binds
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 18920 }
    }
}

/// Upstream provider credentials
#[derive(Debug)]
pub struct ApiKeys {
    /// OpenAI key (chat, Whisper STT, TTS)
    pub openai: Option<SecretString>,
    /// ElevenLabs key (alternate TTS path)
    pub elevenlabs: Option<SecretString>,
}

impl Config {
    /// Load configuration: defaults, then the TOML file, then environment
    ///
    /// # Errors
    ///
    /// Returns error if an explicitly provided value is malformed
    pub fn load() -> Result<Self> {
        let file = load_config_file();

        let openai = std::env::var("OPENAI_API_KEY")
            .ok()
            .or(file.api_keys.openai)
            .map(SecretString::from);
        let elevenlabs = std::env::var("ELEVENLABS_API_KEY")
            .ok()
            .or(file.api_keys.elevenlabs)
            .map(SecretString::from);

        let timing_defaults = TimingConfig::default();
        let timing = TimingConfig {
            short_silence: file
                .timing
                .short_silence_ms
                .map_or(timing_defaults.short_silence, Duration::from_millis),
            long_silence: file
                .timing
                .long_silence_ms
                .map_or(timing_defaults.long_silence, Duration::from_millis),
            retry_delay: file
                .timing
                .retry_delay_ms
                .map_or(timing_defaults.retry_delay, Duration::from_millis),
            speaking_debounce: file
                .timing
                .speaking_debounce_ms
                .map_or(timing_defaults.speaking_debounce, Duration::from_millis),
            min_transcript_chars: file
                .timing
                .min_transcript_chars
                .unwrap_or(timing_defaults.min_transcript_chars),
        };

        let voice_defaults = VoiceConfig::default();
        let voice = VoiceConfig {
            enabled: file.voice.enabled.unwrap_or(voice_defaults.enabled),
            stt_model: file.voice.stt_model.unwrap_or(voice_defaults.stt_model),
            tts_model: file.voice.tts_model.unwrap_or(voice_defaults.tts_model),
            tts_voice: file.voice.tts_voice.unwrap_or(voice_defaults.tts_voice),
            tts_speed: file.voice.tts_speed.unwrap_or(voice_defaults.tts_speed),
            elevenlabs_voice_id: file
                .voice
                .elevenlabs_voice_id
                .unwrap_or(voice_defaults.elevenlabs_voice_id),
        };

        Ok(Self {
            chat_model: file.llm.model.unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            max_tokens: file.llm.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system_prompt: file.llm.system_prompt.unwrap_or_else(default_system_prompt),
            opening_line: file.llm.opening_line.unwrap_or_else(default_opening_line),
            voice,
            timing,
            avatar: AvatarConfig {
                model_url: file
                    .avatar
                    .model_url
                    .unwrap_or_else(|| AvatarConfig::default().model_url),
            },
            server: ServerConfig {
                port: file.server.port.unwrap_or_else(|| ServerConfig::default().port),
            },
            api_keys: ApiKeys { openai, elevenlabs },
        })
    }
}

fn default_system_prompt() -> String {
    "You are a warm, slightly mystical astrologer. Keep every answer to one or \
     two short spoken sentences."
        .to_string()
}

fn default_opening_line() -> String {
    "Hello! I'm your personal astrologer. What would you like to know?".to_string()
}

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    llm: LlmFileConfig,

    #[serde(default)]
    voice: VoiceFileConfig,

    #[serde(default)]
    timing: TimingFileConfig,

    #[serde(default)]
    avatar: AvatarFileConfig,

    #[serde(default)]
    server: ServerFileConfig,

    #[serde(default)]
    api_keys: ApiKeysFileConfig,
}

#[derive(Debug, Default, Deserialize)]
struct LlmFileConfig {
    model: Option<String>,
    max_tokens: Option<u32>,
    system_prompt: Option<String>,
    opening_line: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct VoiceFileConfig {
    enabled: Option<bool>,
    stt_model: Option<String>,
    tts_model: Option<String>,
    tts_voice: Option<String>,
    tts_speed: Option<f64>,
    elevenlabs_voice_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TimingFileConfig {
    short_silence_ms: Option<u64>,
    long_silence_ms: Option<u64>,
    retry_delay_ms: Option<u64>,
    speaking_debounce_ms: Option<u64>,
    min_transcript_chars: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct AvatarFileConfig {
    model_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerFileConfig {
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiKeysFileConfig {
    openai: Option<String>,
    elevenlabs: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be parsed.
fn load_config_file() -> ConfigFile {
    let Some(path) = config_file_path() else {
        return ConfigFile::default();
    };

    if !path.exists() {
        return ConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/astra/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("astra").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_defaults_match_the_conversation_contract() {
        let t = TimingConfig::default();
        assert_eq!(t.short_silence, Duration::from_millis(2500));
        assert_eq!(t.long_silence, Duration::from_secs(10));
        assert_eq!(t.min_transcript_chars, 3);
    }

    #[test]
    fn file_overlay_is_fully_optional() {
        let file: ConfigFile = toml::from_str("").unwrap();
        assert!(file.llm.model.is_none());
        assert!(file.voice.enabled.is_none());

        let file: ConfigFile = toml::from_str(
            "[timing]\nshort_silence_ms = 1000\n\n[voice]\ntts_voice = \"alloy\"\n",
        )
        .unwrap();
        assert_eq!(file.timing.short_silence_ms, Some(1000));
        assert_eq!(file.voice.tts_voice.as_deref(), Some("alloy"));
    }
}
