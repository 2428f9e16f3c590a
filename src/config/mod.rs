//! Configuration management for the speech pipeline
//!
//! Precedence, lowest first: built-in defaults, the TOML file overlay,
//! environment variables, then whatever the binary applies from CLI flags.

pub mod file;
pub mod speech;

use std::path::PathBuf;

use secrecy::SecretString;

pub use speech::{
    DEFAULT_LANGUAGE, DEFAULT_VOICE_ID, EmptyChoice, SharedSpeechConfig, SpeechConfig,
    SpeechOptions, VoiceSettings, VoiceSettingsPatch, popular_voices,
};

use crate::{Error, Result};

/// Name of the temp sub-directory for audio files
const TEMP_SUBDIR: &str = "parley_speech";

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Speech behaviour (shared with components at construction)
    pub speech: SpeechConfig,

    /// Speech-to-text service
    pub stt: SttConfig,

    /// Text-to-speech service
    pub tts: TtsConfig,

    /// API keys
    pub api_keys: ApiKeys,

    /// Directory for temporary audio files
    pub temp_dir: PathBuf,
}

/// Speech-to-text provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SttProvider {
    /// `OpenAI` Whisper transcription
    #[default]
    Whisper,
    /// Deepgram prerecorded transcription
    Deepgram,
}

impl std::str::FromStr for SttProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "whisper" | "openai" => Ok(Self::Whisper),
            "deepgram" => Ok(Self::Deepgram),
            other => Err(Error::Config(format!("unknown STT provider: {other}"))),
        }
    }
}

/// Text-to-speech provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TtsProvider {
    /// `ElevenLabs` text-to-speech
    #[default]
    ElevenLabs,
    /// `OpenAI` speech endpoint
    OpenAI,
}

impl std::str::FromStr for TtsProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "elevenlabs" | "eleven_labs" => Ok(Self::ElevenLabs),
            "openai" => Ok(Self::OpenAI),
            other => Err(Error::Config(format!("unknown TTS provider: {other}"))),
        }
    }
}

/// Speech-to-text service configuration
#[derive(Debug, Clone, Default)]
pub struct SttConfig {
    pub provider: SttProvider,

    /// Model identifier (e.g. "whisper-1", "nova-2")
    pub model: String,

    /// Base URL override (for proxies and tests)
    pub base_url: Option<String>,
}

/// Text-to-speech service configuration
#[derive(Debug, Clone, Default)]
pub struct TtsConfig {
    pub provider: TtsProvider,

    /// Model identifier (e.g. "`eleven_monolingual_v1`", "tts-1")
    pub model: String,

    /// Base URL override (for proxies and tests)
    pub base_url: Option<String>,
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (Whisper and `OpenAI` TTS)
    pub openai: Option<SecretString>,

    /// `ElevenLabs` API key
    pub elevenlabs: Option<SecretString>,

    /// `Deepgram` API key
    pub deepgram: Option<SecretString>,
}

impl Config {
    /// Load configuration from the config file and environment
    ///
    /// # Errors
    ///
    /// Returns error if a provider name is unknown or speech options are out of range
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();

        let speech = SpeechConfig::default().merged(&fc.speech)?;
        let speech = match env_var("PARLEY_LANGUAGE") {
            Some(language) => speech.merged(&SpeechOptions {
                language: Some(language),
                ..SpeechOptions::default()
            })?,
            None => speech,
        };

        let stt_provider: SttProvider = env_var("PARLEY_STT_PROVIDER")
            .or(fc.stt.provider)
            .map(|p| p.parse())
            .transpose()?
            .unwrap_or_default();
        let stt = SttConfig {
            provider: stt_provider,
            model: env_var("PARLEY_STT_MODEL")
                .or(fc.stt.model)
                .unwrap_or_else(|| default_stt_model(stt_provider).to_string()),
            base_url: fc.stt.base_url,
        };

        let tts_provider: TtsProvider = env_var("PARLEY_TTS_PROVIDER")
            .or(fc.tts.provider)
            .map(|p| p.parse())
            .transpose()?
            .unwrap_or_default();
        let tts = TtsConfig {
            provider: tts_provider,
            model: env_var("PARLEY_TTS_MODEL")
                .or(fc.tts.model)
                .unwrap_or_else(|| default_tts_model(tts_provider).to_string()),
            base_url: fc.tts.base_url,
        };

        let api_keys = ApiKeys {
            openai: env_var("OPENAI_API_KEY")
                .or(fc.api_keys.openai)
                .map(SecretString::from),
            elevenlabs: env_var("ELEVEN_LABS_API_KEY")
                .or_else(|| env_var("ELEVENLABS_API_KEY"))
                .or(fc.api_keys.elevenlabs)
                .map(SecretString::from),
            deepgram: env_var("DEEPGRAM_API_KEY")
                .or(fc.api_keys.deepgram)
                .map(SecretString::from),
        };

        let temp_dir = env_var("PARLEY_TEMP_DIR")
            .map(PathBuf::from)
            .or(fc.temp_dir)
            .unwrap_or_else(default_temp_dir);

        Ok(Self {
            speech,
            stt,
            tts,
            api_keys,
            temp_dir,
        })
    }

    /// Credential for the configured STT provider
    #[must_use]
    pub const fn stt_api_key(&self) -> Option<&SecretString> {
        match self.stt.provider {
            SttProvider::Whisper => self.api_keys.openai.as_ref(),
            SttProvider::Deepgram => self.api_keys.deepgram.as_ref(),
        }
    }

    /// Credential for the configured TTS provider
    #[must_use]
    pub const fn tts_api_key(&self) -> Option<&SecretString> {
        match self.tts.provider {
            TtsProvider::ElevenLabs => self.api_keys.elevenlabs.as_ref(),
            TtsProvider::OpenAI => self.api_keys.openai.as_ref(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            speech: SpeechConfig::default(),
            stt: SttConfig {
                provider: SttProvider::Whisper,
                model: default_stt_model(SttProvider::Whisper).to_string(),
                base_url: None,
            },
            tts: TtsConfig {
                provider: TtsProvider::ElevenLabs,
                model: default_tts_model(TtsProvider::ElevenLabs).to_string(),
                base_url: None,
            },
            api_keys: ApiKeys::default(),
            temp_dir: default_temp_dir(),
        }
    }
}

/// Default model for an STT provider
#[must_use]
pub const fn default_stt_model(provider: SttProvider) -> &'static str {
    match provider {
        SttProvider::Whisper => "whisper-1",
        SttProvider::Deepgram => "nova-2",
    }
}

/// Default model for a TTS provider
#[must_use]
pub const fn default_tts_model(provider: TtsProvider) -> &'static str {
    match provider {
        TtsProvider::ElevenLabs => "eleven_monolingual_v1",
        TtsProvider::OpenAI => "tts-1",
    }
}

/// `<system temp>/parley_speech`
#[must_use]
pub fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join(TEMP_SUBDIR)
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parsing() {
        assert_eq!("Whisper".parse::<SttProvider>().unwrap(), SttProvider::Whisper);
        assert_eq!(" deepgram ".parse::<SttProvider>().unwrap(), SttProvider::Deepgram);
        assert!("google".parse::<SttProvider>().is_err());

        assert_eq!("openai".parse::<TtsProvider>().unwrap(), TtsProvider::OpenAI);
        assert_eq!("ElevenLabs".parse::<TtsProvider>().unwrap(), TtsProvider::ElevenLabs);
    }

    #[test]
    fn test_credential_follows_provider() {
        let mut config = Config::default();
        config.api_keys.openai = Some(SecretString::from("sk-openai".to_string()));

        assert!(config.stt_api_key().is_some());
        assert!(config.tts_api_key().is_none());

        config.tts.provider = TtsProvider::OpenAI;
        assert!(config.tts_api_key().is_some());

        config.stt.provider = SttProvider::Deepgram;
        assert!(config.stt_api_key().is_none());
    }

    #[test]
    fn test_default_temp_dir_is_dedicated() {
        assert!(default_temp_dir().ends_with(TEMP_SUBDIR));
    }
}
