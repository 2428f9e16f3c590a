//! Text-to-speech (TTS) processing
//!
//! [`SpeechSynthesizer`] talks to the remote service. [`TextToSpeech`] wraps
//! it with configuration, a temp-file lifecycle and playback, and never
//! fails: every problem becomes a [`SynthesisOutcome`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use super::outcome::SynthesisOutcome;
use super::playback::Player;
use crate::config::{Config, SharedSpeechConfig, TtsProvider, VoiceSettings, VoiceSettingsPatch};
use crate::{Error, Result};

const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io";
const OPENAI_BASE_URL: &str = "https://api.openai.com";

/// `OpenAI` voice used when the configured id is not an `OpenAI` voice name
pub const OPENAI_DEFAULT_VOICE: &str = "alloy";

/// One synthesis request
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice_id: String,
    pub settings: VoiceSettings,
}

/// Remote synthesis service
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize speech, returning MP3 bytes
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>>;
}

/// Speaks text to the operator
#[async_trait]
pub trait Announcer: Send + Sync {
    /// Speak `text` with optional per-call voice settings
    async fn announce(&self, text: &str, settings: Option<&VoiceSettingsPatch>) -> SynthesisOutcome;
}

/// Synthesizes speech from text
pub struct SpeechSynthesizer {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    provider: TtsProvider,
    base_url: String,
}

impl SpeechSynthesizer {
    /// Create a new TTS instance using `ElevenLabs`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_elevenlabs(api_key: SecretString, model: String) -> Result<Self> {
        Self::new(TtsProvider::ElevenLabs, api_key, model, None)
    }

    /// Create a new TTS instance using `OpenAI`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_openai(api_key: SecretString, model: String) -> Result<Self> {
        Self::new(TtsProvider::OpenAI, api_key, model, None)
    }

    /// Create a TTS instance for `provider`, optionally at a custom base URL
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(
        provider: TtsProvider,
        api_key: SecretString,
        model: String,
        base_url: Option<String>,
    ) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::MissingCredential(credential_name(provider)));
        }

        let base_url = base_url
            .unwrap_or_else(|| {
                match provider {
                    TtsProvider::ElevenLabs => ELEVENLABS_BASE_URL,
                    TtsProvider::OpenAI => OPENAI_BASE_URL,
                }
                .to_string()
            })
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            provider,
            base_url,
        })
    }

    /// Build from pipeline configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCredential`] if the provider's key is not set
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config
            .tts_api_key()
            .cloned()
            .ok_or_else(|| Error::MissingCredential(credential_name(config.tts.provider)))?;

        Self::new(
            config.tts.provider,
            api_key,
            config.tts.model.clone(),
            config.tts.base_url.clone(),
        )
    }

    /// Synthesize using `ElevenLabs` TTS
    async fn synthesize_elevenlabs(&self, request: &SynthesisRequest) -> Result<Vec<u8>> {
        #[derive(Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
            voice_settings: &'a VoiceSettings,
        }

        let url = format!("{}/v1/text-to-speech/{}", self.base_url, request.voice_id);

        let body = ElevenLabsRequest {
            text: &request.text,
            model_id: &self.model,
            voice_settings: &request.settings,
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", self.api_key.expose_secret())
            .header("Accept", "audio/mpeg")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("ElevenLabs TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }

    /// Synthesize using `OpenAI` TTS
    async fn synthesize_openai(&self, request: &SynthesisRequest) -> Result<Vec<u8>> {
        #[derive(Serialize)]
        struct OpenAiRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
        }

        let voice = openai_voice(&request.voice_id);
        let body = OpenAiRequest {
            model: &self.model,
            input: &request.text,
            voice,
        };

        let response = self
            .client
            .post(format!("{}/v1/audio/speech", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl Synthesizer for SpeechSynthesizer {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>> {
        tracing::debug!(chars = request.text.len(), voice = %request.voice_id, "synthesizing speech");
        match self.provider {
            TtsProvider::ElevenLabs => self.synthesize_elevenlabs(request).await,
            TtsProvider::OpenAI => self.synthesize_openai(request).await,
        }
    }
}

/// `OpenAI` voices are short lowercase names; anything else (such as an
/// `ElevenLabs` id) falls back to [`OPENAI_DEFAULT_VOICE`]
fn openai_voice(voice_id: &str) -> &str {
    if !voice_id.is_empty() && voice_id.chars().all(|c| c.is_ascii_lowercase()) {
        voice_id
    } else {
        tracing::debug!(voice = %voice_id, fallback = OPENAI_DEFAULT_VOICE, "not an OpenAI voice");
        OPENAI_DEFAULT_VOICE
    }
}

const fn credential_name(provider: TtsProvider) -> &'static str {
    match provider {
        TtsProvider::ElevenLabs => "ELEVEN_LABS_API_KEY",
        TtsProvider::OpenAI => "OPENAI_API_KEY",
    }
}

/// Configured synthesis plus playback
pub struct TextToSpeech {
    config: SharedSpeechConfig,
    synthesizer: Option<Arc<dyn Synthesizer>>,
    player: Arc<dyn Player>,
    temp_dir: PathBuf,
}

impl TextToSpeech {
    /// Create a speaker; `synthesizer: None` means no credential, so every
    /// announcement is skipped
    #[must_use]
    pub fn new(
        config: SharedSpeechConfig,
        synthesizer: Option<Arc<dyn Synthesizer>>,
        player: Arc<dyn Player>,
        temp_dir: PathBuf,
    ) -> Self {
        if synthesizer.is_none() {
            tracing::info!("speech synthesis disabled: no credential configured");
        }

        Self {
            config,
            synthesizer,
            player,
            temp_dir,
        }
    }

    /// Whether a synthesis service is configured
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.synthesizer.is_some()
    }

    /// Speak `text`; with `force` the global enabled flag is ignored
    pub async fn announce_with(
        &self,
        text: &str,
        settings: Option<&VoiceSettingsPatch>,
        force: bool,
    ) -> SynthesisOutcome {
        let config = self.config.snapshot();

        if !force && !config.enabled {
            return SynthesisOutcome::Skipped("disabled".to_string());
        }
        let Some(synthesizer) = self.synthesizer.clone() else {
            return SynthesisOutcome::Skipped("no credential".to_string());
        };
        if text.trim().is_empty() {
            return SynthesisOutcome::Skipped("empty text".to_string());
        }

        let request = SynthesisRequest {
            text: text.to_string(),
            voice_id: config.voice_id.clone(),
            settings: match settings {
                Some(patch) => config.voice_settings.merged(patch),
                None => config.voice_settings,
            },
        };

        let player = Arc::clone(&self.player);
        let temp_dir = self.temp_dir.clone();

        let task = tokio::spawn(async move {
            speak(synthesizer.as_ref(), player.as_ref(), &temp_dir, &request).await
        });

        let outcome = match task.await {
            Ok(Ok(())) => SynthesisOutcome::Played,
            Ok(Err(e)) => SynthesisOutcome::Failed(e.to_string()),
            Err(e) => SynthesisOutcome::Failed(format!("speech task failed: {e}")),
        };

        if let SynthesisOutcome::Failed(reason) = &outcome {
            tracing::warn!(reason = %reason, "speech synthesis failed");
        }
        outcome
    }
}

#[async_trait]
impl Announcer for TextToSpeech {
    async fn announce(&self, text: &str, settings: Option<&VoiceSettingsPatch>) -> SynthesisOutcome {
        self.announce_with(text, settings, false).await
    }
}

/// Synthesize, persist to a temp file, play, and remove the file
async fn speak(
    synthesizer: &dyn Synthesizer,
    player: &dyn Player,
    temp_dir: &Path,
    request: &SynthesisRequest,
) -> Result<()> {
    let audio = synthesizer.synthesize(request).await?;
    tracing::debug!(bytes = audio.len(), "received synthesized audio");

    let file = write_temp_audio(temp_dir, "speech_", "mp3", &audio)?;
    let played = player.play_file(file.path()).await;
    remove_temp_audio(file);
    played
}

/// Write audio to a uniquely named file in `temp_dir`
///
/// The file is removed when the returned guard drops.
///
/// # Errors
///
/// Returns error if the directory or file cannot be written
pub fn write_temp_audio(
    temp_dir: &Path,
    prefix: &str,
    extension: &str,
    data: &[u8],
) -> Result<tempfile::NamedTempFile> {
    use std::io::Write;

    std::fs::create_dir_all(temp_dir)?;
    let mut file = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(&format!(".{extension}"))
        .tempfile_in(temp_dir)?;
    file.write_all(data)?;
    file.flush()?;

    tracing::trace!(path = %file.path().display(), bytes = data.len(), "wrote temp audio");
    Ok(file)
}

/// Remove a temp audio file, logging if that fails
pub fn remove_temp_audio(file: tempfile::NamedTempFile) {
    let path = file.path().to_path_buf();
    if let Err(e) = file.close() {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove temp audio");
    }
}
