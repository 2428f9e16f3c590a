//! Speech-to-text (STT) processing

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::capture::AudioClip;
use crate::config::{Config, SttProvider};
use crate::{Error, Result};

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const DEEPGRAM_BASE_URL: &str = "https://api.deepgram.com";

/// What the recognition service made of a clip
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transcription {
    /// The service returned a transcript (possibly empty)
    Heard(String),
    /// The service explicitly found no understandable speech
    NotUnderstood,
}

/// Remote recognition service
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe one clip; `language` is a tag such as "en-US"
    async fn transcribe(&self, clip: AudioClip, language: &str) -> Result<Transcription>;
}

/// Response from OpenAI Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Response from Deepgram transcription API
#[derive(serde::Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(serde::Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(serde::Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(serde::Deserialize)]
struct DeepgramAlternative {
    transcript: String,
    #[serde(default)]
    confidence: f64,
}

/// Transcribes speech to text
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    provider: SttProvider,
    base_url: String,
}

impl SpeechToText {
    /// Create a new STT instance using `OpenAI` Whisper
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_whisper(api_key: SecretString, model: String) -> Result<Self> {
        Self::new(SttProvider::Whisper, api_key, model, None)
    }

    /// Create a new STT instance using Deepgram
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_deepgram(api_key: SecretString, model: String) -> Result<Self> {
        Self::new(SttProvider::Deepgram, api_key, model, None)
    }

    /// Create an STT instance for `provider`, optionally at a custom base URL
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(
        provider: SttProvider,
        api_key: SecretString,
        model: String,
        base_url: Option<String>,
    ) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::MissingCredential(match provider {
                SttProvider::Whisper => "OPENAI_API_KEY",
                SttProvider::Deepgram => "DEEPGRAM_API_KEY",
            }));
        }

        let base_url = base_url
            .unwrap_or_else(|| {
                match provider {
                    SttProvider::Whisper => OPENAI_BASE_URL,
                    SttProvider::Deepgram => DEEPGRAM_BASE_URL,
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
        let api_key = config.stt_api_key().cloned().ok_or(match config.stt.provider {
            SttProvider::Whisper => Error::MissingCredential("OPENAI_API_KEY"),
            SttProvider::Deepgram => Error::MissingCredential("DEEPGRAM_API_KEY"),
        })?;

        Self::new(
            config.stt.provider,
            api_key,
            config.stt.model.clone(),
            config.stt.base_url.clone(),
        )
    }

    /// Transcribe using OpenAI Whisper
    async fn transcribe_whisper(&self, clip: AudioClip, language: &str) -> Result<Transcription> {
        tracing::debug!(audio_bytes = clip.len(), "starting Whisper transcription");

        let encoding = clip.encoding();
        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(clip.into_bytes())
                    .file_name(format!("audio.{}", encoding.extension()))
                    .mime_str(encoding.mime_type())
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone())
            .text("language", primary_subtag(language).to_string());

        let response = self
            .client
            .post(format!("{}/v1/audio/transcriptions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                e
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse response");
            e
        })?;

        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(Transcription::Heard(result.text))
    }

    /// Transcribe using Deepgram
    async fn transcribe_deepgram(&self, clip: AudioClip, language: &str) -> Result<Transcription> {
        tracing::debug!(audio_bytes = clip.len(), "starting Deepgram transcription");

        let url = format!("{}/v1/listen", self.base_url);
        let content_type = clip.encoding().mime_type();

        let response = self
            .client
            .post(&url)
            .query(&[
                ("model", self.model.as_str()),
                ("punctuate", "true"),
                ("language", language),
            ])
            .header("Authorization", format!("Token {}", self.api_key.expose_secret()))
            .header("Content-Type", content_type)
            .body(clip.into_bytes())
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Deepgram request failed");
                e
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Deepgram API error");
            return Err(Error::Stt(format!("Deepgram API error {status}: {body}")));
        }

        let result: DeepgramResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse Deepgram response");
            e
        })?;

        let Some(best) = result
            .results
            .channels
            .into_iter()
            .next()
            .and_then(|c| c.alternatives.into_iter().next())
        else {
            tracing::info!("Deepgram returned no alternatives");
            return Ok(Transcription::NotUnderstood);
        };

        // Zero confidence on an empty transcript is Deepgram's "heard noise"
        if best.transcript.trim().is_empty() && best.confidence <= 0.0 {
            tracing::info!("Deepgram could not understand audio");
            return Ok(Transcription::NotUnderstood);
        }

        tracing::info!(transcript = %best.transcript, confidence = best.confidence, "transcription complete");
        Ok(Transcription::Heard(best.transcript))
    }
}

#[async_trait]
impl Transcriber for SpeechToText {
    async fn transcribe(&self, clip: AudioClip, language: &str) -> Result<Transcription> {
        match self.provider {
            SttProvider::Whisper => self.transcribe_whisper(clip, language).await,
            SttProvider::Deepgram => self.transcribe_deepgram(clip, language).await,
        }
    }
}

/// "en-US" -> "en"
fn primary_subtag(language: &str) -> &str {
    language
        .split(['-', '_'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(language)
}
