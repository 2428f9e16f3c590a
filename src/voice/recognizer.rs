//! Capture-and-recognize over a bound microphone

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::capture::AudioClip;
use super::detector::{ListenLimits, Listened};
use super::microphone::{AudioSource, Microphone};
use super::outcome::RecognitionOutcome;
use super::playback::Player;
use super::stt::{Transcriber, Transcription};
use super::tts::{remove_temp_audio, write_temp_audio};
use crate::config::SharedSpeechConfig;
use crate::input::{DisplaySink, MessageKind};
use crate::{Error, Result};

/// Ambient-noise window measured before every capture
pub const CALIBRATION_WINDOW: Duration = Duration::from_millis(500);

/// One voice attempt from prompt to transcript
#[async_trait]
pub trait Recognizer: Send {
    /// Capture one phrase and recognize it; never fails
    async fn capture_and_recognize(&mut self, prompt: &str, debug_audio: bool)
    -> RecognitionOutcome;

    /// Whether a microphone and a recognition service are both present
    fn is_available(&self) -> bool;
}

/// Recognizer backed by an [`AudioSource`] and a [`Transcriber`]
pub struct SpeechRecognizer {
    config: SharedSpeechConfig,
    source: Option<Box<dyn AudioSource>>,
    transcriber: Option<Arc<dyn Transcriber>>,
    player: Arc<dyn Player>,
    display: Arc<dyn DisplaySink>,
    temp_dir: PathBuf,
    reported_unavailable: bool,
}

impl SpeechRecognizer {
    /// Bind the default microphone
    ///
    /// A missing microphone is not an error: the recognizer is built
    /// unavailable and the arbitrator falls back to typed input.
    pub fn initialize(
        config: SharedSpeechConfig,
        transcriber: Option<Arc<dyn Transcriber>>,
        player: Arc<dyn Player>,
        display: Arc<dyn DisplaySink>,
        temp_dir: PathBuf,
    ) -> Self {
        let source: Option<Box<dyn AudioSource>> = match Microphone::bind() {
            Ok(mic) => Some(Box::new(mic)),
            Err(Error::NoMicrophone(reason)) => {
                tracing::warn!(reason = %reason, "no microphone found, voice input unavailable");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to bind microphone, voice input unavailable");
                None
            }
        };

        Self::with_source(config, source, transcriber, player, display, temp_dir)
    }

    /// Build around an already-bound source
    pub fn with_source(
        config: SharedSpeechConfig,
        source: Option<Box<dyn AudioSource>>,
        transcriber: Option<Arc<dyn Transcriber>>,
        player: Arc<dyn Player>,
        display: Arc<dyn DisplaySink>,
        temp_dir: PathBuf,
    ) -> Self {
        if transcriber.is_none() {
            tracing::info!("speech recognition disabled: no credential configured");
        }

        Self {
            config,
            source,
            transcriber,
            player,
            display,
            temp_dir,
            reported_unavailable: false,
        }
    }

    fn report_unavailable(&mut self) {
        if self.reported_unavailable {
            return;
        }
        self.reported_unavailable = true;

        let reason = if self.source.is_none() {
            "No microphone was found"
        } else {
            "Speech recognition is not configured"
        };
        self.display.display(
            &format!("{reason}, so voice input is off. Please type your answers."),
            MessageKind::Warning,
        );
    }
}

/// Play a capture back through the speakers via a temp WAV file
async fn play_debug(player: &dyn Player, temp_dir: &Path, clip: &AudioClip) -> Result<()> {
    let file = write_temp_audio(temp_dir, "capture_", "wav", clip.bytes())?;
    let played = player.play_file(file.path()).await;
    remove_temp_audio(file);
    played
}

#[async_trait]
impl Recognizer for SpeechRecognizer {
    async fn capture_and_recognize(
        &mut self,
        prompt: &str,
        debug_audio: bool,
    ) -> RecognitionOutcome {
        if !self.is_available() {
            self.report_unavailable();
            return RecognitionOutcome::Unintelligible;
        }
        let (Some(source), Some(transcriber)) = (self.source.as_mut(), self.transcriber.clone())
        else {
            return RecognitionOutcome::Unintelligible;
        };

        let config = self.config.snapshot();

        match source.calibrate(CALIBRATION_WINDOW).await {
            Ok(threshold) => tracing::debug!(threshold, "ambient noise calibrated"),
            Err(e) => {
                tracing::warn!(error = %e, "calibration failed");
                return RecognitionOutcome::ServiceError(e.to_string());
            }
        }

        self.display.display(prompt, MessageKind::Listening);

        let limits = ListenLimits {
            onset_timeout: config.recognition_timeout,
            phrase_limit: config.phrase_timeout,
        };

        let samples = match source.listen(limits).await {
            Ok(Listened::Phrase(samples)) => samples,
            Ok(Listened::NoSpeech) => return RecognitionOutcome::Timeout,
            Err(e) => {
                tracing::warn!(error = %e, "capture failed");
                return RecognitionOutcome::ServiceError(e.to_string());
            }
        };

        let sample_rate = source.sample_rate();
        tracing::debug!(samples = samples.len(), sample_rate, "phrase captured");

        let clip = match AudioClip::from_samples(&samples, sample_rate) {
            Ok(clip) => clip,
            Err(e) => return RecognitionOutcome::ServiceError(e.to_string()),
        };

        if debug_audio {
            if let Err(e) = play_debug(self.player.as_ref(), &self.temp_dir, &clip).await {
                tracing::warn!(error = %e, "debug playback failed");
            }
        }

        match transcriber.transcribe(clip, &config.language).await {
            Ok(Transcription::Heard(text)) => RecognitionOutcome::from_transcript(&text),
            Ok(Transcription::NotUnderstood) => RecognitionOutcome::Unintelligible,
            Err(e) => {
                tracing::warn!(error = %e, "recognition service failed");
                RecognitionOutcome::ServiceError(e.to_string())
            }
        }
    }

    fn is_available(&self) -> bool {
        self.source.is_some() && self.transcriber.is_some()
    }
}
