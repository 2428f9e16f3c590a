//! Wiring of the speech pipeline from configuration

use std::sync::Arc;

use crate::config::{Config, SharedSpeechConfig};
use crate::input::{ConsoleDisplay, DisplaySink, InputArbitrator, TerminalInput};
use crate::voice::{
    Announcer, AudioPlayback, NoPlayback, Player, SpeechRecognizer, SpeechSynthesizer, SpeechToText,
    Synthesizer, TextToSpeech, Transcriber,
};

/// A ready-to-use pipeline: shared configuration, speaker and arbitrator
pub struct Session {
    config: SharedSpeechConfig,
    speaker: Arc<TextToSpeech>,
    arbitrator: InputArbitrator,
}

impl Session {
    /// Build every component from `config`
    ///
    /// Missing devices or credentials degrade the session (typed input only,
    /// silent announcements) instead of failing it.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let shared = SharedSpeechConfig::new(config.speech.clone());
        let display: Arc<dyn DisplaySink> = Arc::new(ConsoleDisplay);
        let player = init_player();

        let speaker = Arc::new(TextToSpeech::new(
            shared.clone(),
            init_synthesizer(config),
            Arc::clone(&player),
            config.temp_dir.clone(),
        ));

        let recognizer = SpeechRecognizer::initialize(
            shared.clone(),
            init_transcriber(config),
            player,
            Arc::clone(&display),
            config.temp_dir.clone(),
        );

        let arbitrator = InputArbitrator::new(
            shared.clone(),
            Box::new(recognizer),
            Arc::clone(&speaker) as Arc<dyn Announcer>,
            Box::new(TerminalInput),
            display,
        );

        tracing::info!(
            stt = ?config.stt.provider,
            tts = ?config.tts.provider,
            temp_dir = %config.temp_dir.display(),
            "speech session ready"
        );

        Self {
            config: shared,
            speaker,
            arbitrator,
        }
    }

    /// Handle to the live speech configuration
    #[must_use]
    pub const fn config(&self) -> &SharedSpeechConfig {
        &self.config
    }

    #[must_use]
    pub fn speaker(&self) -> &TextToSpeech {
        &self.speaker
    }

    pub fn arbitrator(&mut self) -> &mut InputArbitrator {
        &mut self.arbitrator
    }
}

fn init_player() -> Arc<dyn Player> {
    match AudioPlayback::new() {
        Ok(playback) => Arc::new(playback),
        Err(e) => {
            tracing::warn!(error = %e, "no audio output, playback disabled");
            Arc::new(NoPlayback)
        }
    }
}

fn init_synthesizer(config: &Config) -> Option<Arc<dyn Synthesizer>> {
    match SpeechSynthesizer::from_config(config) {
        Ok(synthesizer) => {
            tracing::info!(provider = ?config.tts.provider, model = %config.tts.model, "TTS initialized");
            Some(Arc::new(synthesizer))
        }
        Err(e) => {
            tracing::info!(error = %e, "TTS unavailable");
            None
        }
    }
}

fn init_transcriber(config: &Config) -> Option<Arc<dyn Transcriber>> {
    match SpeechToText::from_config(config) {
        Ok(stt) => {
            tracing::info!(provider = ?config.stt.provider, model = %config.stt.model, "STT initialized");
            Some(Arc::new(stt))
        }
        Err(e) => {
            tracing::info!(error = %e, "STT unavailable");
            None
        }
    }
}
