//! Voice-first input with typed fallback
//!
//! Each request walks a small state machine:
//!
//! ```text
//! ChoicePrompt --empty--> VoiceFirst --fail--> VoiceRetry --empty--> capture #2
//!      |                      |                    |                     |
//!    typed               magic phrase            typed            fail/magic
//!      v                      v                    v                     v
//!     Done              TextFallback             Done             TextFallback
//! ```
//!
//! At most two captures happen per request. Every path ends in `Done`, so
//! the caller always gets a string back.

use std::sync::Arc;

use crate::config::{EmptyChoice, SharedSpeechConfig, SpeechConfig};
use crate::voice::{Announcer, RecognitionOutcome, Recognizer};

use super::display::{DisplaySink, MessageKind};
use super::terminal::TextInput;

/// Utterances that switch a request to typed input
pub const MAGIC_PHRASES: &[&str] = &["use text input", "text input", "type", "typing", "keyboard"];

/// Where a request currently stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArbiterState {
    /// Ask whether to speak or type
    ChoicePrompt,
    /// First capture
    VoiceFirst,
    /// Offer one more capture or a typed answer
    VoiceRetry,
    /// Typed answer, taken as-is
    TextFallback,
    /// Final answer
    Done(String),
}

/// Whether `text` is one of [`MAGIC_PHRASES`]
///
/// Matches the whole utterance, ignoring case, surrounding whitespace and
/// trailing sentence punctuation.
#[must_use]
pub fn is_magic_phrase(text: &str) -> bool {
    let normalized = text
        .trim()
        .trim_end_matches(['.', '!', '?', ','])
        .trim()
        .to_lowercase();
    MAGIC_PHRASES.contains(&normalized.as_str())
}

/// What one capture means for the state machine
enum Heard {
    Answer(String),
    SwitchToText,
    Failed(RecognitionOutcome),
}

impl From<RecognitionOutcome> for Heard {
    fn from(outcome: RecognitionOutcome) -> Self {
        match outcome {
            RecognitionOutcome::Text(text) if is_magic_phrase(&text) => Self::SwitchToText,
            RecognitionOutcome::Text(text) => Self::Answer(text),
            failed @ (RecognitionOutcome::Empty
            | RecognitionOutcome::Unintelligible
            | RecognitionOutcome::ServiceError(_)
            | RecognitionOutcome::Timeout) => Self::Failed(failed),
        }
    }
}

/// Decides per request between voice and typed input
pub struct InputArbitrator {
    config: SharedSpeechConfig,
    recognizer: Box<dyn Recognizer>,
    announcer: Arc<dyn Announcer>,
    text: Box<dyn TextInput>,
    display: Arc<dyn DisplaySink>,
}

impl InputArbitrator {
    #[must_use]
    pub fn new(
        config: SharedSpeechConfig,
        recognizer: Box<dyn Recognizer>,
        announcer: Arc<dyn Announcer>,
        text: Box<dyn TextInput>,
        display: Arc<dyn DisplaySink>,
    ) -> Self {
        Self {
            config,
            recognizer,
            announcer,
            text,
            display,
        }
    }

    /// Shared configuration handle
    #[must_use]
    pub const fn config(&self) -> &SharedSpeechConfig {
        &self.config
    }

    /// State a new request starts in
    #[must_use]
    pub fn initial_state(&self, config: &SpeechConfig) -> ArbiterState {
        if !config.voice_input_enabled() || !self.recognizer.is_available() {
            ArbiterState::TextFallback
        } else if config.voice_input_is_default {
            ArbiterState::VoiceFirst
        } else {
            ArbiterState::ChoicePrompt
        }
    }

    /// Ask the operator for one answer
    ///
    /// `spoken_prompt` replaces `prompt` for speech when the written form
    /// reads badly aloud. Never fails; an empty string is a valid answer.
    pub async fn request_input(&mut self, prompt: &str, spoken_prompt: Option<&str>) -> String {
        let config = self.config.snapshot();

        self.display.display(prompt, MessageKind::Question);
        if config.speak_questions {
            self.announce(spoken_prompt.unwrap_or(prompt)).await;
        }

        let mut state = self.initial_state(&config);
        let mut captures = 0u8;
        tracing::debug!(?state, "input request started");

        loop {
            state = match state {
                ArbiterState::ChoicePrompt => {
                    let line = self
                        .read_line("Press Enter to answer by voice, or type your answer")
                        .await;
                    if line.is_empty() {
                        match config.empty_choice {
                            EmptyChoice::Voice => ArbiterState::VoiceFirst,
                            EmptyChoice::Text => ArbiterState::TextFallback,
                        }
                    } else {
                        ArbiterState::Done(line)
                    }
                }
                ArbiterState::VoiceFirst => {
                    captures += 1;
                    match self.capture(prompt, &config).await {
                        Heard::Answer(text) => self.accept(text, &config).await,
                        Heard::SwitchToText => self.switch_to_text(),
                        Heard::Failed(outcome) => {
                            self.explain(
                                &outcome,
                                "You can try once more or type your answer.",
                                &config,
                            )
                            .await;
                            ArbiterState::VoiceRetry
                        }
                    }
                }
                ArbiterState::VoiceRetry => {
                    let line = self
                        .read_line("Press Enter to try speaking again, or type your answer")
                        .await;
                    if line.is_empty() {
                        captures += 1;
                        match self.capture(prompt, &config).await {
                            Heard::Answer(text) => self.accept(text, &config).await,
                            Heard::SwitchToText => self.switch_to_text(),
                            Heard::Failed(outcome) => {
                                self.explain(&outcome, "Please type your answer.", &config)
                                    .await;
                                ArbiterState::TextFallback
                            }
                        }
                    } else {
                        ArbiterState::Done(line)
                    }
                }
                ArbiterState::TextFallback => ArbiterState::Done(self.read_line(prompt).await),
                ArbiterState::Done(answer) => {
                    tracing::debug!(captures, chars = answer.len(), "input request finished");
                    return answer;
                }
            };
        }
    }

    /// Speak `text`, best-effort
    pub async fn announce(&self, text: &str) {
        let outcome = self.announcer.announce(text, None).await;
        tracing::trace!(%outcome, "announcement finished");
    }

    async fn capture(&mut self, prompt: &str, config: &SpeechConfig) -> Heard {
        let outcome = self
            .recognizer
            .capture_and_recognize(prompt, config.debug_audio_enabled)
            .await;
        tracing::debug!(?outcome, "capture finished");
        Heard::from(outcome)
    }

    async fn accept(&self, text: String, config: &SpeechConfig) -> ArbiterState {
        self.display.display(&format!("Heard: {text}"), MessageKind::Success);
        if config.speak_confirmations {
            self.announce("Got it").await;
        }
        ArbiterState::Done(text)
    }

    fn switch_to_text(&self) -> ArbiterState {
        self.display.display("Switching to typed input.", MessageKind::Info);
        ArbiterState::TextFallback
    }

    async fn explain(&self, outcome: &RecognitionOutcome, next_step: &str, config: &SpeechConfig) {
        if let RecognitionOutcome::ServiceError(reason) = outcome {
            tracing::warn!(reason = %reason, "voice attempt failed");
        }

        let message = format!("{}. {next_step}", outcome.failure_hint());
        self.display.display(&message, MessageKind::Warning);
        if config.speak_errors {
            self.announce(&message).await;
        }
    }

    /// Read a typed line; a read failure counts as an empty answer
    async fn read_line(&mut self, prompt: &str) -> String {
        match self.text.read_line(prompt).await {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "typed input failed, treating as empty");
                String::new()
            }
        }
    }
}
