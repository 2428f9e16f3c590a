//! Parley - voice-first operator input with typed fallback
//!
//! This library provides:
//! - Speech capture with ambient-noise calibration and phrase detection
//! - Remote speech recognition (Whisper, Deepgram) and synthesis
//!   (ElevenLabs, OpenAI)
//! - An input arbitrator that asks by voice first and falls back to typing
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  InputArbitrator                    │
//! │  ChoicePrompt → VoiceFirst → VoiceRetry → Fallback  │
//! └──────────┬──────────────────┬───────────────┬───────┘
//!            │                  │               │
//! ┌──────────▼───────┐ ┌────────▼───────┐ ┌─────▼───────┐
//! │ SpeechRecognizer │ │  TextToSpeech  │ │  TextInput  │
//! │ mic thread + STT │ │  TTS + player  │ │  terminal   │
//! └──────────────────┘ └────────────────┘ └─────────────┘
//! ```
//!
//! Every component shares one [`SharedSpeechConfig`](config::SharedSpeechConfig).

pub mod config;
pub mod error;
pub mod input;
pub mod session;
pub mod voice;

pub use config::Config;
pub use error::{Error, Result};
pub use input::InputArbitrator;
pub use session::Session;
