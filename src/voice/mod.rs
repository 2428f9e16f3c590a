//! Voice processing module
//!
//! Handles microphone capture, speech detection, recognition, synthesis and
//! playback. Remote services sit behind [`Transcriber`] and [`Synthesizer`].

mod capture;
mod detector;
mod microphone;
mod outcome;
mod playback;
mod recognizer;
mod stt;
mod tts;

pub use capture::{AudioCapture, AudioClip, AudioEncoding, SAMPLE_RATE, samples_to_wav};
pub use detector::{
    DetectorEvent, DetectorState, ListenLimits, Listened, SpeechDetector, calculate_energy,
    collect_window, listen_for_phrase,
};
pub use microphone::{AudioSource, Microphone};
pub use outcome::{RecognitionOutcome, SynthesisOutcome};
pub use playback::{
    AudioPlayback, DecodedAudio, NoPlayback, Player, decode_file, decode_mp3, decode_wav, resample,
};
pub use recognizer::{CALIBRATION_WINDOW, Recognizer, SpeechRecognizer};
pub use stt::{SpeechToText, Transcriber, Transcription};
pub use tts::{
    Announcer, OPENAI_DEFAULT_VOICE, SpeechSynthesizer, SynthesisRequest, Synthesizer,
    TextToSpeech, remove_temp_audio, write_temp_audio,
};
