//! Shared test utilities
//!
//! Scripted stand-ins for the microphone, remote services, terminal and
//! display, so the pipeline runs without audio hardware or network.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use parley::config::{SharedSpeechConfig, SpeechConfig, SpeechOptions, VoiceSettingsPatch};
use parley::input::{DisplaySink, InputArbitrator, MessageKind, TextInput};
use parley::voice::{
    Announcer, AudioClip, AudioSource, ListenLimits, Listened, Player, RecognitionOutcome,
    Recognizer, SAMPLE_RATE, SynthesisOutcome, SynthesisRequest, Synthesizer, Transcriber,
    Transcription,
};
use parley::{Error, Result};

/// Generate sine wave audio samples
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn generate_silence(duration_secs: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    vec![0.0; num_samples]
}

/// Split samples into device-sized chunks
pub fn chunked(samples: &[f32], chunk: usize) -> Vec<Vec<f32>> {
    samples.chunks(chunk).map(<[f32]>::to_vec).collect()
}

/// Shared configuration with `options` applied
pub fn speech_config(options: &SpeechOptions) -> SharedSpeechConfig {
    let shared = SharedSpeechConfig::new(SpeechConfig::default());
    shared.configure(options).expect("valid test options");
    shared
}

/// Recognizer that replays scripted outcomes and counts captures
pub struct ScriptedRecognizer {
    outcomes: VecDeque<RecognitionOutcome>,
    available: bool,
    captures: Arc<AtomicUsize>,
}

impl ScriptedRecognizer {
    pub fn new(outcomes: impl IntoIterator<Item = RecognitionOutcome>) -> Self {
        Self {
            outcomes: outcomes.into_iter().collect(),
            available: true,
            captures: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A recognizer with no microphone
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(Vec::<RecognitionOutcome>::new())
        }
    }

    pub fn capture_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.captures)
    }
}

#[async_trait]
impl Recognizer for ScriptedRecognizer {
    async fn capture_and_recognize(
        &mut self,
        _prompt: &str,
        _debug_audio: bool,
    ) -> RecognitionOutcome {
        self.captures.fetch_add(1, Ordering::SeqCst);
        self.outcomes
            .pop_front()
            .unwrap_or(RecognitionOutcome::Timeout)
    }

    fn is_available(&self) -> bool {
        self.available
    }
}

/// Typed input that replays scripted lines; running out reads as EOF
pub struct ScriptedInput {
    lines: VecDeque<String>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedInput {
    pub fn new<S: Into<String>>(lines: impl IntoIterator<Item = S>) -> Self {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            prompts: Arc::default(),
        }
    }

    pub fn prompts(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.prompts)
    }
}

#[async_trait]
impl TextInput for ScriptedInput {
    async fn read_line(&mut self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.lines
            .pop_front()
            .map(|line| line.trim().to_string())
            .ok_or_else(|| Error::Input("end of input".to_string()))
    }
}

/// Display that records every message
#[derive(Default)]
pub struct RecordingDisplay {
    messages: Mutex<Vec<(MessageKind, String)>>,
}

impl RecordingDisplay {
    pub fn messages(&self) -> Vec<(MessageKind, String)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn count(&self, kind: MessageKind) -> usize {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }
}

impl DisplaySink for RecordingDisplay {
    fn display(&self, message: &str, kind: MessageKind) {
        self.messages.lock().unwrap().push((kind, message.to_string()));
    }
}

/// Announcer that records what it was asked to say
#[derive(Default)]
pub struct RecordingAnnouncer {
    spoken: Mutex<Vec<String>>,
}

impl RecordingAnnouncer {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl Announcer for RecordingAnnouncer {
    async fn announce(&self, text: &str, _settings: Option<&VoiceSettingsPatch>) -> SynthesisOutcome {
        self.spoken.lock().unwrap().push(text.to_string());
        SynthesisOutcome::Played
    }
}

/// Synthesizer that records requests and returns fixed bytes
pub struct RecordingSynthesizer {
    requests: Mutex<Vec<SynthesisRequest>>,
    fail: bool,
}

impl RecordingSynthesizer {
    pub fn new() -> Self {
        Self {
            requests: Mutex::default(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn requests(&self) -> Vec<SynthesisRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Synthesizer for RecordingSynthesizer {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(Error::Tts("service unavailable".to_string()));
        }
        Ok(b"ID3fake-mp3".to_vec())
    }
}

/// Player that records paths, whether they existed, and can fail
pub struct StubPlayer {
    played: Mutex<Vec<(PathBuf, bool)>>,
    fail: bool,
}

impl StubPlayer {
    pub fn new() -> Self {
        Self {
            played: Mutex::default(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// `(path, existed when played)` for each call
    pub fn played(&self) -> Vec<(PathBuf, bool)> {
        self.played.lock().unwrap().clone()
    }
}

#[async_trait]
impl Player for StubPlayer {
    async fn play_file(&self, path: &Path) -> Result<()> {
        self.played
            .lock()
            .unwrap()
            .push((path.to_path_buf(), path.exists()));
        if self.fail {
            return Err(Error::Audio("device lost".to_string()));
        }
        Ok(())
    }
}

/// Audio source that returns scripted listen results
pub struct ScriptedSource {
    results: VecDeque<Result<Listened>>,
    calibrations: Arc<AtomicUsize>,
    limits: Arc<Mutex<Vec<ListenLimits>>>,
}

impl ScriptedSource {
    pub fn new(results: impl IntoIterator<Item = Result<Listened>>) -> Self {
        Self {
            results: results.into_iter().collect(),
            calibrations: Arc::default(),
            limits: Arc::default(),
        }
    }

    pub fn calibration_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calibrations)
    }

    pub fn seen_limits(&self) -> Arc<Mutex<Vec<ListenLimits>>> {
        Arc::clone(&self.limits)
    }
}

#[async_trait]
impl AudioSource for ScriptedSource {
    async fn calibrate(&mut self, _window: Duration) -> Result<f32> {
        self.calibrations.fetch_add(1, Ordering::SeqCst);
        Ok(0.01)
    }

    async fn listen(&mut self, limits: ListenLimits) -> Result<Listened> {
        self.limits.lock().unwrap().push(limits);
        self.results
            .pop_front()
            .unwrap_or(Ok(Listened::NoSpeech))
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }
}

/// Transcriber that returns a fixed result and counts calls
pub struct FixedTranscriber {
    result: std::result::Result<Transcription, String>,
    languages: Mutex<Vec<String>>,
}

impl FixedTranscriber {
    pub fn heard(text: &str) -> Self {
        Self {
            result: Ok(Transcription::Heard(text.to_string())),
            languages: Mutex::default(),
        }
    }

    pub fn not_understood() -> Self {
        Self {
            result: Ok(Transcription::NotUnderstood),
            languages: Mutex::default(),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            result: Err(reason.to_string()),
            languages: Mutex::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.languages.lock().unwrap().len()
    }

    /// Language tag passed with each call
    pub fn languages(&self) -> Vec<String> {
        self.languages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcriber for FixedTranscriber {
    async fn transcribe(&self, _clip: AudioClip, language: &str) -> Result<Transcription> {
        self.languages.lock().unwrap().push(language.to_string());
        self.result.clone().map_err(Error::Stt)
    }
}

/// Arbitrator over scripted parts, with handles for assertions
pub struct Harness {
    pub arbitrator: InputArbitrator,
    pub captures: Arc<AtomicUsize>,
    pub display: Arc<RecordingDisplay>,
    pub announcer: Arc<RecordingAnnouncer>,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl Harness {
    pub fn new(
        options: &SpeechOptions,
        recognizer: ScriptedRecognizer,
        typed: ScriptedInput,
    ) -> Self {
        let captures = recognizer.capture_counter();
        let prompts = typed.prompts();
        let display = Arc::new(RecordingDisplay::default());
        let announcer = Arc::new(RecordingAnnouncer::default());

        let arbitrator = InputArbitrator::new(
            speech_config(options),
            Box::new(recognizer),
            Arc::clone(&announcer) as Arc<dyn Announcer>,
            Box::new(typed),
            Arc::clone(&display) as Arc<dyn DisplaySink>,
        );

        Self {
            arbitrator,
            captures,
            display,
            announcer,
            prompts,
        }
    }

    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }

    pub fn typed_reads(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}
