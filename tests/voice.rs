//! Voice pipeline integration tests
//!
//! Tests voice components without requiring audio hardware

use std::io::Cursor;
use std::sync::mpsc;
use std::time::Duration;

use parley::voice::{
    AudioClip, DetectorEvent, DetectorState, ListenLimits, Listened, SAMPLE_RATE, SpeechDetector,
    collect_window, decode_wav, listen_for_phrase, samples_to_wav,
};

mod common;

use common::{chunked, generate_silence, generate_sine_samples};

/// 0.1 s at 16kHz
const CHUNK: usize = 1600;

fn limits(onset_secs: u64, phrase_secs: u64) -> ListenLimits {
    ListenLimits {
        onset_timeout: Duration::from_secs(onset_secs),
        phrase_limit: Duration::from_secs(phrase_secs),
    }
}

/// A channel pre-loaded with `samples`; the sender is dropped when `close`
fn feed(samples: &[f32], close: bool) -> (mpsc::Receiver<Vec<f32>>, Option<mpsc::Sender<Vec<f32>>>) {
    let (tx, rx) = mpsc::channel();
    for chunk in chunked(samples, CHUNK) {
        tx.send(chunk).unwrap();
    }
    (rx, if close { None } else { Some(tx) })
}

#[test]
fn test_detector_creation() {
    let detector = SpeechDetector::new(SAMPLE_RATE);

    assert_eq!(detector.state(), DetectorState::Waiting);
    assert_eq!(detector.sample_rate(), SAMPLE_RATE);
    assert_eq!(detector.phrase_len(), 0);
}

#[test]
fn test_speech_activity_detection() {
    let mut detector = SpeechDetector::new(SAMPLE_RATE);

    // Silence should not trigger
    let silence = generate_silence(0.1);
    assert_eq!(detector.process(&silence), DetectorEvent::Silence);
    assert_eq!(detector.state(), DetectorState::Waiting);

    // Loud speech starts a phrase
    let speech = generate_sine_samples(440.0, 0.1, 0.5);
    assert_eq!(detector.process(&speech), DetectorEvent::Onset);
    assert_eq!(detector.state(), DetectorState::Speaking);

    assert_eq!(detector.process(&speech), DetectorEvent::Speaking);
    assert_eq!(detector.phrase_len(), speech.len() * 2);
}

#[test]
fn test_phrase_complete_detection() {
    let mut detector = SpeechDetector::new(SAMPLE_RATE);

    detector.process(&generate_sine_samples(440.0, 0.5, 0.3));

    // A pause shorter than the threshold keeps the phrase open
    assert_eq!(detector.process(&generate_silence(0.5)), DetectorEvent::Speaking);

    // Now complete
    assert_eq!(detector.process(&generate_silence(0.4)), DetectorEvent::Complete);

    // 0.5 s speech, then 0.9 s of trailing silence
    let phrase = detector.take_phrase();
    assert_eq!(phrase.len(), 8000 + 8000 + 6400);
    assert_eq!(detector.state(), DetectorState::Waiting);
    assert_eq!(detector.phrase_len(), 0);
}

#[test]
fn test_detector_reset_keeps_calibration() {
    let mut detector = SpeechDetector::new(SAMPLE_RATE);
    let threshold = detector.calibrate(&generate_sine_samples(440.0, 0.5, 0.02));

    detector.process(&generate_sine_samples(440.0, 0.2, 0.5));
    detector.reset();

    assert_eq!(detector.state(), DetectorState::Waiting);
    assert_eq!(detector.phrase_len(), 0);
    assert!((detector.energy_threshold() - threshold).abs() < f32::EPSILON);
}

#[test]
fn test_calibration_raises_threshold_in_noisy_room() {
    let mut detector = SpeechDetector::new(SAMPLE_RATE);

    // Steady hum at RMS ~0.14
    detector.calibrate(&generate_sine_samples(60.0, 0.5, 0.2));

    // Quiet speech below the hum level no longer counts
    let quiet = generate_sine_samples(440.0, 0.1, 0.15);
    assert_eq!(detector.process(&quiet), DetectorEvent::Silence);

    let loud = generate_sine_samples(440.0, 0.1, 0.6);
    assert_eq!(detector.process(&loud), DetectorEvent::Onset);
}

#[test]
fn test_listen_captures_phrase() {
    let mut audio = generate_silence(0.5);
    audio.extend(generate_sine_samples(440.0, 1.0, 0.5));
    audio.extend(generate_silence(1.0));

    let (rx, _tx) = feed(&audio, false);
    let mut detector = SpeechDetector::new(SAMPLE_RATE);

    let result = listen_for_phrase(&rx, &mut detector, limits(5, 15)).unwrap();

    // One second of speech plus the 0.8 s pause that ended it
    let Listened::Phrase(phrase) = result else {
        panic!("expected a phrase, got {result:?}");
    };
    assert_eq!(phrase.len(), 16000 + 12800);
}

#[test]
fn test_listen_times_out_without_speech() {
    let (rx, _tx) = feed(&generate_silence(3.0), false);
    let mut detector = SpeechDetector::new(SAMPLE_RATE);

    let result = listen_for_phrase(&rx, &mut detector, limits(1, 15)).unwrap();

    assert_eq!(result, Listened::NoSpeech);
}

#[test]
fn test_listen_onset_timeout_counts_discarded_clicks() {
    // A click every second, each too short to be a phrase
    let mut audio = Vec::new();
    for _ in 0..20 {
        audio.extend(generate_sine_samples(440.0, 0.1, 0.5));
        audio.extend(generate_silence(0.9));
    }
    let total_chunks = audio.len() / CHUNK;

    let (rx, _tx) = feed(&audio, false);
    let mut detector = SpeechDetector::new(SAMPLE_RATE);

    let result = listen_for_phrase(&rx, &mut detector, limits(1, 15)).unwrap();

    assert_eq!(result, Listened::NoSpeech);
    let consumed = total_chunks - rx.try_iter().count();
    assert_eq!(consumed, 10, "onset wait ran past one second of audio");
}

#[test]
fn test_listen_stops_at_phrase_limit() {
    let (rx, _tx) = feed(&generate_sine_samples(440.0, 5.0, 0.5), false);
    let mut detector = SpeechDetector::new(SAMPLE_RATE);

    let result = listen_for_phrase(&rx, &mut detector, limits(5, 1)).unwrap();

    let Listened::Phrase(phrase) = result else {
        panic!("expected a phrase, got {result:?}");
    };
    assert_eq!(phrase.len(), 16000);
}

#[test]
fn test_listen_closed_stream_before_speech_is_error() {
    let (rx, _) = feed(&generate_silence(0.2), true);
    let mut detector = SpeechDetector::new(SAMPLE_RATE);

    assert!(listen_for_phrase(&rx, &mut detector, limits(5, 15)).is_err());
}

#[test]
fn test_listen_closed_stream_mid_phrase_keeps_audio() {
    let (rx, _) = feed(&generate_sine_samples(440.0, 0.5, 0.5), true);
    let mut detector = SpeechDetector::new(SAMPLE_RATE);

    let result = listen_for_phrase(&rx, &mut detector, limits(5, 15)).unwrap();

    assert_eq!(result, Listened::Phrase(generate_sine_samples(440.0, 0.5, 0.5)));
}

#[test]
fn test_collect_window_exact_length() {
    let (rx, _tx) = feed(&generate_silence(1.0), false);

    let window = collect_window(&rx, SAMPLE_RATE, Duration::from_millis(500)).unwrap();

    assert_eq!(window.len(), 8000);
}

#[test]
fn test_samples_to_wav() {
    let samples = generate_sine_samples(440.0, 0.1, 0.5);
    let wav_data = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    // Check WAV header magic
    assert_eq!(&wav_data[0..4], b"RIFF");
    assert_eq!(&wav_data[8..12], b"WAVE");

    // WAV header is 44 bytes, then 16-bit samples
    assert_eq!(wav_data.len(), 44 + samples.len() * 2);
}

#[test]
fn test_wav_roundtrip() {
    let original_samples: Vec<f32> = vec![0.0, 0.5, -0.5, 1.0, -1.0, 0.25];
    let wav_data = samples_to_wav(&original_samples, SAMPLE_RATE).unwrap();

    // Read WAV back
    let cursor = Cursor::new(wav_data.clone());
    let mut reader = hound::WavReader::new(cursor).unwrap();

    let spec = reader.spec();
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.channels, 1);

    let read_samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(read_samples.len(), original_samples.len());

    let decoded = decode_wav(&wav_data).unwrap();
    for (a, b) in decoded.samples.iter().zip(&original_samples) {
        assert!((a - b).abs() < 0.001, "{a} vs {b}");
    }
}

#[test]
fn test_clip_carries_rate_and_encoding() {
    let clip = AudioClip::from_samples(&generate_silence(0.25), SAMPLE_RATE).unwrap();

    assert_eq!(clip.sample_rate(), SAMPLE_RATE);
    assert_eq!(clip.encoding().mime_type(), "audio/wav");
    assert!(!clip.is_empty());
}
