//! Energy-based speech detection
//!
//! Calibrated against a short window of ambient noise before every capture,
//! then used to find the start and end of one spoken phrase.

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use crate::{Error, Result};

/// Energy threshold used before any calibration
const DEFAULT_ENERGY_THRESHOLD: f32 = 0.03;

/// Lowest threshold calibration may settle on
const MIN_ENERGY_THRESHOLD: f32 = 0.005;

/// Calibrated threshold is this multiple of the ambient RMS
const DYNAMIC_ENERGY_RATIO: f32 = 1.5;

/// Minimum speech before a pause may end the phrase
const MIN_SPEECH: Duration = Duration::from_millis(300);

/// Silence that ends a phrase
const PAUSE_THRESHOLD: Duration = Duration::from_millis(800);

/// Extra wall-clock wait for a stalled device
const STALL_GRACE: Duration = Duration::from_secs(2);

/// Detector state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// No speech yet
    Waiting,
    /// Inside a phrase
    Speaking,
}

/// Event produced by one chunk of samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorEvent {
    /// Still waiting for speech
    Silence,
    /// Speech started with this chunk
    Onset,
    /// Phrase continues
    Speaking,
    /// Phrase ended with enough trailing silence
    Complete,
}

/// Finds one phrase in a stream of mono samples
#[derive(Debug, Clone)]
pub struct SpeechDetector {
    sample_rate: u32,
    energy_threshold: f32,
    state: DetectorState,
    phrase: Vec<f32>,
    speech_samples: usize,
    silence_samples: usize,
}

impl SpeechDetector {
    /// Create a detector for audio at `sample_rate`
    #[must_use]
    pub const fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            energy_threshold: DEFAULT_ENERGY_THRESHOLD,
            state: DetectorState::Waiting,
            phrase: Vec::new(),
            speech_samples: 0,
            silence_samples: 0,
        }
    }

    /// Set the energy threshold from ambient samples, returning the new value
    ///
    /// Replaces any earlier calibration; profiles drift between captures.
    pub fn calibrate(&mut self, ambient: &[f32]) -> f32 {
        let ambient_energy = calculate_energy(ambient);
        self.energy_threshold = (ambient_energy * DYNAMIC_ENERGY_RATIO).max(MIN_ENERGY_THRESHOLD);

        tracing::debug!(
            ambient_energy,
            threshold = self.energy_threshold,
            "ambient noise calibrated"
        );
        self.energy_threshold
    }

    /// Feed one chunk of samples
    pub fn process(&mut self, samples: &[f32]) -> DetectorEvent {
        let energy = calculate_energy(samples);
        let is_speech = energy > self.energy_threshold;

        match self.state {
            DetectorState::Waiting => {
                if is_speech {
                    self.state = DetectorState::Speaking;
                    self.phrase.clear();
                    self.phrase.extend_from_slice(samples);
                    self.speech_samples = samples.len();
                    self.silence_samples = 0;
                    tracing::trace!(energy, "speech onset");
                    DetectorEvent::Onset
                } else {
                    DetectorEvent::Silence
                }
            }
            DetectorState::Speaking => {
                self.phrase.extend_from_slice(samples);

                if is_speech {
                    self.speech_samples += samples.len();
                    self.silence_samples = 0;
                } else {
                    self.silence_samples += samples.len();
                }

                if self.silence_samples >= self.samples_for(PAUSE_THRESHOLD) {
                    if self.speech_samples >= self.samples_for(MIN_SPEECH) {
                        tracing::debug!(samples = self.phrase.len(), "phrase complete");
                        return DetectorEvent::Complete;
                    }
                    // A short blip followed by silence is noise, not a phrase
                    tracing::trace!("discarding short burst");
                    self.reset();
                    return DetectorEvent::Silence;
                }

                DetectorEvent::Speaking
            }
        }
    }

    /// Take the accumulated phrase and return to waiting
    pub fn take_phrase(&mut self) -> Vec<f32> {
        let phrase = std::mem::take(&mut self.phrase);
        self.reset();
        phrase
    }

    /// Reset to waiting, keeping the calibrated threshold
    pub fn reset(&mut self) {
        self.state = DetectorState::Waiting;
        self.phrase.clear();
        self.speech_samples = 0;
        self.silence_samples = 0;
    }

    #[must_use]
    pub const fn state(&self) -> DetectorState {
        self.state
    }

    #[must_use]
    pub const fn energy_threshold(&self) -> f32 {
        self.energy_threshold
    }

    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[must_use]
    pub fn phrase_len(&self) -> usize {
        self.phrase.len()
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn samples_for(&self, duration: Duration) -> usize {
        (duration.as_secs_f64() * f64::from(self.sample_rate)) as usize
    }
}

/// Limits for one capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenLimits {
    /// Maximum wait for speech onset
    pub onset_timeout: Duration,
    /// Maximum phrase length once speech started
    pub phrase_limit: Duration,
}

/// Result of listening for one phrase
#[derive(Debug, Clone, PartialEq)]
pub enum Listened {
    /// Samples of the captured phrase
    Phrase(Vec<f32>),
    /// No speech before the onset timeout
    NoSpeech,
}

/// Collect `window` worth of samples from a chunk stream
///
/// # Errors
///
/// Returns error if the stream closes before the window is filled
pub fn collect_window(
    chunks: &Receiver<Vec<f32>>,
    sample_rate: u32,
    window: Duration,
) -> Result<Vec<f32>> {
    let wanted = samples_in(window, sample_rate);
    let mut collected = Vec::with_capacity(wanted);

    while collected.len() < wanted {
        match chunks.recv_timeout(window + STALL_GRACE) {
            Ok(chunk) => collected.extend_from_slice(&chunk),
            Err(RecvTimeoutError::Timeout) => {
                return Err(Error::Audio("capture device stalled".to_string()));
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(Error::Audio("capture stream closed".to_string()));
            }
        }
    }

    collected.truncate(wanted);
    Ok(collected)
}

/// Listen for one phrase on a chunk stream
///
/// Elapsed time is counted in audio received, so the limits mean seconds of
/// audio. A device that stops delivering is bounded by wall clock as well.
///
/// # Errors
///
/// Returns error if the stream closes while waiting for speech
pub fn listen_for_phrase(
    chunks: &Receiver<Vec<f32>>,
    detector: &mut SpeechDetector,
    limits: ListenLimits,
) -> Result<Listened> {
    let sample_rate = detector.sample_rate();
    let onset_budget = samples_in(limits.onset_timeout, sample_rate);
    let phrase_budget = samples_in(limits.phrase_limit, sample_rate);
    let mut waited = 0usize;

    detector.reset();

    loop {
        let speaking = detector.state() == DetectorState::Speaking;
        let remaining = if speaking {
            phrase_budget.saturating_sub(detector.phrase_len())
        } else {
            onset_budget.saturating_sub(waited)
        };
        let wait = duration_of(remaining, sample_rate) + STALL_GRACE;

        let chunk = match chunks.recv_timeout(wait) {
            Ok(chunk) => chunk,
            Err(RecvTimeoutError::Timeout) => {
                tracing::debug!(speaking, "capture device stalled");
                return Ok(if speaking {
                    Listened::Phrase(detector.take_phrase())
                } else {
                    Listened::NoSpeech
                });
            }
            Err(RecvTimeoutError::Disconnected) if speaking => {
                return Ok(Listened::Phrase(detector.take_phrase()));
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(Error::Audio("capture stream closed".to_string()));
            }
        };

        // Discarded bursts still spend the onset budget
        waited += chunk.len();

        match detector.process(&chunk) {
            DetectorEvent::Complete => return Ok(Listened::Phrase(detector.take_phrase())),
            DetectorEvent::Onset | DetectorEvent::Speaking => {
                if detector.phrase_len() >= phrase_budget {
                    tracing::debug!("phrase limit reached");
                    return Ok(Listened::Phrase(detector.take_phrase()));
                }
            }
            DetectorEvent::Silence => {
                if waited >= onset_budget {
                    tracing::debug!("no speech before onset timeout");
                    return Ok(Listened::NoSpeech);
                }
            }
        }
    }
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn samples_in(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_secs_f64() * f64::from(sample_rate)) as usize
}

#[allow(clippy::cast_precision_loss)]
fn duration_of(samples: usize, sample_rate: u32) -> Duration {
    Duration::from_secs_f64(samples as f64 / f64::from(sample_rate.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_calculation() {
        let silence = vec![0.0f32; 100];
        assert!(calculate_energy(&silence) < 0.001);

        let loud = vec![0.5f32; 100];
        assert!(calculate_energy(&loud) > 0.4);

        assert!(calculate_energy(&[]) < f32::EPSILON);
    }

    #[test]
    fn test_calibration_tracks_ambient_noise() {
        let mut detector = SpeechDetector::new(16000);
        assert!((detector.energy_threshold() - DEFAULT_ENERGY_THRESHOLD).abs() < f32::EPSILON);

        let noisy = vec![0.1f32; 1600];
        let threshold = detector.calibrate(&noisy);
        assert!((threshold - 0.15).abs() < 0.001);

        // Quiet room recalibrates downward, but never below the floor
        let quiet = vec![0.0f32; 1600];
        assert!((detector.calibrate(&quiet) - MIN_ENERGY_THRESHOLD).abs() < f32::EPSILON);
    }

    #[test]
    fn test_short_burst_discarded() {
        let mut detector = SpeechDetector::new(16000);
        // 0.1 s of speech is below the minimum phrase length
        assert_eq!(detector.process(&vec![0.3f32; 1600]), DetectorEvent::Onset);
        assert_eq!(detector.process(&vec![0.0f32; 16000]), DetectorEvent::Silence);
        assert_eq!(detector.state(), DetectorState::Waiting);
    }
}
