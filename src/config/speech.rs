//! Speech configuration shared by the recognizer, synthesizer and arbitrator
//!
//! [`SpeechConfig`] is the value; [`SharedSpeechConfig`] is the handle passed
//! into component constructors. The only mutation path is
//! [`SharedSpeechConfig::configure`], which merges a partial
//! [`SpeechOptions`] set and ignores keys it does not recognize.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default `ElevenLabs` voice (Rachel)
pub const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";

/// Default recognition language tag
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// `ElevenLabs` voice tuning parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    /// Higher is steadier, less expressive (0.0 to 1.0)
    pub stability: f32,

    /// Closeness to the original voice (0.0 to 1.0)
    pub similarity_boost: f32,

    /// Style exaggeration (0.0 to 1.0)
    pub style: f32,

    /// Speaker boost toggle
    pub use_speaker_boost: bool,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.75,
            similarity_boost: 0.8,
            style: 0.2,
            use_speaker_boost: true,
        }
    }
}

impl VoiceSettings {
    /// Return these settings with every key present in `patch` replaced
    #[must_use]
    pub fn merged(&self, patch: &VoiceSettingsPatch) -> Self {
        Self {
            stability: patch.stability.unwrap_or(self.stability),
            similarity_boost: patch.similarity_boost.unwrap_or(self.similarity_boost),
            style: patch.style.unwrap_or(self.style),
            use_speaker_boost: patch.use_speaker_boost.unwrap_or(self.use_speaker_boost),
        }
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("stability", self.stability),
            ("similarity_boost", self.similarity_boost),
            ("style", self.style),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!(
                    "voice setting {name} must be within [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Partial voice settings; absent keys keep their current value
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct VoiceSettingsPatch {
    pub stability: Option<f32>,
    #[serde(alias = "similarityBoost")]
    pub similarity_boost: Option<f32>,
    pub style: Option<f32>,
    #[serde(alias = "useSpeakerBoost")]
    pub use_speaker_boost: Option<bool>,
}

/// What an empty line selects at the voice/text choice prompt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyChoice {
    /// Empty line starts voice capture
    #[default]
    Voice,
    /// Empty line opens typed input
    Text,
}

/// Speech pipeline configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechConfig {
    /// Master switch for spoken output
    pub enabled: bool,

    /// Synthesis voice identifier
    pub voice_id: String,

    /// Default synthesis settings
    pub voice_settings: VoiceSettings,

    /// Speak prompts before asking
    pub speak_questions: bool,

    /// Speak a short acknowledgement after a voice answer
    pub speak_confirmations: bool,

    /// Speak failure explanations
    pub speak_errors: bool,

    /// Attempt voice capture at all
    pub listen_for_responses: bool,

    /// Maximum wait for speech onset
    pub recognition_timeout: Duration,

    /// Maximum length of a phrase once speech started
    pub phrase_timeout: Duration,

    /// Offer voice input to the operator
    pub offer_voice_input: bool,

    /// Start with voice capture instead of a choice prompt
    pub voice_input_is_default: bool,

    /// Play each capture back before recognition
    pub debug_audio_enabled: bool,

    /// Recognition language tag (e.g. "en-US")
    pub language: String,

    /// Meaning of an empty line at the choice prompt
    pub empty_choice: EmptyChoice,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            voice_id: DEFAULT_VOICE_ID.to_string(),
            voice_settings: VoiceSettings::default(),
            speak_questions: true,
            speak_confirmations: true,
            speak_errors: false,
            listen_for_responses: true,
            recognition_timeout: Duration::from_secs(10),
            phrase_timeout: Duration::from_secs(15),
            offer_voice_input: true,
            voice_input_is_default: true,
            debug_audio_enabled: false,
            language: DEFAULT_LANGUAGE.to_string(),
            empty_choice: EmptyChoice::Voice,
        }
    }
}

impl SpeechConfig {
    /// Whether voice capture should be attempted at all
    #[must_use]
    pub const fn voice_input_enabled(&self) -> bool {
        self.listen_for_responses && self.offer_voice_input
    }

    /// Merge `options` into a copy of this configuration
    ///
    /// # Errors
    ///
    /// Returns error if the merged result breaks a range invariant
    pub fn merged(&self, options: &SpeechOptions) -> Result<Self> {
        let mut next = self.clone();

        if let Some(v) = options.enabled {
            next.enabled = v;
        }
        if let Some(v) = &options.voice_id {
            next.voice_id.clone_from(v);
        }
        if let Some(patch) = &options.voice_settings {
            next.voice_settings = next.voice_settings.merged(patch);
        }
        if let Some(v) = options.speak_questions {
            next.speak_questions = v;
        }
        if let Some(v) = options.speak_confirmations {
            next.speak_confirmations = v;
        }
        if let Some(v) = options.speak_errors {
            next.speak_errors = v;
        }
        if let Some(v) = options.listen_for_responses {
            next.listen_for_responses = v;
        }
        if let Some(secs) = options.recognition_timeout {
            next.recognition_timeout = seconds("recognition_timeout", secs)?;
        }
        if let Some(secs) = options.phrase_timeout {
            next.phrase_timeout = seconds("phrase_timeout", secs)?;
        }
        if let Some(v) = options.offer_voice_input {
            next.offer_voice_input = v;
        }
        if let Some(v) = options.voice_input_is_default {
            next.voice_input_is_default = v;
        }
        if let Some(v) = options.debug_audio {
            next.debug_audio_enabled = v;
        }
        if let Some(v) = &options.language {
            if v.trim().is_empty() {
                return Err(Error::Config("language must not be empty".to_string()));
            }
            next.language = v.trim().to_string();
        }
        if let Some(v) = options.empty_choice {
            next.empty_choice = v;
        }

        next.voice_settings.validate()?;
        Ok(next)
    }
}

fn seconds(name: &str, secs: f64) -> Result<Duration> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(Error::Config(format!(
            "{name} must be a positive number of seconds, got {secs}"
        )));
    }
    Ok(Duration::from_secs_f64(secs))
}

/// Partial configuration update
///
/// Every key is optional. Unknown keys are ignored on deserialization, and
/// both `snake_case` and `camelCase` spellings are accepted.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpeechOptions {
    pub enabled: Option<bool>,
    #[serde(alias = "voiceId")]
    pub voice_id: Option<String>,
    #[serde(alias = "voiceSettings")]
    pub voice_settings: Option<VoiceSettingsPatch>,
    #[serde(alias = "speakQuestions")]
    pub speak_questions: Option<bool>,
    #[serde(alias = "speakConfirmations")]
    pub speak_confirmations: Option<bool>,
    #[serde(alias = "speakErrors")]
    pub speak_errors: Option<bool>,
    #[serde(alias = "listenForResponses")]
    pub listen_for_responses: Option<bool>,
    #[serde(
        alias = "recognition_timeout_seconds",
        alias = "recognitionTimeoutSeconds"
    )]
    pub recognition_timeout: Option<f64>,
    #[serde(alias = "phrase_timeout_seconds", alias = "phraseTimeoutSeconds")]
    pub phrase_timeout: Option<f64>,
    #[serde(alias = "offerVoiceInput")]
    pub offer_voice_input: Option<bool>,
    #[serde(alias = "voiceInputIsDefault")]
    pub voice_input_is_default: Option<bool>,
    #[serde(alias = "debug_audio_enabled", alias = "debugAudioEnabled")]
    pub debug_audio: Option<bool>,
    pub language: Option<String>,
    #[serde(alias = "emptyChoice")]
    pub empty_choice: Option<EmptyChoice>,
}

impl SpeechOptions {
    /// Build options from a JSON object, ignoring unrecognized keys
    ///
    /// # Errors
    ///
    /// Returns error if a recognized key carries a value of the wrong type
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Cloneable handle to the process-wide speech configuration
#[derive(Debug, Clone, Default)]
pub struct SharedSpeechConfig {
    inner: Arc<RwLock<SpeechConfig>>,
}

impl SharedSpeechConfig {
    /// Wrap an initial configuration
    #[must_use]
    pub fn new(config: SpeechConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Merge the keys present in `options`
    ///
    /// The update is all-or-nothing: on error the previous configuration
    /// stays in place.
    ///
    /// # Errors
    ///
    /// Returns error if a value breaks a range invariant
    pub fn configure(&self, options: &SpeechOptions) -> Result<()> {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let next = guard.merged(options)?;
        tracing::debug!(?options, "speech configuration updated");
        *guard = next;
        Ok(())
    }

    /// Switch the synthesis voice
    ///
    /// # Errors
    ///
    /// Never fails for a voice id; kept fallible for symmetry with `configure`
    pub fn set_voice(&self, voice_id: &str) -> Result<()> {
        self.configure(&SpeechOptions {
            voice_id: Some(voice_id.to_string()),
            ..SpeechOptions::default()
        })
    }

    /// Copy of the current configuration
    #[must_use]
    pub fn snapshot(&self) -> SpeechConfig {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Well-known `ElevenLabs` voices with short descriptions
#[must_use]
pub const fn popular_voices() -> &'static [(&'static str, &'static str)] {
    &[
        ("21m00Tcm4TlvDq8ikWAM", "Rachel - Pleasant female, clear"),
        ("AZnzlk1XvdvUeBnXmlld", "Domi - Confident female, strong"),
        ("EXAVITQu4vr4xnSDxMaL", "Bella - Soft female, gentle"),
        ("ErXwobaYiN019PkySvjV", "Antoni - Calm male, professional"),
        ("VR6AewLTigWG4xSOukaG", "Arnold - Deep male, authoritative"),
        ("pNInz6obpgDQGcFmaJgB", "Adam - Friendly male, casual"),
        ("yoZ06aMxZJJ28mfd3POQ", "Sam - Natural male, conversational"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SpeechConfig::default();
        assert!(config.enabled);
        assert!(config.voice_input_enabled());
        assert_eq!(config.recognition_timeout, Duration::from_secs(10));
        assert!(!config.debug_audio_enabled);
        assert!(!config.speak_errors);
        assert_eq!(config.empty_choice, EmptyChoice::Voice);
    }

    #[test]
    fn test_configure_merges_only_present_keys() {
        let shared = SharedSpeechConfig::default();
        shared
            .configure(&SpeechOptions {
                enabled: Some(false),
                recognition_timeout: Some(5.0),
                ..SpeechOptions::default()
            })
            .unwrap();

        let config = shared.snapshot();
        assert!(!config.enabled);
        assert_eq!(config.recognition_timeout, Duration::from_secs(5));
        assert!(config.listen_for_responses);
        assert_eq!(config.voice_id, DEFAULT_VOICE_ID);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let options = SpeechOptions::from_json(serde_json::json!({
            "debug_audio": true,
            "voiceInputIsDefault": false,
            "some_future_key": 42,
            "voice_settings": { "style": 0.5, "unknown": "x" }
        }))
        .unwrap();

        assert_eq!(options.debug_audio, Some(true));
        assert_eq!(options.voice_input_is_default, Some(false));

        let shared = SharedSpeechConfig::default();
        shared.configure(&options).unwrap();
        let config = shared.snapshot();
        assert!(config.debug_audio_enabled);
        assert!((config.voice_settings.style - 0.5).abs() < f32::EPSILON);
        assert!((config.voice_settings.stability - 0.75).abs() < f32::EPSILON);
    }

    #[test]
    fn test_invalid_values_rejected_atomically() {
        let shared = SharedSpeechConfig::default();
        let result = shared.configure(&SpeechOptions {
            enabled: Some(false),
            phrase_timeout: Some(0.0),
            ..SpeechOptions::default()
        });
        assert!(result.is_err());
        assert!(shared.snapshot().enabled);

        let result = shared.configure(&SpeechOptions {
            voice_settings: Some(VoiceSettingsPatch {
                stability: Some(1.5),
                ..VoiceSettingsPatch::default()
            }),
            ..SpeechOptions::default()
        });
        assert!(result.is_err());
        assert!((shared.snapshot().voice_settings.stability - 0.75).abs() < f32::EPSILON);
    }

    #[test]
    fn test_set_voice() {
        let shared = SharedSpeechConfig::default();
        shared.set_voice("pNInz6obpgDQGcFmaJgB").unwrap();
        assert_eq!(shared.snapshot().voice_id, "pNInz6obpgDQGcFmaJgB");
    }

    #[test]
    fn test_voice_input_enabled_requires_both_flags() {
        let config = SpeechConfig {
            offer_voice_input: false,
            ..SpeechConfig::default()
        };
        assert!(!config.voice_input_enabled());
    }
}
