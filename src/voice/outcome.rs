//! Tagged results of recognition and synthesis

use std::fmt;

/// Result of one capture-and-recognize attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionOutcome {
    /// Non-empty trimmed transcript
    Text(String),
    /// The service returned an empty transcript
    Empty,
    /// Speech was captured but not understood
    Unintelligible,
    /// Capture or recognition service failure
    ServiceError(String),
    /// No speech started before the recognition timeout
    Timeout,
}

impl RecognitionOutcome {
    /// Map a raw transcript: whitespace-only becomes `Empty`
    #[must_use]
    pub fn from_transcript(transcript: &str) -> Self {
        let trimmed = transcript.trim();
        if trimmed.is_empty() {
            Self::Empty
        } else {
            Self::Text(trimmed.to_string())
        }
    }

    /// Transcript text, if recognition succeeded
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Plain-language explanation of a failed attempt
    #[must_use]
    pub const fn failure_hint(&self) -> &'static str {
        match self {
            Self::Text(_) => "",
            Self::Empty => "I didn't hear any words",
            Self::Unintelligible => "I couldn't understand that",
            Self::ServiceError(_) => "Speech recognition is having trouble right now",
            Self::Timeout => "I didn't hear anything",
        }
    }
}

/// Result of one announcement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisOutcome {
    /// Audio was synthesized and played to completion
    Played,
    /// Nothing was attempted
    Skipped(String),
    /// Synthesis or playback failed
    Failed(String),
}

impl SynthesisOutcome {
    #[must_use]
    pub const fn is_played(&self) -> bool {
        matches!(self, Self::Played)
    }
}

impl fmt::Display for SynthesisOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Played => write!(f, "played"),
            Self::Skipped(reason) => write!(f, "skipped ({reason})"),
            Self::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transcript() {
        assert_eq!(
            RecognitionOutcome::from_transcript("  go home \n"),
            RecognitionOutcome::Text("go home".to_string())
        );
        assert_eq!(
            RecognitionOutcome::from_transcript(" \t "),
            RecognitionOutcome::Empty
        );
    }

    #[test]
    fn test_text_accessor() {
        assert_eq!(RecognitionOutcome::Text("ok".into()).text(), Some("ok"));
        assert_eq!(RecognitionOutcome::Timeout.text(), None);
    }
}
