//! Emotion analysis result models.

use serde::{Deserialize, Serialize};

/// A named emotion detected in a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emotion {
    /// Emotion label (e.g. "Serene").
    pub name: String,
    /// Confidence in the range 0 to 100. The three emotions of a result
    /// are not required to sum to 100.
    pub percentage: f64,
    /// Display glyph.
    pub emoji: String,
    /// Long-form description of the mood.
    pub description: String,
}

impl Emotion {
    /// Check that the percentage is a finite value within 0..=100.
    pub fn has_valid_percentage(&self) -> bool {
        self.percentage.is_finite() && (0.0..=100.0).contains(&self.percentage)
    }
}

/// Visualization returned alongside the emotions.
///
/// The service may deliver the image as text (base64 or a data URL) or as
/// raw bytes. Turning it into something displayable is left to the
/// presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImagePayload {
    Text(String),
    Binary(Vec<u8>),
}

impl ImagePayload {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::Binary(b) => b.is_empty(),
        }
    }
}

/// Result of analyzing a single track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub image: ImagePayload,
    #[serde(rename = "emotion1")]
    pub primary_emotion: Emotion,
    #[serde(
        rename = "emotion2",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub secondary_emotion: Option<Emotion>,
    #[serde(
        rename = "emotion3",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub tertiary_emotion: Option<Emotion>,
}

impl AnalysisResult {
    /// Emotions present in this result, primary first.
    pub fn emotions(&self) -> impl Iterator<Item = &Emotion> {
        std::iter::once(&self.primary_emotion)
            .chain(self.secondary_emotion.as_ref())
            .chain(self.tertiary_emotion.as_ref())
    }

    /// Reject results that deserialized but carry values we can't display.
    pub fn validate(&self) -> Result<(), String> {
        for emotion in self.emotions() {
            if emotion.name.trim().is_empty() {
                return Err("emotion with empty name".to_string());
            }
            if !emotion.has_valid_percentage() {
                return Err(format!(
                    "emotion '{}' has percentage {} outside 0-100",
                    emotion.name, emotion.percentage
                ));
            }
        }
        Ok(())
    }
}
