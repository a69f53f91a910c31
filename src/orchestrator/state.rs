//! Upload states and the flattened view handed to the presentation layer.

use crate::models::AnalysisResult;

/// Where the upload flow currently is. Exactly one at a time.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum OrchestratorState {
    /// Nothing in progress.
    #[default]
    Idle,
    /// A drag is hovering over the drop target.
    Dragging,
    /// A request is in flight.
    Submitting,
    /// The last attempt failed with a user-visible message.
    Errored(String),
    /// A result is being shown.
    Displaying(AnalysisResult),
}

impl OrchestratorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Dragging => "dragging",
            Self::Submitting => "submitting",
            Self::Errored(_) => "errored",
            Self::Displaying(_) => "displaying",
        }
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self, Self::Submitting)
    }

    /// Whether a new file may be dropped or picked right now.
    pub fn accepts_files(&self) -> bool {
        matches!(self, Self::Idle | Self::Dragging | Self::Errored(_))
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Errored(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            Self::Displaying(result) => Some(result),
            _ => None,
        }
    }

    /// Flatten into the boolean/optional view most renderers want.
    pub fn view(&self) -> UploadView<'_> {
        UploadView {
            is_dragging: matches!(self, Self::Dragging),
            is_loading: self.is_submitting(),
            error: self.error(),
            result: self.result(),
        }
    }
}

/// Flattened state for rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadView<'a> {
    pub is_dragging: bool,
    pub is_loading: bool,
    pub error: Option<&'a str>,
    pub result: Option<&'a AnalysisResult>,
}
