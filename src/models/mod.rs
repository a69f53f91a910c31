//! Data models for moodtrack.

mod emotion;
mod selected_file;

pub use emotion::{AnalysisResult, Emotion, ImagePayload};
pub use selected_file::SelectedFile;
