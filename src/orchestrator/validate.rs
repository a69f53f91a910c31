//! Local file checks performed before anything reaches the network.

use thiserror::Error;

use crate::models::SelectedFile;

/// Message shown when a file is rejected.
pub const INVALID_FILE_MESSAGE: &str = "Please upload an MP3 file";

/// The selected file is not something the service can analyze.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Please upload an MP3 file")]
pub struct ValidationError {
    pub file_name: String,
    pub mime_type: Option<String>,
}

/// Accept files declared as `audio/*`, or named `*.mp3`.
///
/// Matching is case-sensitive: `Song.MP3` with no MIME hint is rejected.
pub fn validate(file: &SelectedFile) -> Result<(), ValidationError> {
    let audio_mime = file.mime_type().is_some_and(|m| m.starts_with("audio/"));
    if audio_mime || file.name().ends_with(".mp3") {
        Ok(())
    } else {
        Err(ValidationError {
            file_name: file.name().to_string(),
            mime_type: file.mime_type().map(str::to_string),
        })
    }
}
