//! A file chosen by the user for analysis.

use std::fmt;
use std::path::Path;

/// A user-chosen file, as handed over by a drop or a file picker.
///
/// The file is moved into a submission and dropped once the analysis
/// resolves or is abandoned.
#[derive(Clone, PartialEq, Eq)]
pub struct SelectedFile {
    name: String,
    mime_type: Option<String>,
    content: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, mime_type: Option<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.filter(|m| !m.is_empty()),
            content,
        }
    }

    /// Read a file from disk, guessing its MIME type from the extension.
    ///
    /// Unknown extensions yield no MIME hint, like a browser reporting an
    /// empty type.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let content = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = mime_guess::from_path(path)
            .first()
            .map(|m| m.essence_str().to_string());
        Ok(Self::new(name, mime_type, content))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Consume the file, returning its raw bytes.
    pub fn into_content(self) -> Vec<u8> {
        self.content
    }
}

// Content is elided; audio files are large.
impl fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.content.len())
            .finish()
    }
}
