//! Input events from the presentation layer and commands sent back to it.

use crate::models::SelectedFile;

/// A user interaction with the upload surface.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// A drag entered (or is hovering over) the drop target.
    DragEnter,
    /// The drag left the drop target.
    DragLeave,
    /// Files were dropped. Only the first is processed.
    Drop(Vec<SelectedFile>),
    /// The drop target was clicked; the picker should open.
    Click,
    /// The file picker reported a selection. Only the first is processed.
    FilesPicked(Vec<SelectedFile>),
    /// The user asked to start over ("analyze another").
    Reset,
}

impl UploadEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DragEnter => "drag-enter",
            Self::DragLeave => "drag-leave",
            Self::Drop(_) => "drop",
            Self::Click => "click",
            Self::FilesPicked(_) => "files-picked",
            Self::Reset => "reset",
        }
    }
}

/// Something the presentation layer must do to its input controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentationCommand {
    /// Open the native file picker.
    OpenPicker,
    /// Clear the picker's value so picking the same path again fires a new
    /// change notification.
    ClearPicker,
}
