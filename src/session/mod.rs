//! Recording session - sequences selection, capture, encoding and output

mod deadline;
mod engine;
mod pipeline;

pub use engine::{create_session_channels, RecordingSession, SessionEngine, SessionSettings};

use std::path::PathBuf;
use thiserror::Error;

use crate::encode::EncodeError;
use crate::output::PersistError;
use crate::selection::SelectionError;

/// Commands that can be sent to the session engine
#[derive(Debug, Clone)]
pub enum SessionCommand {
    /// Start selecting, cancel a selection, or stop a recording, depending
    /// on the current state
    Toggle,
    /// Tear everything down and stop the engine
    Shutdown,
}

/// Observable state of the session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    /// Overlays are up, waiting for a drag
    Selecting,
    Recording,
    /// Frames are being encoded and saved; toggles are ignored
    Encoding,
    /// Last recording was saved at this location
    Completed(Option<PathBuf>),
    /// Last attempt failed for this reason
    Failed(String),
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Selecting => "selecting",
            SessionState::Recording => "recording",
            SessionState::Encoding => "encoding",
            SessionState::Completed(_) => "completed",
            SessionState::Failed(_) => "failed",
        }
    }
}

/// Why a recording attempt ended in `Failed`
///
/// The `Display` text is what the failed state carries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("no displays available")]
    NoDisplays,

    #[error("failed to enumerate displays: {0}")]
    DisplayEnumerationFailed(String),

    #[error("failed to show selection overlay: {0}")]
    SelectionFailed(String),

    /// A drag below the minimum size; reported as a cancellation
    #[error("selection too small")]
    SelectionTooSmall,

    #[error("selected display is no longer available: {0}")]
    DisplayResolutionFailed(String),

    #[error("capture failed to start: {0}")]
    CaptureStartFailed(String),

    #[error("capture did not stop cleanly: {0}")]
    CaptureFailed(String),

    #[error("no frames captured")]
    EmptyFrameBuffer,

    #[error("encoding failed: {0}")]
    EncodeFailed(String),

    #[error("saving failed: {0}")]
    PersistFailed(String),
}

impl From<SelectionError> for SessionError {
    fn from(e: SelectionError) -> Self {
        match e {
            SelectionError::NoDisplays => SessionError::NoDisplays,
            other => SessionError::SelectionFailed(other.to_string()),
        }
    }
}

impl From<EncodeError> for SessionError {
    fn from(e: EncodeError) -> Self {
        match e {
            EncodeError::NoFrames => SessionError::EmptyFrameBuffer,
            other => SessionError::EncodeFailed(other.to_string()),
        }
    }
}

impl From<PersistError> for SessionError {
    fn from(e: PersistError) -> Self {
        SessionError::PersistFailed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_buffer_reason_text() {
        assert_eq!(SessionError::EmptyFrameBuffer.to_string(), "no frames captured");
        assert_eq!(
            SessionError::from(EncodeError::NoFrames),
            SessionError::EmptyFrameBuffer
        );
    }

    #[test]
    fn test_selection_errors_map_to_taxonomy() {
        assert_eq!(
            SessionError::from(SelectionError::NoDisplays),
            SessionError::NoDisplays
        );
        let e = SessionError::from(SelectionError::SurfaceFailed {
            display: "Side".to_string(),
            reason: "refused".to_string(),
        });
        assert!(matches!(e, SessionError::SelectionFailed(_)));
    }
}
