//! Screen capture module
//!
//! Display enumeration, coordinate mapping from selected regions to frame
//! pixels, and the timed capture stream that feeds cropped frames into a
//! sink.

pub mod coords;
mod display;
mod stream;
mod xcap_backend;

pub use coords::{crop_rect_in_pixels, DesktopSpace, PixelRect, Point, Rect};
pub use display::{
    layout_from_top_left, resolve, DesktopLayout, DisplayId, DisplayInfo, DisplaySource,
    FrameGrabber, RawDisplay,
};
pub use stream::{CaptureStream, FrameSink, StreamConfig, StreamStats};
pub use xcap_backend::XcapDisplaySource;

use thiserror::Error;

/// Errors raised while enumerating displays or capturing frames
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to enumerate displays: {0}")]
    Enumeration(String),

    #[error("display {0} is no longer connected")]
    DisplayGone(DisplayId),

    #[error("capture stream failed to start: {0}")]
    StartFailed(String),

    #[error("frame grab failed: {0}")]
    Grab(String),

    #[error("capture thread exited before handing back its frames")]
    WorkerLost,
}

pub type CaptureResult<T> = Result<T, CaptureError>;
