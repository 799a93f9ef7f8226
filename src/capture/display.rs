//! Display identities and the enumeration seam
//!
//! A [`DisplaySource`] reports the live set of displays in global point
//! space and opens frame grabbers for them. The set may change between
//! calls (hot-plug), so anything that starts capture re-resolves a
//! [`DisplayId`] via [`resolve`] instead of trusting a cached handle.

use image::RgbaImage;
use std::fmt;
use tracing::debug;

use super::coords::{DesktopSpace, Rect};
use super::{CaptureError, CaptureResult};

/// Opaque, process-stable identifier of a physical display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayId(pub u32);

impl fmt::Display for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A display and its frame in global point space
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayInfo {
    pub id: DisplayId,
    pub name: String,
    pub frame: Rect,
    pub scale_factor: f64,
    pub is_primary: bool,
}

/// Snapshot of every connected display plus the space used to convert
/// platform (top-left origin) coordinates into global points
#[derive(Debug, Clone)]
pub struct DesktopLayout {
    pub displays: Vec<DisplayInfo>,
    pub space: DesktopSpace,
}

impl DesktopLayout {
    pub fn is_empty(&self) -> bool {
        self.displays.is_empty()
    }

    pub fn find(&self, id: DisplayId) -> Option<&DisplayInfo> {
        self.displays.iter().find(|d| d.id == id)
    }
}

/// Display geometry as platforms usually report it: top-left origin, y down
#[derive(Debug, Clone)]
pub struct RawDisplay {
    pub id: u32,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub scale_factor: f64,
    pub is_primary: bool,
}

/// Build a layout from top-left platform geometry.
///
/// The primary display's height is the flip reference; when no display is
/// flagged primary, the one at the origin (or else the first) is used.
pub fn layout_from_top_left(raw: Vec<RawDisplay>) -> DesktopLayout {
    let reference = raw
        .iter()
        .find(|d| d.is_primary)
        .or_else(|| raw.iter().find(|d| d.x == 0 && d.y == 0))
        .or_else(|| raw.first())
        .map(|d| d.height as f64)
        .unwrap_or(0.0);
    let space = DesktopSpace::new(reference);

    let displays = raw
        .into_iter()
        .map(|d| DisplayInfo {
            id: DisplayId(d.id),
            frame: space.rect_from_top_left(d.x as f64, d.y as f64, d.width as f64, d.height as f64),
            name: d.name,
            scale_factor: d.scale_factor,
            is_primary: d.is_primary,
        })
        .collect();

    DesktopLayout { displays, space }
}

/// Source of display enumeration and raw frames
pub trait DisplaySource: Send + Sync {
    /// Enumerate the currently connected displays
    fn layout(&self) -> CaptureResult<DesktopLayout>;

    /// Open a grabber for one display.
    ///
    /// Called on the capture thread; the grabber never leaves it.
    fn open(&self, display: DisplayId) -> CaptureResult<Box<dyn FrameGrabber>>;
}

/// Produces full-display frames in pixel space (row 0 is the top)
pub trait FrameGrabber {
    fn grab(&mut self) -> CaptureResult<RgbaImage>;
}

/// Look a display up again in a fresh enumeration
pub fn resolve(source: &dyn DisplaySource, id: DisplayId) -> CaptureResult<DisplayInfo> {
    let layout = source.layout()?;
    match layout.find(id) {
        Some(found) => {
            debug!("Resolved display {} ({})", id, found.name);
            Ok(found.clone())
        }
        None => Err(CaptureError::DisplayGone(id)),
    }
}
