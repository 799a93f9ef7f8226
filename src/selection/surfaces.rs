//! Overlay surface presentation
//!
//! The selection logic only needs to put a surface over each display, ask
//! it to redraw the provisional rectangle and take it down again. How that
//! is drawn is up to the implementation.

use tracing::{debug, info};

use super::SelectionError;
use crate::capture::{DisplayInfo, Rect};

/// Identifies a presented overlay surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(pub u64);

/// Presents one overlay per display
pub trait OverlaySurfaces: Send {
    /// Raise the application so overlays appear above other windows
    fn bring_to_front(&mut self);

    /// Present an overlay covering `display`
    fn present(&mut self, display: &DisplayInfo) -> Result<SurfaceHandle, SelectionError>;

    /// Redraw with the provisional selection, or clear it with `None`
    fn redraw(&mut self, surface: SurfaceHandle, selection: Option<Rect>);

    /// Take an overlay down
    fn dismiss(&mut self, surface: SurfaceHandle);
}

/// Surfaces that exist only as log lines; used when no drawing backend is
/// available, selection still works from raw pointer input.
///
/// Nothing is put on screen, so nothing swallows the pointer either: the
/// drag that makes a selection is also delivered to whatever application
/// sits under it.
#[derive(Debug, Default)]
pub struct TracingSurfaces {
    next_handle: u64,
}

impl TracingSurfaces {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OverlaySurfaces for TracingSurfaces {
    fn bring_to_front(&mut self) {
        debug!("Overlay activation requested");
    }

    fn present(&mut self, target: &DisplayInfo) -> Result<SurfaceHandle, SelectionError> {
        self.next_handle += 1;
        info!(
            "Selection overlay {} over display {} ({}) at {:?}",
            self.next_handle, target.id, target.name, target.frame
        );
        Ok(SurfaceHandle(self.next_handle))
    }

    fn redraw(&mut self, surface: SurfaceHandle, selection: Option<Rect>) {
        debug!("Overlay {} selection: {:?}", surface.0, selection);
    }

    fn dismiss(&mut self, surface: SurfaceHandle) {
        debug!("Overlay {} dismissed", surface.0);
    }
}
