//! Region selection across every connected display
//!
//! [`OverlayManager`] puts one overlay surface over each display and turns
//! a press-drag-release of the primary button into a committed region.
//! The display under the press becomes the active surface; the rest of the
//! gesture is pinned to it even if the pointer wanders onto another
//! display.

mod surfaces;

pub use surfaces::{OverlaySurfaces, SurfaceHandle, TracingSurfaces};

use thiserror::Error;
use tracing::{debug, info};

use crate::capture::{DesktopLayout, DesktopSpace, DisplayInfo, Point, Rect};
use crate::input::{PointerEvent, PointerGate};

/// Errors raised while activating selection overlays
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("no displays available for selection")]
    NoDisplays,

    #[error("failed to present overlay on display {display}: {reason}")]
    SurfaceFailed { display: String, reason: String },
}

/// A finished selection
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedSelection {
    /// Region in global points, positive width and height
    pub region: Rect,
    /// Display the region was drawn on, as it was at commit time
    pub display: DisplayInfo,
}

/// How a selection gesture ended
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome {
    Committed(CommittedSelection),
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayPhase {
    Inactive,
    /// Overlays up, waiting for a press
    Armed,
    Dragging,
}

struct ActiveSurface {
    handle: SurfaceHandle,
    display: DisplayInfo,
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    /// Index into `surfaces` of the surface that received the press
    surface: usize,
    anchor: Point,
    current: Point,
}

/// Owns the overlays and the selection gesture
pub struct OverlayManager {
    backend: Box<dyn OverlaySurfaces>,
    gate: PointerGate,
    /// Selections narrower and shorter than this (in points) cancel
    min_size: f64,
    surfaces: Vec<ActiveSurface>,
    space: Option<DesktopSpace>,
    phase: OverlayPhase,
    drag: Option<Drag>,
}

impl OverlayManager {
    pub fn new(backend: Box<dyn OverlaySurfaces>, gate: PointerGate, min_size: f64) -> Self {
        Self {
            backend,
            gate,
            min_size,
            surfaces: Vec::new(),
            space: None,
            phase: OverlayPhase::Inactive,
            drag: None,
        }
    }

    pub fn phase(&self) -> OverlayPhase {
        self.phase
    }

    /// Rectangle spanned by the drag so far, in global points
    #[cfg(test)]
    fn provisional_region(&self) -> Option<Rect> {
        self.drag.map(|d| Rect::from_corners(d.anchor, d.current))
    }

    /// Display that received the press, while dragging
    #[cfg(test)]
    fn active_display(&self) -> Option<&DisplayInfo> {
        self.drag.map(|d| &self.surfaces[d.surface].display)
    }

    /// Present one overlay per display and start listening for the pointer.
    ///
    /// Overlays already up are replaced.
    pub fn activate(&mut self, layout: DesktopLayout) -> Result<(), SelectionError> {
        self.deactivate();

        if layout.is_empty() {
            return Err(SelectionError::NoDisplays);
        }

        self.backend.bring_to_front();
        for display in layout.displays {
            match self.backend.present(&display) {
                Ok(handle) => self.surfaces.push(ActiveSurface { handle, display }),
                Err(e) => {
                    self.deactivate();
                    return Err(e);
                }
            }
        }

        self.space = Some(layout.space);
        self.phase = OverlayPhase::Armed;
        self.gate.open();
        info!("Selection overlays active on {} display(s)", self.surfaces.len());
        Ok(())
    }

    /// Tear down every overlay and stop listening. Safe to call repeatedly.
    pub fn deactivate(&mut self) {
        self.gate.close();
        if self.phase == OverlayPhase::Inactive && self.surfaces.is_empty() {
            return;
        }
        for surface in self.surfaces.drain(..) {
            self.backend.dismiss(surface.handle);
        }
        self.space = None;
        self.drag = None;
        self.phase = OverlayPhase::Inactive;
        debug!("Selection overlays removed");
    }

    /// Feed a pointer event in platform coordinates. Returns the outcome
    /// once the gesture completes; the overlays are torn down by then.
    pub fn handle_pointer(&mut self, event: PointerEvent) -> Option<SelectionOutcome> {
        let space = self.space?;

        match (self.phase, event) {
            (OverlayPhase::Armed, PointerEvent::Pressed(p)) => {
                let point = space.point_from_top_left(p.x, p.y);
                let Some(index) = self.surfaces.iter().position(|s| s.display.frame.contains(point)) else {
                    debug!("Press at {:?} is outside every display", point);
                    return None;
                };
                self.drag = Some(Drag {
                    surface: index,
                    anchor: point,
                    current: point,
                });
                self.phase = OverlayPhase::Dragging;
                self.redraw_active();
                None
            }
            (OverlayPhase::Dragging, PointerEvent::Dragged(p)) => {
                if let Some(drag) = self.drag.as_mut() {
                    drag.current = space.point_from_top_left(p.x, p.y);
                }
                self.redraw_active();
                None
            }
            (OverlayPhase::Dragging, PointerEvent::Released(p)) => {
                let mut drag = self.drag?;
                drag.current = space.point_from_top_left(p.x, p.y);
                let region = Rect::from_corners(drag.anchor, drag.current);
                let target = self.surfaces[drag.surface].display.clone();

                let too_small = region.width < self.min_size && region.height < self.min_size;
                let outcome = if too_small || region.is_degenerate() {
                    info!("Selection cancelled ({:.1}x{:.1} points)", region.width, region.height);
                    SelectionOutcome::Cancelled
                } else {
                    info!(
                        "Selection committed on display {}: {:.1}x{:.1} at ({:.1}, {:.1})",
                        target.id, region.width, region.height, region.x, region.y
                    );
                    SelectionOutcome::Committed(CommittedSelection {
                        region,
                        display: target,
                    })
                };

                self.deactivate();
                Some(outcome)
            }
            // Releases without a press and presses mid-drag are ignored
            _ => None,
        }
    }

    fn redraw_active(&mut self) {
        if let Some(drag) = self.drag {
            let handle = self.surfaces[drag.surface].handle;
            self.backend
                .redraw(handle, Some(Rect::from_corners(drag.anchor, drag.current)));
        }
    }
}

impl Drop for OverlayManager {
    fn drop(&mut self) {
        self.deactivate();
    }
}
