//! Display source backed by xcap
//! Works on Windows, macOS, and Linux (X11, and Wayland via the portal)

use image::RgbaImage;
use tracing::{debug, info};
use xcap::Monitor;

use super::display::{layout_from_top_left, DesktopLayout, DisplayId, DisplaySource, FrameGrabber, RawDisplay};
use super::{CaptureError, CaptureResult};

/// Enumerates monitors and grabs full-display frames through xcap
#[derive(Debug, Default)]
pub struct XcapDisplaySource;

impl XcapDisplaySource {
    pub fn new() -> Self {
        Self
    }
}

fn describe(monitor: &Monitor) -> CaptureResult<RawDisplay> {
    let err = |e: xcap::XCapError| CaptureError::Enumeration(e.to_string());
    Ok(RawDisplay {
        id: monitor.id().map_err(err)?,
        name: monitor.name().map_err(err)?,
        x: monitor.x().map_err(err)?,
        y: monitor.y().map_err(err)?,
        width: monitor.width().map_err(err)?,
        height: monitor.height().map_err(err)?,
        scale_factor: monitor.scale_factor().map_err(err)? as f64,
        is_primary: monitor.is_primary().map_err(err)?,
    })
}

fn all_monitors() -> CaptureResult<Vec<Monitor>> {
    Monitor::all().map_err(|e| CaptureError::Enumeration(e.to_string()))
}

impl DisplaySource for XcapDisplaySource {
    fn layout(&self) -> CaptureResult<DesktopLayout> {
        let monitors = all_monitors()?;
        let mut raw = Vec::with_capacity(monitors.len());
        for monitor in &monitors {
            raw.push(describe(monitor)?);
        }
        debug!("Enumerated {} display(s)", raw.len());
        Ok(layout_from_top_left(raw))
    }

    fn open(&self, id: DisplayId) -> CaptureResult<Box<dyn FrameGrabber>> {
        for monitor in all_monitors()? {
            if monitor.id().ok() == Some(id.0) {
                let name = monitor.name().unwrap_or_default();
                info!("Opened capture on display {} ({})", id, name);
                return Ok(Box::new(XcapGrabber { monitor }));
            }
        }
        Err(CaptureError::DisplayGone(id))
    }
}

struct XcapGrabber {
    monitor: Monitor,
}

impl FrameGrabber for XcapGrabber {
    fn grab(&mut self) -> CaptureResult<RgbaImage> {
        self.monitor
            .capture_image()
            .map_err(|e| CaptureError::Grab(e.to_string()))
    }
}
