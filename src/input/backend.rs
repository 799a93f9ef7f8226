//! Input capture backend trait and shared event types

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::capture::Point;
use crate::config::HotkeyConfig;

/// Primary-button pointer activity, in platform coordinates (top-left
/// origin, y down)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Pressed(Point),
    Dragged(Point),
    Released(Point),
}

/// Events delivered to the session
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Pointer(PointerEvent),
    /// The start/stop chord was pressed
    Hotkey,
}

/// Switch that decides whether pointer activity is forwarded at all.
///
/// Opened while selection overlays are up, closed otherwise, so the
/// listener never reports clicks the session has no use for.
#[derive(Debug, Clone, Default)]
pub struct PointerGate(Arc<AtomicBool>);

impl PointerGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn close(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_open(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Trait for input capture backends
pub trait InputBackend: Send {
    /// Start capturing input events
    /// Events are sent to the provided channel
    fn start(&mut self, tx: mpsc::UnboundedSender<InputEvent>) -> Result<()>;

    /// Gate controlling pointer forwarding for this backend
    fn pointer_gate(&self) -> PointerGate;
}

/// Create the input backend for the current platform
pub fn create_input_backend(hotkey: &HotkeyConfig) -> Box<dyn InputBackend> {
    #[cfg(target_os = "linux")]
    {
        if std::env::var("XDG_SESSION_TYPE").map(|s| s == "wayland").unwrap_or(false) {
            tracing::warn!("Wayland session detected: global pointer and hotkey capture may not work");
        }
    }

    tracing::info!("Using rdev backend for input capture");
    Box::new(super::rdev_backend::RdevBackend::new(hotkey))
}
