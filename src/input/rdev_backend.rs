//! rdev-based input capture backend
//! Works on Windows, macOS, and Linux (X11)

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::hotkey::HotkeyMatcher;
use super::{InputBackend, InputEvent, PointerEvent, PointerGate};
use crate::capture::Point;
use crate::config::HotkeyConfig;

/// Converts raw rdev events into session input events.
///
/// rdev reports the position only on motion, so the last known position
/// is attached to button events.
pub(crate) struct EventTranslator {
    gate: PointerGate,
    hotkey: Option<HotkeyMatcher>,
    position: Point,
    primary_down: bool,
}

impl EventTranslator {
    pub(crate) fn new(gate: PointerGate, hotkey: Option<HotkeyMatcher>) -> Self {
        Self {
            gate,
            hotkey,
            position: Point::default(),
            primary_down: false,
        }
    }

    pub(crate) fn translate(&mut self, event: rdev::EventType) -> Option<InputEvent> {
        match event {
            rdev::EventType::KeyPress(key) => {
                let fired = self.hotkey.as_mut().is_some_and(|m| m.on_key_press(key));
                fired.then_some(InputEvent::Hotkey)
            }
            rdev::EventType::KeyRelease(key) => {
                if let Some(matcher) = self.hotkey.as_mut() {
                    matcher.on_key_release(key);
                }
                None
            }
            rdev::EventType::MouseMove { x, y } => {
                self.position = Point::new(x, y);
                (self.primary_down && self.gate.is_open())
                    .then_some(InputEvent::Pointer(PointerEvent::Dragged(self.position)))
            }
            rdev::EventType::ButtonPress(rdev::Button::Left) => {
                self.primary_down = true;
                self.gate
                    .is_open()
                    .then_some(InputEvent::Pointer(PointerEvent::Pressed(self.position)))
            }
            rdev::EventType::ButtonRelease(rdev::Button::Left) => {
                self.primary_down = false;
                self.gate
                    .is_open()
                    .then_some(InputEvent::Pointer(PointerEvent::Released(self.position)))
            }
            _ => None,
        }
    }
}

/// rdev-based input capture backend
pub struct RdevBackend {
    capturing: Arc<AtomicBool>,
    gate: PointerGate,
    hotkey: Option<HotkeyMatcher>,
}

impl RdevBackend {
    /// Create a new rdev backend
    pub fn new(hotkey: &HotkeyConfig) -> Self {
        let hotkey = hotkey
            .enabled
            .then(|| HotkeyMatcher::new(hotkey.key, &hotkey.modifiers));
        Self {
            capturing: Arc::new(AtomicBool::new(false)),
            gate: PointerGate::new(),
            hotkey,
        }
    }
}

impl InputBackend for RdevBackend {
    fn start(&mut self, tx: mpsc::UnboundedSender<InputEvent>) -> Result<()> {
        if self.capturing.load(Ordering::SeqCst) {
            return Ok(()); // Already capturing
        }

        self.capturing.store(true, Ordering::SeqCst);
        let capturing = self.capturing.clone();
        let mut translator = EventTranslator::new(self.gate.clone(), self.hotkey.clone());

        thread::Builder::new()
            .name("gifcast-input".to_string())
            .spawn(move || {
                info!("rdev input capture started");

                let listening = capturing.clone();
                let callback = move |event: rdev::Event| {
                    if !listening.load(Ordering::SeqCst) {
                        return;
                    }
                    if let Some(input_event) = translator.translate(event.event_type) {
                        if let Err(e) = tx.send(input_event) {
                            debug!("Failed to send input event: {}", e);
                        }
                    }
                };

                // Run the event listener
                if let Err(e) = rdev::listen(callback) {
                    error!("rdev listen error: {:?}", e);
                }

                capturing.store(false, Ordering::SeqCst);
                info!("rdev input capture stopped");
            })?;

        Ok(())
    }

    fn pointer_gate(&self) -> PointerGate {
        self.gate.clone()
    }
}
