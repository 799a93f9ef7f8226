//! Global hotkey chord matching

use rdev::Key;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Modifier keys a hotkey chord can require
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Shift,
    Control,
    Alt,
    /// Command on macOS, Windows key elsewhere
    Meta,
}

impl Modifier {
    pub fn from_key(key: Key) -> Option<Self> {
        match key {
            Key::ShiftLeft | Key::ShiftRight => Some(Modifier::Shift),
            Key::ControlLeft | Key::ControlRight => Some(Modifier::Control),
            Key::Alt | Key::AltGr => Some(Modifier::Alt),
            Key::MetaLeft | Key::MetaRight => Some(Modifier::Meta),
            _ => None,
        }
    }
}

/// Tracks held modifiers and reports when the configured chord is pressed.
///
/// Fires once per press of the trigger key; auto-repeat while it stays held
/// is ignored. Extra held modifiers prevent a match.
#[derive(Debug, Clone)]
pub struct HotkeyMatcher {
    trigger: Key,
    required: HashSet<Modifier>,
    /// Held modifier keys, tracked per physical key so releasing one side
    /// of a pair doesn't clear the other
    held: Vec<Key>,
    trigger_down: bool,
}

impl HotkeyMatcher {
    pub fn new(trigger: Key, modifiers: &[Modifier]) -> Self {
        Self {
            trigger,
            required: modifiers.iter().copied().collect(),
            held: Vec::new(),
            trigger_down: false,
        }
    }

    fn held_modifiers(&self) -> HashSet<Modifier> {
        self.held.iter().filter_map(|k| Modifier::from_key(*k)).collect()
    }

    /// Feed a key press; returns true when the chord fires
    pub fn on_key_press(&mut self, key: Key) -> bool {
        if Modifier::from_key(key).is_some() && key != self.trigger {
            if !self.held.contains(&key) {
                self.held.push(key);
            }
            return false;
        }

        if key != self.trigger {
            return false;
        }
        if self.trigger_down {
            return false;
        }
        self.trigger_down = true;
        self.held_modifiers() == self.required
    }

    pub fn on_key_release(&mut self, key: Key) {
        if key == self.trigger {
            self.trigger_down = false;
        }
        self.held.retain(|k| *k != key);
    }
}
