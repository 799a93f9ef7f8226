//! Input capture backends

mod backend;
mod hotkey;
pub(crate) mod rdev_backend;

pub use backend::*;
pub use hotkey::{HotkeyMatcher, Modifier};
