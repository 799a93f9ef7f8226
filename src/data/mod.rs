//! Captured frame types

mod frames;

pub use frames::{Frame, FrameBuffer};
