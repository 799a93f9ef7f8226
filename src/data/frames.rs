//! Frames and the buffer that accumulates them during a recording

use image::RgbaImage;
use std::time::Duration;

/// An immutable cropped frame
#[derive(Debug, Clone)]
pub struct Frame {
    pixels: RgbaImage,
    /// Monotonic time since the capture stream started
    timestamp: Duration,
}

impl Frame {
    pub fn new(pixels: RgbaImage, timestamp: Duration) -> Self {
        Self { pixels, timestamp }
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_pixels(self) -> RgbaImage {
        self.pixels
    }

    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Buffer for frames awaiting encoding
///
/// Order of insertion is capture order. The buffer has one writer at a
/// time: the capture thread while recording, then the session once the
/// stream hands it back.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    frames: Vec<Frame>,
}

impl FrameBuffer {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            frames: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Take every frame out, leaving the buffer empty
    pub fn drain(&mut self) -> Vec<Frame> {
        std::mem::take(&mut self.frames)
    }

    /// Time between the first and last frame
    pub fn span(&self) -> Duration {
        match (self.frames.first(), self.frames.last()) {
            (Some(first), Some(last)) => last.timestamp.saturating_sub(first.timestamp),
            _ => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(ms: u64) -> Frame {
        Frame::new(RgbaImage::new(4, 3), Duration::from_millis(ms))
    }

    #[test]
    fn test_drain_empties_buffer_in_order() {
        let mut buffer = FrameBuffer::new();
        buffer.push(frame(0));
        buffer.push(frame(66));
        buffer.push(frame(133));

        assert_eq!(buffer.span(), Duration::from_millis(133));

        let frames = buffer.drain();
        let stamps: Vec<u64> = frames.iter().map(|f| f.timestamp().as_millis() as u64).collect();
        assert_eq!(stamps, vec![0, 66, 133]);
        assert!(buffer.is_empty());
        assert_eq!(buffer.span(), Duration::ZERO);
    }

    #[test]
    fn test_preallocated_buffer_starts_empty() {
        let mut buffer = FrameBuffer::with_capacity(8);
        assert!(buffer.is_empty());

        buffer.push(frame(1));
        assert_eq!(buffer.len(), 1);
        let frames = buffer.drain();
        assert_eq!((frames[0].width(), frames[0].height()), (4, 3));
    }
}
