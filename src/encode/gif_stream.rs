//! Streaming GIF encoder
//!
//! Frames are quantized and written one at a time, so a recording never
//! has to hold both its raw frames and the whole palette-indexed output.

use image::codecs::gif::{GifEncoder, Repeat};
use image::imageops::{self, FilterType};
use image::Delay;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

use super::{EncodeError, EncodedArtifact};
use crate::data::Frame;

/// NeuQuant sampling factor, 1 (best) to 30 (fastest)
const QUANTIZE_SPEED: i32 = 10;

/// Rough per-frame size used to pre-size the output buffer
const BYTES_PER_FRAME_HINT: usize = 16 * 1024;

/// GIF delays are stored in hundredths of a second. Rounds to the nearest
/// unit, never below 1.
pub fn delay_centiseconds(delay: Duration) -> u16 {
    let cs = (delay.as_secs_f64() * 100.0).round();
    cs.clamp(1.0, u16::MAX as f64) as u16
}

/// Output buffer shared with the encoder, which has no way to give its
/// writer back.
#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn reserve(&self, additional: usize) {
        if let Ok(mut bytes) = self.0.lock() {
            bytes.reserve(additional);
        }
    }

    fn take(&self) -> Vec<u8> {
        self.0
            .lock()
            .map(|mut bytes| std::mem::take(&mut *bytes))
            .unwrap_or_default()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut bytes = self
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "gif output buffer poisoned"))?;
        bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

enum Phase {
    Idle,
    Open {
        encoder: GifEncoder<SharedBuffer>,
        /// Canvas size, fixed by the first frame
        size: Option<(u32, u32)>,
    },
    Finished,
}

/// Encodes frames into an animated GIF as they arrive
///
/// `begin` → `add_frame`* → `finalize`. Every frame gets the same delay.
/// Frames whose size differs from the first are scaled to match it.
pub struct GifStreamEncoder {
    delay: Delay,
    repeat: Repeat,
    buffer: SharedBuffer,
    phase: Phase,
    frames_written: usize,
}

impl GifStreamEncoder {
    pub fn new(frame_delay: Duration, loop_count: u16) -> Self {
        let cs = delay_centiseconds(frame_delay);
        let repeat = match loop_count {
            0 => Repeat::Infinite,
            n => Repeat::Finite(n),
        };
        Self {
            delay: Delay::from_numer_denom_ms(u32::from(cs) * 10, 1),
            repeat,
            buffer: SharedBuffer::default(),
            phase: Phase::Idle,
            frames_written: 0,
        }
    }

    /// Open the output. `expected_frames` only sizes the buffer. Calling it
    /// again on an open encoder does nothing.
    pub fn begin(&mut self, expected_frames: usize) -> Result<(), EncodeError> {
        match self.phase {
            Phase::Finished => Err(EncodeError::AlreadyFinalized),
            Phase::Open { .. } => Ok(()),
            Phase::Idle => {
                self.buffer
                    .reserve(expected_frames.saturating_mul(BYTES_PER_FRAME_HINT));
                let mut encoder = GifEncoder::new_with_speed(self.buffer.clone(), QUANTIZE_SPEED);
                encoder.set_repeat(self.repeat)?;
                self.phase = Phase::Open {
                    encoder,
                    size: None,
                };
                debug!("GIF encoder opened for ~{} frames", expected_frames);
                Ok(())
            }
        }
    }

    /// Quantize and write one frame
    pub fn add_frame(&mut self, frame: Frame) -> Result<(), EncodeError> {
        if matches!(self.phase, Phase::Idle) {
            self.begin(1)?;
        }
        let Phase::Open { encoder, size } = &mut self.phase else {
            return Err(EncodeError::AlreadyFinalized);
        };

        let mut pixels = frame.into_pixels();
        let dims = pixels.dimensions();
        match *size {
            None => *size = Some(dims),
            Some((width, height)) if (width, height) != dims => {
                debug!(
                    "Scaling {}x{} frame to {}x{}",
                    dims.0, dims.1, width, height
                );
                pixels = imageops::resize(&pixels, width, height, FilterType::Triangle);
            }
            Some(_) => {}
        }

        encoder.encode_frame(image::Frame::from_parts(pixels, 0, 0, self.delay))?;
        self.frames_written += 1;
        Ok(())
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    /// Write the trailer and return the finished GIF. The encoder cannot be
    /// used afterwards.
    pub fn finalize(&mut self) -> Result<EncodedArtifact, EncodeError> {
        match std::mem::replace(&mut self.phase, Phase::Finished) {
            Phase::Finished => Err(EncodeError::AlreadyFinalized),
            Phase::Idle => Err(EncodeError::NoFrames),
            Phase::Open { encoder, .. } => {
                // The trailer is written when the encoder drops.
                drop(encoder);
                if self.frames_written == 0 {
                    return Err(EncodeError::NoFrames);
                }
                EncodedArtifact::from_bytes(self.buffer.take())
            }
        }
    }
}
