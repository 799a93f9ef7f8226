//! Encoding captured frames into a shareable artifact
//!
//! Multiple frames become a looping GIF; a lone frame can be written as a
//! PNG still instead. The artifact's format is read back from its leading
//! bytes so callers never have to track it separately.

mod gif_stream;
mod still;

pub use gif_stream::{delay_centiseconds, GifStreamEncoder};
pub use still::encode_still;

use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::data::Frame;

/// Errors raised while encoding frames
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("no frames captured")]
    NoFrames,

    #[error("encoder already finalized")]
    AlreadyFinalized,

    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("encoded bytes are not a known image format")]
    UnknownFormat,
}

/// Image container of an encoded artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    Gif,
    Png,
}

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

impl ArtifactFormat {
    /// Identify the container from its magic bytes
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(ArtifactFormat::Gif)
        } else if bytes.starts_with(&PNG_SIGNATURE) {
            Some(ArtifactFormat::Png)
        } else {
            None
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ArtifactFormat::Gif => "gif",
            ArtifactFormat::Png => "png",
        }
    }
}

/// Bytes of a finished recording
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedArtifact {
    bytes: Vec<u8>,
    format: ArtifactFormat,
}

impl EncodedArtifact {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, EncodeError> {
        let format = ArtifactFormat::sniff(&bytes).ok_or(EncodeError::UnknownFormat)?;
        Ok(Self { bytes, format })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> ArtifactFormat {
        self.format
    }

    pub fn extension(&self) -> &'static str {
        self.format.extension()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }
}

/// Encoder settings fixed for the lifetime of one encode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeSettings {
    /// Delay between consecutive frames
    pub frame_delay: Duration,
    /// 0 loops forever, otherwise the number of repetitions
    pub loop_count: u16,
    /// Write a single captured frame as a PNG still
    pub still_for_single_frame: bool,
}

impl EncodeSettings {
    pub fn from_fps(fps: u32, loop_count: u16, still_for_single_frame: bool) -> Self {
        Self {
            frame_delay: Duration::from_secs_f64(1.0 / fps.max(1) as f64),
            loop_count,
            still_for_single_frame,
        }
    }
}

/// Encode a finished recording, consuming its frames
pub fn encode_frames(frames: Vec<Frame>, settings: &EncodeSettings) -> Result<EncodedArtifact, EncodeError> {
    if frames.is_empty() {
        return Err(EncodeError::NoFrames);
    }

    if frames.len() == 1 && settings.still_for_single_frame {
        info!("Single frame captured, writing a still image");
        let mut frames = frames;
        return match frames.pop() {
            Some(frame) => encode_still(frame),
            None => Err(EncodeError::NoFrames),
        };
    }

    let mut encoder = GifStreamEncoder::new(settings.frame_delay, settings.loop_count);
    encoder.begin(frames.len())?;
    for frame in frames {
        encoder.add_frame(frame)?;
    }
    let written = encoder.frames_written();
    let artifact = encoder.finalize()?;
    info!("Encoded {} frames into a {} byte GIF", written, artifact.len());
    Ok(artifact)
}
