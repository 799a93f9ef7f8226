//! Single-frame PNG output

use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

use super::{EncodeError, EncodedArtifact};
use crate::data::Frame;

pub fn encode_still(frame: Frame) -> Result<EncodedArtifact, EncodeError> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(frame.into_pixels())
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    EncodedArtifact::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::ArtifactFormat;
    use image::{Rgba, RgbaImage};
    use std::time::Duration;

    #[test]
    fn test_still_decodes_to_same_pixels() {
        let pixels = RgbaImage::from_pixel(6, 3, Rgba([12, 34, 56, 255]));
        let artifact = encode_still(Frame::new(pixels.clone(), Duration::ZERO)).unwrap();

        assert_eq!(artifact.format(), ArtifactFormat::Png);
        let decoded = image::load_from_memory(artifact.bytes()).unwrap().to_rgba8();
        assert_eq!(decoded, pixels);
    }
}
