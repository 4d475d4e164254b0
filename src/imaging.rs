//! Frame encoding for camera captures.
//!
//! The shell hands back a raw RGBA frame read off the stream; encoding
//! it to the JPEG the backend expects happens here, at the same quality
//! the old canvas pipeline used.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capabilities::RawFrame;
use crate::{AppError, ErrorKind};

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum ImagingError {
    #[error("invalid frame: {reason}")]
    InvalidFrame { reason: String },

    #[error("failed to encode capture: {reason}")]
    EncodeFailed { reason: String },
}

impl From<ImagingError> for AppError {
    fn from(e: ImagingError) -> Self {
        AppError::new(ErrorKind::ImageInvalid, "Capture Failed").with_detail(e.to_string())
    }
}

/// Encodes a captured frame as JPEG at the given quality (0..=100).
pub fn encode_capture_jpeg(frame: &RawFrame, quality: u8) -> Result<Vec<u8>, ImagingError> {
    frame.validate().map_err(|e| ImagingError::InvalidFrame {
        reason: e.to_string(),
    })?;

    let rgba = image::RgbaImage::from_raw(frame.width, frame.height, frame.rgba.clone()).ok_or(
        ImagingError::InvalidFrame {
            reason: "buffer does not match dimensions".to_string(),
        },
    )?;

    // JPEG has no alpha channel.
    let rgb = image::DynamicImage::ImageRgba8(rgba).to_rgb8();

    let mut out = Vec::new();
    let mut encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality.min(100));
    encoder
        .encode_image(&rgb)
        .map_err(|e| ImagingError::EncodeFailed {
            reason: e.to_string(),
        })?;

    if out.is_empty() {
        return Err(ImagingError::EncodeFailed {
            reason: "encoder produced no bytes".to_string(),
        });
    }

    Ok(out)
}

/// Sniffs the image format from magic bytes and reports its canonical
/// MIME type. Only the formats the upload zone advertises are mapped.
#[must_use]
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        image::ImageFormat::Jpeg => Some("image/jpeg"),
        image::ImageFormat::Png => Some("image/png"),
        image::ImageFormat::WebP => Some("image/webp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32) -> RawFrame {
        RawFrame {
            width,
            height,
            rgba: vec![0x7F; (width * height * 4) as usize],
        }
    }

    #[test]
    fn encodes_a_valid_frame_to_jpeg() {
        let jpeg = encode_capture_jpeg(&solid_frame(16, 16), 90).unwrap();
        assert!(!jpeg.is_empty());
        assert_eq!(&jpeg[..3], &[0xFF, 0xD8, 0xFF]);
        assert_eq!(sniff_mime(&jpeg), Some("image/jpeg"));
    }

    #[test]
    fn rejects_mismatched_buffer() {
        let frame = RawFrame {
            width: 16,
            height: 16,
            rgba: vec![0; 16],
        };
        assert!(matches!(
            encode_capture_jpeg(&frame, 90),
            Err(ImagingError::InvalidFrame { .. })
        ));
    }

    #[test]
    fn quality_is_clamped() {
        // 255 would panic inside the encoder if passed through unclamped.
        assert!(encode_capture_jpeg(&solid_frame(4, 4), 255).is_ok());
    }

    #[test]
    fn sniffs_known_formats() {
        let png_header = [
            0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D,
        ];
        assert_eq!(sniff_mime(&png_header), Some("image/png"));

        let jpeg_header = [
            0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x01,
        ];
        assert_eq!(sniff_mime(&jpeg_header), Some("image/jpeg"));

        assert_eq!(sniff_mime(&[0u8; 16]), None);
    }
}
