//! File acquisition: validation and staging of the image that will be
//! submitted for prediction.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::imaging::sniff_mime;
use crate::{format_file_size, AppError, ErrorKind, CAMERA_CAPTURE_FILENAME};

/// MIME types the upload zone accepts, after [`normalize_mime`].
pub const ALLOWED_IMAGE_MIMES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum StagingError {
    #[error("file is empty")]
    EmptyFile,

    #[error("file size {size} bytes exceeds maximum of {max} bytes")]
    TooLarge { size: usize, max: usize },

    #[error("file type '{mime}' is not a supported image type")]
    UnsupportedType { mime: String },

    #[error("file content does not look like a supported image")]
    Unrecognized,

    #[error("file claims to be '{declared}' but its content is '{detected}'")]
    FormatMismatch { declared: String, detected: String },
}

impl From<StagingError> for AppError {
    fn from(e: StagingError) -> Self {
        match e {
            StagingError::TooLarge { max, .. } => {
                AppError::new(ErrorKind::ImageTooLarge, "File Too Large").with_detail(format!(
                    "Please select an image smaller than {}.",
                    format_file_size(max)
                ))
            }
            StagingError::UnsupportedType { .. }
            | StagingError::Unrecognized
            | StagingError::FormatMismatch { .. }
            | StagingError::EmptyFile => AppError::new(ErrorKind::ImageInvalid, "Invalid File")
                .with_detail("Please select a valid image file."),
        }
    }
}

/// Lowercases and folds the `image/jpg` alias browsers still emit.
#[must_use]
pub fn normalize_mime(mime: &str) -> String {
    let lower = mime.trim().to_lowercase();
    if lower == "image/jpg" {
        "image/jpeg".to_string()
    } else {
        lower
    }
}

/// Validates a picked or dropped file against the type allow-list, the
/// size ceiling, and its own magic bytes. Returns the canonical MIME
/// type to use from here on.
pub fn validate_file(mime: &str, bytes: &[u8], max_bytes: usize) -> Result<String, StagingError> {
    if bytes.is_empty() {
        return Err(StagingError::EmptyFile);
    }
    if bytes.len() > max_bytes {
        return Err(StagingError::TooLarge {
            size: bytes.len(),
            max: max_bytes,
        });
    }

    let declared = normalize_mime(mime);
    if !ALLOWED_IMAGE_MIMES.contains(&declared.as_str()) {
        return Err(StagingError::UnsupportedType { mime: declared });
    }

    match sniff_mime(bytes) {
        Some(detected) if detected == declared => Ok(declared),
        Some(detected) => Err(StagingError::FormatMismatch {
            declared,
            detected: detected.to_string(),
        }),
        None => Err(StagingError::Unrecognized),
    }
}

/// Inline preview the view can drop straight into an `img src`.
#[must_use]
pub fn preview_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", BASE64.encode(bytes))
}

/// Where a staged image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageSource {
    File,
    Camera,
}

/// The image selected or captured but not yet submitted. Exactly one
/// exists at a time; it is dropped on mode switch, cancel, or a
/// successful submission.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StagedImage {
    /// A locally picked or dropped file, held as bytes until submit.
    PickedFile {
        file_name: String,
        mime: String,
        #[serde(with = "serde_bytes")]
        bytes: Vec<u8>,
        preview: String,
    },
    /// A camera frame already encoded to JPEG.
    CameraCapture {
        #[serde(with = "serde_bytes")]
        jpeg: Vec<u8>,
        width: u32,
        height: u32,
        preview: String,
    },
    /// A file the eager-upload variant already committed; the server
    /// path stands in for the bytes at submit time.
    UploadedPath {
        file_name: String,
        img_path: String,
        preview: String,
    },
}

impl StagedImage {
    #[must_use]
    pub const fn source(&self) -> ImageSource {
        match self {
            StagedImage::CameraCapture { .. } => ImageSource::Camera,
            StagedImage::PickedFile { .. } | StagedImage::UploadedPath { .. } => ImageSource::File,
        }
    }

    #[must_use]
    pub fn file_name(&self) -> &str {
        match self {
            StagedImage::PickedFile { file_name, .. }
            | StagedImage::UploadedPath { file_name, .. } => file_name,
            StagedImage::CameraCapture { .. } => CAMERA_CAPTURE_FILENAME,
        }
    }

    #[must_use]
    pub fn preview(&self) -> &str {
        match self {
            StagedImage::PickedFile { preview, .. }
            | StagedImage::CameraCapture { preview, .. }
            | StagedImage::UploadedPath { preview, .. } => preview,
        }
    }

    #[must_use]
    pub fn byte_len(&self) -> Option<usize> {
        match self {
            StagedImage::PickedFile { bytes, .. } => Some(bytes.len()),
            StagedImage::CameraCapture { jpeg, .. } => Some(jpeg.len()),
            StagedImage::UploadedPath { .. } => None,
        }
    }
}

// Redact image bytes and data URLs; a staged photo can be megabytes and
// may show the user's surroundings.
impl fmt::Debug for StagedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StagedImage::PickedFile {
                file_name,
                mime,
                bytes,
                ..
            } => f
                .debug_struct("PickedFile")
                .field("file_name", file_name)
                .field("mime", mime)
                .field("bytes", &bytes.len())
                .finish_non_exhaustive(),
            StagedImage::CameraCapture {
                jpeg,
                width,
                height,
                ..
            } => f
                .debug_struct("CameraCapture")
                .field("jpeg", &jpeg.len())
                .field("width", width)
                .field("height", height)
                .finish_non_exhaustive(),
            StagedImage::UploadedPath {
                file_name,
                img_path,
                ..
            } => f
                .debug_struct("UploadedPath")
                .field("file_name", file_name)
                .field("img_path", img_path)
                .finish_non_exhaustive(),
        }
    }
}
