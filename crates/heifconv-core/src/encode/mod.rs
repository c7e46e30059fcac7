//! Output encoding.
//!
//! This module provides functionality for:
//! - Choosing an output format from the file extension ([`OutputFormat`])
//! - Encoding a canvas to JPEG (with quality), PNG, TIFF or binary PPM
//! - Writing the encoded bytes to disk only after encoding succeeded ([`save`])
//!
//! # Examples
//!
//! ```ignore
//! use heifconv_core::encode::{encode, OutputFormat};
//!
//! let format = OutputFormat::from_path("photo.jpg")?;
//! let bytes = encode(&canvas, format, 90)?;
//! println!("Encoded {} bytes", bytes.len());
//! ```

mod output;

pub use output::{encode, save, OutputFormat, DEFAULT_QUALITY};

use thiserror::Error;

/// Errors that can occur during output encoding.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The output extension maps to no supported format.
    #[error("Unsupported output format: {path} (expected .jpg, .jpeg, .png, .tif, .tiff or .ppm)")]
    UnsupportedOutputFormat { path: String },

    /// Pixel data length doesn't match expected dimensions
    #[error("Invalid pixel data: expected {expected} bytes (width * height * 3), got {actual}")]
    InvalidPixelData { expected: usize, actual: usize },

    /// Width or height is zero
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// The encoder itself failed
    #[error("{format} encoding failed: {reason}")]
    EncodingFailed {
        format: OutputFormat,
        reason: String,
    },

    /// Writing the output file failed
    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
}
