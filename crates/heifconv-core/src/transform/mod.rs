//! Geometric transforms on composited canvases: cropping and orientation.
//!
//! # Coordinate System
//!
//! - Crop coordinates are integer pixels
//! - Origin is the top-left corner
//! - Rotations are clockwise, matching the EXIF orientation convention

mod crop;
mod orientation;

pub use crop::crop;
pub use orientation::{correct, correct_tag};

use thiserror::Error;

/// Errors raised by geometric transforms.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The canvas buffer length disagrees with its dimensions.
    #[error("Canvas buffer of {len} bytes does not match {width}x{height} RGB")]
    BufferMismatch { width: u32, height: u32, len: usize },
}
