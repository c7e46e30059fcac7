//! EXIF orientation correction.

use image::imageops;
use image::RgbImage;

use super::TransformError;
use crate::grid::Canvas;
use crate::metadata::Orientation;

/// Apply the flip/rotate that brings an image stored with `orientation`
/// upright.
///
/// `Normal` returns the canvas untouched.
pub fn correct(canvas: Canvas, orientation: Orientation) -> Result<Canvas, TransformError> {
    if orientation == Orientation::Normal {
        return Ok(canvas);
    }

    let mut img = into_image(canvas)?;
    let out = match orientation {
        Orientation::Normal => img,
        Orientation::FlipHorizontal => {
            imageops::flip_horizontal_in_place(&mut img);
            img
        }
        Orientation::Rotate180 => {
            imageops::rotate180_in_place(&mut img);
            img
        }
        Orientation::FlipVertical => {
            imageops::flip_vertical_in_place(&mut img);
            img
        }
        Orientation::Transpose => imageops::flip_horizontal(&imageops::rotate90(&img)),
        Orientation::Rotate90CW => imageops::rotate90(&img),
        Orientation::Transverse => imageops::flip_horizontal(&imageops::rotate270(&img)),
        Orientation::Rotate270CW => imageops::rotate270(&img),
    };

    Ok(Canvas::from_rgb_image(out))
}

/// [`correct`] for a raw tag value. Values outside 1-8 are the identity.
pub fn correct_tag(canvas: Canvas, tag: u32) -> Result<Canvas, TransformError> {
    correct(canvas, Orientation::from(tag))
}

fn into_image(canvas: Canvas) -> Result<RgbImage, TransformError> {
    let (width, height, len) = (canvas.width, canvas.height, canvas.pixels.len());
    canvas
        .into_rgb_image()
        .ok_or(TransformError::BufferMismatch { width, height, len })
}


// ============================================================================
// Property-Based Tests
// ============================================================================
