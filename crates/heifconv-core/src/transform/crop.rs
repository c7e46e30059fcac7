//! Pixel-rectangle cropping.
//!
//! Crop coordinates are integer pixels with the origin at the top-left
//! corner. Cropping never pads: a region reaching past the canvas is
//! clamped to it.

use crate::grid::Canvas;

const CHANNELS: usize = 3;

/// Crop `canvas` to the rectangle at `(left, top)` of size `width x height`.
///
/// Takes ownership so the common cases avoid copying:
/// - the full rectangle returns the canvas untouched
/// - a full-width rectangle starting at row 0 truncates the buffer in place
///
/// The region is clamped to the canvas; the output is at least 1x1 for a
/// non-empty canvas.
pub fn crop(canvas: Canvas, left: u32, top: u32, width: u32, height: u32) -> Canvas {
    if canvas.is_empty() {
        return canvas;
    }

    let left = left.min(canvas.width - 1);
    let top = top.min(canvas.height - 1);
    let out_width = width.clamp(1, canvas.width - left);
    let out_height = height.clamp(1, canvas.height - top);

    if left == 0 && top == 0 && out_width == canvas.width {
        if out_height == canvas.height {
            return canvas;
        }
        let Canvas {
            width, mut pixels, ..
        } = canvas;
        pixels.truncate(width as usize * out_height as usize * CHANNELS);
        return Canvas::new(width, out_height, pixels);
    }

    let src_stride = canvas.width as usize * CHANNELS;
    let row_bytes = out_width as usize * CHANNELS;
    let x_offset = left as usize * CHANNELS;

    let mut pixels = Vec::with_capacity(row_bytes * out_height as usize);
    for row in canvas
        .pixels
        .chunks_exact(src_stride)
        .skip(top as usize)
        .take(out_height as usize)
    {
        pixels.extend_from_slice(&row[x_offset..x_offset + row_bytes]);
    }

    Canvas::new(out_width, out_height, pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Canvas where each pixel encodes its own position.
    fn test_canvas(width: u32, height: u32) -> Canvas {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&[x as u8, y as u8, 7]);
            }
        }
        Canvas::new(width, height, pixels)
    }

    #[test]
    fn test_full_crop_is_identity() {
        let canvas = test_canvas(10, 8);
        assert_eq!(crop(canvas.clone(), 0, 0, 10, 8), canvas);
    }

    #[test]
    fn test_top_left_crop() {
        let cropped = crop(test_canvas(1024, 1024), 0, 0, 1000, 1000);
        assert_eq!((cropped.width, cropped.height), (1000, 1000));
        assert_eq!(cropped.byte_size(), 1000 * 1000 * 3);
        assert_eq!(cropped.pixel(999, 999), [(999 % 256) as u8, (999 % 256) as u8, 7]);
    }

    #[test]
    fn test_full_width_crop_truncates() {
        let cropped = crop(test_canvas(6, 6), 0, 0, 6, 4);
        assert_eq!((cropped.width, cropped.height), (6, 4));
        assert_eq!(cropped.byte_size(), 6 * 4 * 3);
        assert_eq!(cropped.pixel(5, 3), [5, 3, 7]);
    }

    #[test]
    fn test_offset_crop_preserves_pixels() {
        let cropped = crop(test_canvas(10, 10), 3, 2, 4, 5);
        assert_eq!((cropped.width, cropped.height), (4, 5));
        assert_eq!(cropped.pixel(0, 0), [3, 2, 7]);
        assert_eq!(cropped.pixel(3, 4), [6, 6, 7]);
    }

    #[test]
    fn test_crop_clamps_to_bounds() {
        let cropped = crop(test_canvas(10, 10), 8, 8, 50, 50);
        assert_eq!((cropped.width, cropped.height), (2, 2));
        assert_eq!(cropped.pixel(1, 1), [9, 9, 7]);

        let cropped = crop(test_canvas(10, 10), 20, 20, 5, 5);
        assert_eq!((cropped.width, cropped.height), (1, 1));
        assert_eq!(cropped.pixel(0, 0), [9, 9, 7]);
    }

    #[test]
    fn test_crop_minimum_dimension() {
        let cropped = crop(test_canvas(10, 10), 0, 0, 0, 0);
        assert_eq!((cropped.width, cropped.height), (1, 1));
    }

    #[test]
    fn test_crop_empty_canvas() {
        let cropped = crop(Canvas::blank(0, 0), 0, 0, 4, 4);
        assert!(cropped.is_empty());
    }
}
