//! Grid geometry and raster types shared by the resolver and compositor.

use serde::{Deserialize, Serialize};

use crate::container::ItemId;

/// Geometry of a grid item: output crop size and tile layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridDescriptor {
    /// Width of the reconstructed image in pixels.
    pub output_width: u32,
    /// Height of the reconstructed image in pixels.
    pub output_height: u32,
    /// Number of tile columns (>= 1).
    pub columns: u32,
    /// Number of tile rows (>= 1).
    pub rows: u32,
}

impl GridDescriptor {
    /// Number of cells in the grid.
    pub fn tile_count(&self) -> u32 {
        self.columns * self.rows
    }

    /// Grid cell `(row, column)` of the tile at row-major `index`.
    #[inline]
    pub fn cell(&self, index: u32) -> (u32, u32) {
        (index / self.columns, index % self.columns)
    }

    /// Whether tiles of the given size cover the declared output size.
    pub fn fits_tiles(&self, tile_width: u32, tile_height: u32) -> bool {
        u64::from(self.output_width) <= u64::from(self.columns) * u64::from(tile_width)
            && u64::from(self.output_height) <= u64::from(self.rows) * u64::from(tile_height)
    }
}

/// One coded tile, owned until it is handed to the tile decoder.
#[derive(Debug, Clone)]
pub struct TileItem {
    /// Container item id of the tile.
    pub id: ItemId,
    /// Row-major position of the tile in the grid.
    pub order_index: u32,
    /// Annex-B access unit including decoder parameter sets.
    pub coded_payload: Vec<u8>,
}

/// An interleaved RGB raster (3 bytes per pixel, row-major, no row padding).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel data; length is `width * height * 3`.
    pub pixels: Vec<u8>,
}

impl Canvas {
    /// Create a canvas from dimensions and pixel data.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(
            pixels.len(),
            width as usize * height as usize * 3,
            "Pixel buffer size mismatch"
        );
        Self {
            width,
            height,
            pixels,
        }
    }

    /// A black canvas of the given size.
    pub fn blank(width: u32, height: u32) -> Self {
        Self::new(width, height, vec![0; width as usize * height as usize * 3])
    }

    /// Create a canvas from an `image::RgbImage`.
    pub fn from_rgb_image(img: image::RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            pixels: img.into_raw(),
        }
    }

    /// Convert into an `image::RgbImage` without copying.
    pub fn into_rgb_image(self) -> Option<image::RgbImage> {
        image::RgbImage::from_raw(self.width, self.height, self.pixels)
    }

    /// RGB value at `(x, y)`.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        [self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2]]
    }

    /// Size of the pixel buffer in bytes.
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.is_empty()
    }
}
