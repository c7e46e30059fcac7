//! Tile compositing: place decoded tiles on one canvas and crop to the output size.
//!
//! # Algorithm
//!
//! For `n` tiles of `tw x th` pixels laid out in `c` columns:
//! ```text
//! canvas = (c * tw) x (ceil(n / c) * th)
//! tile i -> offset ((i mod c) * tw, (i div c) * th)
//! output = canvas[0..output_width, 0..output_height]
//! ```
//! The compositor knows nothing about codecs or containers; it only sees
//! raw RGB buffers and geometry.

use tracing::debug;

use super::{Canvas, CompositeError};
use crate::decode::DecodedTile;
use crate::transform::crop;

const CHANNELS: usize = 3;

/// Composite row-major ordered tiles into a canvas cropped to the output size.
///
/// Consumes every tile exactly once.
///
/// # Errors
///
/// - `CompositeError::EmptyTileSet` - no tiles given
/// - `CompositeError::ZeroColumns` - `columns` is zero
/// - `CompositeError::HeterogeneousTileSize` - a tile differs in size from the first
/// - `CompositeError::TileBufferMismatch` - a tile's buffer is not `width * height * 3` bytes
/// - `CompositeError::OutputExceedsCanvas` - the crop would extend past the tiles
pub fn composite(
    tiles: Vec<DecodedTile>,
    columns: u32,
    output_width: u32,
    output_height: u32,
) -> Result<Canvas, CompositeError> {
    let first = tiles.first().ok_or(CompositeError::EmptyTileSet)?;
    if columns == 0 {
        return Err(CompositeError::ZeroColumns);
    }

    let (tile_width, tile_height) = (first.width, first.height);
    if let Some((index, tile)) = tiles
        .iter()
        .enumerate()
        .find(|(_, t)| t.width != tile_width || t.height != tile_height)
    {
        return Err(CompositeError::HeterogeneousTileSize {
            index,
            expected: (tile_width, tile_height),
            actual: (tile.width, tile.height),
        });
    }

    let tile_bytes = tile_width as usize * tile_height as usize * CHANNELS;
    if let Some((index, tile)) = tiles
        .iter()
        .enumerate()
        .find(|(_, t)| t.byte_size() != tile_bytes)
    {
        return Err(CompositeError::TileBufferMismatch {
            index,
            expected: tile_bytes,
            actual: tile.byte_size(),
        });
    }

    let rows = (tiles.len() as u32).div_ceil(columns);
    let canvas_width = columns
        .checked_mul(tile_width)
        .ok_or(CompositeError::CanvasTooLarge)?;
    let canvas_height = rows
        .checked_mul(tile_height)
        .ok_or(CompositeError::CanvasTooLarge)?;

    if output_width == 0
        || output_height == 0
        || output_width > canvas_width
        || output_height > canvas_height
    {
        return Err(CompositeError::OutputExceedsCanvas {
            output: (output_width, output_height),
            canvas: (canvas_width, canvas_height),
        });
    }

    debug!(
        tiles = tiles.len(),
        tile_width,
        tile_height,
        canvas_width,
        canvas_height,
        "compositing tiles"
    );

    let mut canvas = Canvas::blank(canvas_width, canvas_height);
    for (index, tile) in tiles.into_iter().enumerate() {
        let index = index as u32;
        let x = (index % columns) * tile_width;
        let y = (index / columns) * tile_height;
        place_tile(&mut canvas, &tile, x, y);
    }

    Ok(crop(canvas, 0, 0, output_width, output_height))
}

/// Copy a tile into the canvas at pixel offset `(x, y)`, one row at a time.
///
/// Callers guarantee the tile lies fully inside the canvas.
fn place_tile(canvas: &mut Canvas, tile: &DecodedTile, x: u32, y: u32) {
    let row_bytes = tile.width as usize * CHANNELS;
    let canvas_stride = canvas.width as usize * CHANNELS;
    let x_offset = x as usize * CHANNELS;

    for (row, src) in tile.data.chunks_exact(row_bytes).enumerate() {
        let dst_start = (y as usize + row) * canvas_stride + x_offset;
        canvas.pixels[dst_start..dst_start + row_bytes].copy_from_slice(src);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tile filled with a single color derived from its index.
    fn solid_tile(index: u8, width: u32, height: u32) -> DecodedTile {
        let data = [index, index.wrapping_mul(3), 255 - index].repeat((width * height) as usize);
        DecodedTile::new(data, width, height)
    }

    #[test]
    fn test_composite_2x2_grid_cropped() {
        let tiles = (0..4).map(|i| solid_tile(i, 512, 512)).collect();
        let canvas = composite(tiles, 2, 1000, 1000).unwrap();

        assert_eq!((canvas.width, canvas.height), (1000, 1000));
        assert_eq!(canvas.byte_size(), 1000 * 1000 * 3);
        assert_eq!(canvas.pixel(0, 0), [0, 0, 255]);
        assert_eq!(canvas.pixel(511, 511), [0, 0, 255]);
        assert_eq!(canvas.pixel(512, 0), [1, 3, 254]);
        assert_eq!(canvas.pixel(0, 512), [2, 6, 253]);
        assert_eq!(canvas.pixel(512, 512), [3, 9, 252]);
        assert_eq!(canvas.pixel(999, 999), [3, 9, 252]);
    }

    #[test]
    fn test_composite_uncropped_keeps_full_canvas() {
        let tiles = (0..6).map(|i| solid_tile(i, 4, 2)).collect();
        let canvas = composite(tiles, 3, 12, 4).unwrap();
        assert_eq!((canvas.width, canvas.height), (12, 4));
        assert_eq!(canvas.pixel(11, 3), [5, 15, 250]);
    }

    #[test]
    fn test_composite_empty_tile_set() {
        let result = composite(Vec::new(), 2, 10, 10);
        assert!(matches!(result, Err(CompositeError::EmptyTileSet)));
    }

    #[test]
    fn test_composite_heterogeneous_tiles() {
        let tiles = vec![solid_tile(0, 4, 4), solid_tile(1, 4, 4), solid_tile(2, 4, 3)];
        match composite(tiles, 2, 8, 8) {
            Err(CompositeError::HeterogeneousTileSize {
                index,
                expected,
                actual,
            }) => {
                assert_eq!(index, 2);
                assert_eq!(expected, (4, 4));
                assert_eq!(actual, (4, 3));
            }
            other => panic!("Expected HeterogeneousTileSize, got: {:?}", other),
        }
    }

    #[test]
    fn test_composite_rejects_oversized_buffer() {
        let mut long = solid_tile(1, 4, 4);
        long.data.extend_from_slice(&[9; 12]);
        let tiles = vec![solid_tile(0, 4, 4), long];
        assert!(matches!(
            composite(tiles, 2, 8, 4),
            Err(CompositeError::TileBufferMismatch {
                index: 1,
                expected: 48,
                actual: 60
            })
        ));
    }

    #[test]
    fn test_composite_rejects_short_first_buffer() {
        let mut short = solid_tile(0, 4, 4);
        short.data.truncate(40);
        assert!(matches!(
            composite(vec![short], 1, 4, 4),
            Err(CompositeError::TileBufferMismatch {
                index: 0,
                expected: 48,
                actual: 40
            })
        ));
    }

    #[test]
    fn test_composite_output_larger_than_canvas() {
        let tiles = (0..4).map(|i| solid_tile(i, 8, 8)).collect();
        let result = composite(tiles, 2, 17, 16);
        assert!(matches!(
            result,
            Err(CompositeError::OutputExceedsCanvas {
                output: (17, 16),
                canvas: (16, 16)
            })
        ));
    }

    #[test]
    fn test_composite_zero_columns() {
        let tiles = vec![solid_tile(0, 2, 2)];
        assert!(matches!(
            composite(tiles, 0, 2, 2),
            Err(CompositeError::ZeroColumns)
        ));
    }

    #[test]
    fn test_composite_partial_last_row() {
        // 3 tiles in 2 columns: second row has one tile and one empty cell
        let tiles = (0..3).map(|i| solid_tile(i + 1, 2, 2)).collect();
        let canvas = composite(tiles, 2, 4, 4).unwrap();
        assert_eq!(canvas.pixel(0, 2), [3, 9, 252]);
        assert_eq!(canvas.pixel(3, 3), [0, 0, 0]);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================
