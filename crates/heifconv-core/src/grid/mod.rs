//! Grid image handling.
//!
//! A HEIF grid image is a `grid` item that references `columns * rows` coded
//! tiles through `dimg` edges. This module:
//! - Resolves the grid item, its geometry, tiles and thumbnail ([`resolve`])
//! - Pulls each tile's coded payload out of the container ([`fetch_tiles`])
//! - Places decoded tiles on one canvas and crops it ([`composite`])

mod compositor;
mod resolver;
mod types;

pub use compositor::composite;
pub use resolver::{fetch_tiles, resolve, ResolvedGrid};
pub use types::{Canvas, GridDescriptor, TileItem};

use thiserror::Error;

use crate::container::{ContainerError, ContextId, ItemId};

/// Errors raised while resolving a grid from the container.
#[derive(Debug, Error)]
pub enum GridError {
    /// The context holds no `grid` item.
    #[error("No grid items found in context {context}")]
    NoGridFound { context: ContextId },

    /// The grid item references no tiles.
    #[error("Grid item {grid} references no tiles")]
    NoTilesFound { grid: ItemId },

    /// Thumbnail mode was requested but the grid has no thumbnail.
    #[error("Grid item {grid} has no thumbnail")]
    NoThumbnail { grid: ItemId },

    /// The number of referenced tiles does not match the grid layout.
    #[error("Grid declares {expected} tiles but references {actual}")]
    TileCountMismatch { expected: u32, actual: usize },

    /// Underlying container lookup failed.
    #[error(transparent)]
    Container(#[from] ContainerError),
}

/// Errors raised while compositing decoded tiles.
#[derive(Debug, Error)]
pub enum CompositeError {
    #[error("No tiles to composite")]
    EmptyTileSet,

    #[error("Grid has zero columns")]
    ZeroColumns,

    /// All tiles must share the first tile's size.
    #[error("Tile {index} is {}x{} but tile 0 is {}x{}", actual.0, actual.1, expected.0, expected.1)]
    HeterogeneousTileSize {
        index: usize,
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// A tile's pixel buffer disagrees with its dimensions.
    #[error("Tile {index} buffer is {actual} bytes, expected {expected}")]
    TileBufferMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Composited canvas dimensions overflow")]
    CanvasTooLarge,

    /// The requested output does not fit inside the tile canvas.
    #[error(
        "Output {}x{} does not fit canvas {}x{}",
        output.0, output.1, canvas.0, canvas.1
    )]
    OutputExceedsCanvas {
        output: (u32, u32),
        canvas: (u32, u32),
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_error_display() {
        let err = GridError::NoGridFound { context: 1 };
        assert_eq!(err.to_string(), "No grid items found in context 1");

        let err = GridError::TileCountMismatch {
            expected: 4,
            actual: 3,
        };
        assert_eq!(err.to_string(), "Grid declares 4 tiles but references 3");
    }

    #[test]
    fn test_grid_error_from_container() {
        let err: GridError = ContainerError::MissingItem(9).into();
        assert!(matches!(err, GridError::Container(_)));
        assert_eq!(err.to_string(), "Item 9 not found");
    }

    #[test]
    fn test_composite_error_display() {
        let err = CompositeError::HeterogeneousTileSize {
            index: 2,
            expected: (512, 512),
            actual: (512, 256),
        };
        assert_eq!(err.to_string(), "Tile 2 is 512x256 but tile 0 is 512x512");
    }
}
