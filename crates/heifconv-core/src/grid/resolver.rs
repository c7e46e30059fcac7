//! Grid descriptor resolution: locate the grid item, its tiles and thumbnail.

use tracing::debug;

use super::{GridDescriptor, GridError, TileItem};
use crate::container::{ContainerReader, ContextId, FourCC, ItemId};

/// A grid item with its geometry and row-major tile list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedGrid {
    /// Item id of the grid itself.
    pub grid_item_id: ItemId,
    /// Geometry read from the grid payload.
    pub descriptor: GridDescriptor,
    /// Tile item ids in row-major order, exactly as stored.
    pub tile_ids: Vec<ItemId>,
    /// First tile; holds the decoder configuration the other tiles reuse.
    pub first_tile_id: ItemId,
    /// Thumbnail item referencing the grid, if any.
    pub thumbnail_id: Option<ItemId>,
}

impl ResolvedGrid {
    /// Thumbnail item id, or `NoThumbnail` when the grid has none.
    pub fn thumbnail(&self) -> Result<ItemId, GridError> {
        self.thumbnail_id.ok_or(GridError::NoThumbnail {
            grid: self.grid_item_id,
        })
    }
}

/// Resolve the first grid item of `context`.
///
/// # Errors
///
/// - `GridError::NoGridFound` - no `grid` item in the context
/// - `GridError::NoTilesFound` - the grid references no tiles
/// - `GridError::TileCountMismatch` - tile list length differs from `columns * rows`
pub fn resolve<R>(reader: &R, context: ContextId) -> Result<ResolvedGrid, GridError>
where
    R: ContainerReader + ?Sized,
{
    let grid_item_id = *reader
        .item_list_by_type(context, FourCC::GRID)?
        .first()
        .ok_or(GridError::NoGridFound { context })?;

    let descriptor = reader.item_grid(context, grid_item_id)?;

    // dimg order is the row-major tile order; never re-sort it
    let tile_ids = reader.referenced_item_list_by_type(context, grid_item_id, FourCC::DIMG)?;
    let first_tile_id = *tile_ids.first().ok_or(GridError::NoTilesFound {
        grid: grid_item_id,
    })?;

    if tile_ids.len() != descriptor.tile_count() as usize {
        return Err(GridError::TileCountMismatch {
            expected: descriptor.tile_count(),
            actual: tile_ids.len(),
        });
    }

    let thumbnail_id = reader
        .referenced_to_item_list_by_type(context, grid_item_id, FourCC::THMB)?
        .first()
        .copied();

    debug!(
        grid = grid_item_id,
        columns = descriptor.columns,
        rows = descriptor.rows,
        width = descriptor.output_width,
        height = descriptor.output_height,
        thumbnail = ?thumbnail_id,
        "resolved grid"
    );

    Ok(ResolvedGrid {
        grid_item_id,
        descriptor,
        tile_ids,
        first_tile_id,
        thumbnail_id,
    })
}

/// Pull every tile's coded payload out of the container, in grid order.
///
/// The first tile carries its own decoder parameters; every later tile
/// borrows them from the first.
pub fn fetch_tiles<R>(
    reader: &R,
    context: ContextId,
    grid: &ResolvedGrid,
) -> Result<Vec<TileItem>, GridError>
where
    R: ContainerReader + ?Sized,
{
    grid.tile_ids
        .iter()
        .enumerate()
        .map(|(index, &id)| {
            let config_source = (id != grid.first_tile_id).then_some(grid.first_tile_id);
            let coded_payload =
                reader.item_data_with_decoder_parameters(context, id, config_source)?;
            Ok(TileItem {
                id,
                order_index: index as u32,
                coded_payload,
            })
        })
        .collect()
}
