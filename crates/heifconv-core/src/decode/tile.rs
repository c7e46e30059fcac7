//! Single-tile decode: coded access unit in, owned RGB tile out.

use tracing::trace;

use super::{ColorConverter, DecodeError, DecodedTile, HevcDecoder};
use crate::container::ItemId;
use crate::grid::TileItem;

/// Decode one coded tile into an interleaved RGB buffer.
///
/// A fresh decode session is opened for the call and dropped before the
/// tile is returned. The tile's payload is consumed. Width and height come
/// from the decoded frame.
///
/// # Errors
///
/// - `DecodeError::Submit` - the decoder rejected the payload
/// - `DecodeError::NoFrame` - the payload was accepted but produced no frame
/// - `DecodeError::InvalidFrame` - the frame planes are inconsistent
pub fn decode_tile<D>(
    decoder: &D,
    tile: TileItem,
    converter: &mut ColorConverter,
) -> Result<DecodedTile, DecodeError>
where
    D: HevcDecoder + ?Sized,
{
    let TileItem {
        id,
        order_index,
        coded_payload,
    } = tile;

    let frame = {
        let mut session = decoder.open()?;
        session.submit(&coded_payload)?;
        session.receive_frame()?.ok_or(DecodeError::NoFrame)?
    };
    drop(coded_payload);

    let decoded = converter.convert(&frame)?;
    trace!(
        item = id,
        index = order_index,
        width = decoded.width,
        height = decoded.height,
        backend = decoder.name(),
        "decoded tile"
    );
    Ok(decoded)
}

/// Reject a tile whose decoded size differs from the expected size.
pub fn check_tile_size(
    tile: &DecodedTile,
    item: ItemId,
    expected: (u32, u32),
) -> Result<(), DecodeError> {
    if tile.dimensions() == expected {
        Ok(())
    } else {
        Err(DecodeError::TileSizeMismatch {
            item,
            expected,
            actual: tile.dimensions(),
        })
    }
}
