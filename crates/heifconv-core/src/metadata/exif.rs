//! EXIF payload lookup and orientation parsing.

use exif::{In, Reader, Tag};
use tracing::debug;

use super::{MetadataError, Orientation};
use crate::container::{ContainerError, ContainerReader, ContextId, FourCC, ItemId};

/// Length of the header HEIF stores before the EXIF payload
/// (a big-endian offset to the TIFF header).
pub const EXIF_PREFIX_LEN: usize = 4;

const EXIF_HEADER: &[u8] = b"Exif\0\0";

/// Return the raw EXIF item payload describing `item`.
///
/// The EXIF item is found through a reverse `cdsc` reference: the EXIF
/// item points at the image it describes.
///
/// # Errors
///
/// - `MetadataError::ExifRefNotFound` - no EXIF item references `item`
/// - `MetadataError::ExifDataEmpty` - the EXIF item has a zero-length payload
pub fn extract_exif<R>(
    reader: &R,
    context: ContextId,
    item: ItemId,
) -> Result<Vec<u8>, MetadataError>
where
    R: ContainerReader + ?Sized,
{
    let exif_items = reader.item_list_by_type(context, FourCC::EXIF)?;
    let exif_id = reader
        .referenced_to_item_list_by_type(context, item, FourCC::CDSC)?
        .into_iter()
        .find(|id| exif_items.contains(id))
        .ok_or(MetadataError::ExifRefNotFound { item })?;

    let data = match reader.item_data(context, exif_id) {
        Ok(data) => data,
        Err(ContainerError::MissingData(_)) => Vec::new(),
        Err(e) => return Err(e.into()),
    };
    if data.is_empty() {
        return Err(MetadataError::ExifDataEmpty { item: exif_id });
    }

    debug!(item, exif = exif_id, bytes = data.len(), "found exif payload");
    Ok(data)
}

/// Read the orientation tag from an EXIF item payload.
///
/// Skips the 4-byte storage prefix and an optional `Exif\0\0` header before
/// parsing the TIFF structure. Returns `Orientation::Normal` when the tag is
/// absent or the payload is unparsable.
pub fn parse_orientation(blob: &[u8]) -> Orientation {
    let Some(tiff) = tiff_payload(blob) else {
        debug!(bytes = blob.len(), "exif payload too short");
        return Orientation::Normal;
    };

    match Reader::new().read_raw(tiff.to_vec()) {
        Ok(exif) => exif
            .get_field(Tag::Orientation, In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .map(Orientation::from)
            .unwrap_or_default(),
        Err(e) => {
            debug!(error = %e, "unparsable exif payload");
            Orientation::Normal
        }
    }
}

/// Locate the TIFF header inside an EXIF item payload.
fn tiff_payload(blob: &[u8]) -> Option<&[u8]> {
    let prefix = blob.get(..EXIF_PREFIX_LEN)?;
    let payload = &blob[EXIF_PREFIX_LEN..];

    // Prefer the stored offset when it lands on a TIFF header
    let offset = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
    if let Some(candidate) = payload.get(offset..) {
        if is_tiff_header(candidate) {
            return Some(candidate);
        }
    }

    let payload = payload.strip_prefix(EXIF_HEADER).unwrap_or(payload);
    (!payload.is_empty()).then_some(payload)
}

fn is_tiff_header(data: &[u8]) -> bool {
    data.starts_with(b"II*\0") || data.starts_with(b"MM\0*")
}
