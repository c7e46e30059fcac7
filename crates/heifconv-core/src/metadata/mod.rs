//! Embedded camera metadata.
//!
//! Locates the EXIF item attached to an image item and derives the
//! orientation tag from it. A malformed or tagless payload is not an error:
//! orientation falls back to [`Orientation::Normal`].

mod exif;
mod types;

pub use self::exif::{extract_exif, parse_orientation, EXIF_PREFIX_LEN};
pub use types::Orientation;

use thiserror::Error;

use crate::container::{ContainerError, ItemId};

/// Errors raised while locating EXIF metadata.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// No EXIF item references the image.
    #[error("No EXIF item references item {item}")]
    ExifRefNotFound { item: ItemId },

    /// The EXIF item exists but holds no bytes.
    #[error("EXIF item {item} is empty")]
    ExifDataEmpty { item: ItemId },

    #[error(transparent)]
    Container(#[from] ContainerError),
}
