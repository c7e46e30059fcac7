//! HEIF/ISOBMFF container access.
//!
//! This module provides the item-level view of a HEIF file that the grid
//! pipeline consumes:
//! - Item lists by type (`grid`, `hvc1`, `Exif`)
//! - Forward and reverse `iref` lookups (`dimg`, `thmb`, `cdsc`)
//! - Item payloads, optionally prefixed with HEVC decoder parameters
//! - Grid descriptors and per-item properties
//!
//! The pipeline only talks to the [`ContainerReader`] trait; [`HeifReader`]
//! is the file-backed implementation.

mod boxes;
mod parser;
mod reader;

pub use boxes::{FourCC, HevcDecoderConfig, ImageSpatialExtents, ItemId, NclxColor};
pub use parser::{parse, parse_grid_payload, HeifMeta};
pub use reader::{ContainerReader, ContextId, HeifReader, ROOT_CONTEXT};

use thiserror::Error;

/// Errors raised while reading a HEIF container.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// The file is not a HEIF/HEIC file.
    #[error("Not a HEIF file: {0}")]
    NotHeif(String),

    /// A box ended before its declared fields.
    #[error("Truncated or malformed '{0}' box")]
    Truncated(&'static str),

    /// Only the root-level metadata context exists.
    #[error("Unknown metadata context {0}")]
    UnknownContext(ContextId),

    /// No item with this id is declared.
    #[error("Item {0} not found")]
    MissingItem(ItemId),

    /// The item has no (resolvable) location.
    #[error("Item {0} has no data")]
    MissingData(ItemId),

    /// The item carries no `hvcC` property.
    #[error("Item {0} has no HEVC decoder configuration")]
    MissingDecoderConfig(ItemId),

    /// The item's construction method cannot be resolved.
    #[error("Item {item} uses unsupported construction method {method}")]
    UnsupportedConstruction { item: ItemId, method: u8 },

    /// The grid item payload is malformed.
    #[error("Invalid grid item {item}: {reason}")]
    InvalidGrid { item: ItemId, reason: String },

    /// I/O error while reading the file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
