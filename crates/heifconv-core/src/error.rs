//! Top-level conversion error and its failure taxonomy.

use thiserror::Error;

use crate::container::ContainerError;
use crate::decode::DecodeError;
use crate::encode::EncodeError;
use crate::grid::{CompositeError, GridError};
use crate::metadata::MetadataError;
use crate::transform::TransformError;

/// Any failure that ends a conversion.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error("Tile decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("Tile compositing failed: {0}")]
    Composite(#[from] CompositeError),

    #[error("Orientation correction failed: {0}")]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The dedicated decode pool could not be built.
    #[error("Failed to build decode thread pool: {0}")]
    ThreadPool(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Broad failure class of a [`ConvertError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Grid, tile, thumbnail or EXIF reference missing, or a malformed container.
    Structural,
    /// Bitstream rejected or no frame produced.
    Decode,
    /// Empty or heterogeneous tile set, or an impossible crop.
    Geometry,
    /// EXIF problems. The driver absorbs these; they only surface from direct calls.
    MetadataSoft,
    /// Unsupported output format or encoder failure.
    Output,
    Io,
}

impl ConvertError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ConvertError::Container(e) => container_category(e),
            ConvertError::Grid(GridError::Container(e)) => container_category(e),
            ConvertError::Grid(_) => ErrorCategory::Structural,
            ConvertError::Decode(DecodeError::TileSizeMismatch { .. }) => ErrorCategory::Geometry,
            ConvertError::Decode(_) | ConvertError::ThreadPool(_) => ErrorCategory::Decode,
            ConvertError::Composite(_) | ConvertError::Transform(_) => ErrorCategory::Geometry,
            ConvertError::Metadata(_) => ErrorCategory::MetadataSoft,
            ConvertError::Encode(EncodeError::Io(_)) | ConvertError::Io(_) => ErrorCategory::Io,
            ConvertError::Encode(_) => ErrorCategory::Output,
        }
    }

    /// Whether the conversion must abort. Only metadata problems are recoverable.
    pub fn is_fatal(&self) -> bool {
        self.category() != ErrorCategory::MetadataSoft
    }
}

fn container_category(err: &ContainerError) -> ErrorCategory {
    match err {
        ContainerError::Io(_) => ErrorCategory::Io,
        _ => ErrorCategory::Structural,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        let cases: Vec<(ConvertError, ErrorCategory)> = vec![
            (
                GridError::NoGridFound { context: 1 }.into(),
                ErrorCategory::Structural,
            ),
            (
                ContainerError::MissingItem(3).into(),
                ErrorCategory::Structural,
            ),
            (
                GridError::Container(ContainerError::Io(std::io::Error::other("disk"))).into(),
                ErrorCategory::Io,
            ),
            (
                DecodeError::Submit("bad".to_string()).into(),
                ErrorCategory::Decode,
            ),
            (DecodeError::NoFrame.into(), ErrorCategory::Decode),
            (
                DecodeError::TileSizeMismatch {
                    item: 2,
                    expected: (512, 512),
                    actual: (256, 256),
                }
                .into(),
                ErrorCategory::Geometry,
            ),
            (CompositeError::EmptyTileSet.into(), ErrorCategory::Geometry),
            (
                MetadataError::ExifRefNotFound { item: 1 }.into(),
                ErrorCategory::MetadataSoft,
            ),
            (
                EncodeError::UnsupportedOutputFormat {
                    path: "x.gif".to_string(),
                }
                .into(),
                ErrorCategory::Output,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.category(), expected, "{}", err);
        }
    }

    #[test]
    fn test_only_metadata_is_recoverable() {
        let soft: ConvertError = MetadataError::ExifDataEmpty { item: 9 }.into();
        assert!(!soft.is_fatal());

        let hard: ConvertError = CompositeError::EmptyTileSet.into();
        assert!(hard.is_fatal());
    }

    #[test]
    fn test_display_is_transparent_for_structural() {
        let err: ConvertError = GridError::NoGridFound { context: 1 }.into();
        assert_eq!(err.to_string(), "No grid items found in context 1");
    }
}
