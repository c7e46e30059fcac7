//! heifconv core - HEIF grid image reconstruction
//!
//! This crate turns a tiled HEIF/HEIC image into a single flat raster:
//! it resolves the grid item, decodes every HEVC tile, composites the tiles
//! in row-major order, crops to the declared size, applies the EXIF
//! orientation and encodes the result as JPEG, PNG, TIFF or PPM.
//!
//! # Example
//!
//! ```ignore
//! use heifconv_core::{ConvertConfig, Converter, FfmpegDecoder};
//!
//! let converter = Converter::new(FfmpegDecoder::new(), ConvertConfig::default());
//! let report = converter.convert_file("IMG_0001.HEIC", "IMG_0001.jpg")?;
//! println!("{}x{}", report.output_width, report.output_height);
//! ```

pub mod container;
pub mod decode;
pub mod encode;
pub mod grid;
pub mod metadata;
pub mod pipeline;
pub mod transform;

mod error;

pub use container::{ContainerReader, HeifReader};
pub use decode::{FfmpegDecoder, HevcDecoder};
pub use encode::OutputFormat;
pub use error::{ConvertError, ErrorCategory};
pub use metadata::Orientation;
pub use pipeline::{
    ConversionReport, ConvertConfig, ConvertMode, Converter, DecodeStrategy, PipelineStage,
};

use std::path::Path;

/// Convert `input` into `output` with the system `ffmpeg` as tile decoder.
pub fn convert_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &ConvertConfig,
) -> Result<ConversionReport, ConvertError> {
    Converter::new(FfmpegDecoder::new(), config.clone()).convert_file(input, output)
}
