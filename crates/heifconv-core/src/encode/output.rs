//! Raster serialization to the output formats.
//!
//! Every format is encoded fully in memory with the `image` crate's encoders;
//! the output file is only created once encoding has succeeded. Orientation
//! is baked into the pixels before this stage, so no format carries an
//! orientation tag (readers assume 1).

use std::fmt;
use std::io::{Cursor, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::pnm::{PnmEncoder, PnmSubtype, SampleEncoding};
use image::codecs::tiff::TiffEncoder;
use image::{ExtendedColorType, ImageEncoder};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use super::EncodeError;
use crate::grid::Canvas;

/// Default JPEG quality.
pub const DEFAULT_QUALITY: u8 = 90;

/// Output container, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Jpeg,
    Png,
    Tiff,
    Ppm,
}

impl OutputFormat {
    /// Map a path's extension (case-insensitive) to a format.
    ///
    /// # Errors
    ///
    /// `EncodeError::UnsupportedOutputFormat` for any other or missing extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, EncodeError> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match ext.as_deref() {
            Some("jpg" | "jpeg") => Ok(OutputFormat::Jpeg),
            Some("png") => Ok(OutputFormat::Png),
            Some("tif" | "tiff") => Ok(OutputFormat::Tiff),
            Some("ppm") => Ok(OutputFormat::Ppm),
            _ => Err(EncodeError::UnsupportedOutputFormat {
                path: path.display().to_string(),
            }),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Jpeg => "JPEG",
            OutputFormat::Png => "PNG",
            OutputFormat::Tiff => "TIFF",
            OutputFormat::Ppm => "PPM",
        };
        f.write_str(name)
    }
}

/// Encode a canvas into `format`. `quality` (clamped to 1-100) only affects JPEG.
pub fn encode(canvas: &Canvas, format: OutputFormat, quality: u8) -> Result<Vec<u8>, EncodeError> {
    encode_pixels(&canvas.pixels, canvas.width, canvas.height, format, quality)
}

/// Encode a canvas and write it to `path`, picking the format from the extension.
///
/// Nothing is written unless encoding succeeds. The bytes are staged in a
/// temporary file next to `path` and renamed over it.
pub fn save(canvas: &Canvas, path: impl AsRef<Path>, quality: u8) -> Result<usize, EncodeError> {
    let path = path.as_ref();
    let format = OutputFormat::from_path(path)?;
    let bytes = encode(canvas, format, quality)?;
    write_replacing(path, &bytes)?;
    debug!(path = %path.display(), %format, bytes = bytes.len(), "wrote output");
    Ok(bytes.len())
}

fn write_replacing(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(bytes)?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn encode_pixels(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: OutputFormat,
    quality: u8,
) -> Result<Vec<u8>, EncodeError> {
    validate(pixels, width, height)?;

    let mut buffer = Cursor::new(Vec::new());
    let color = ExtendedColorType::Rgb8;
    let result = match format {
        OutputFormat::Jpeg => JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
            .write_image(pixels, width, height, color),
        OutputFormat::Png => PngEncoder::new(&mut buffer).write_image(pixels, width, height, color),
        OutputFormat::Tiff => {
            TiffEncoder::new(&mut buffer).write_image(pixels, width, height, color)
        }
        OutputFormat::Ppm => PnmEncoder::new(&mut buffer)
            .with_subtype(PnmSubtype::Pixmap(SampleEncoding::Binary))
            .write_image(pixels, width, height, color),
    };
    result.map_err(|e| EncodeError::EncodingFailed {
        format,
        reason: e.to_string(),
    })?;

    Ok(buffer.into_inner())
}

fn validate(pixels: &[u8], width: u32, height: u32) -> Result<(), EncodeError> {
    if width == 0 || height == 0 {
        return Err(EncodeError::InvalidDimensions { width, height });
    }

    let expected = (width as usize) * (height as usize) * 3;
    if pixels.len() != expected {
        return Err(EncodeError::InvalidPixelData {
            expected,
            actual: pixels.len(),
        });
    }
    Ok(())
}


// ============================================================================
// Property-Based Tests
// ============================================================================
