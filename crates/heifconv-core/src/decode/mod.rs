//! Tile decoding for grid images.
//!
//! This module provides functionality for:
//! - Driving a bitstream decoder through the [`HevcDecoder`] / [`DecodeSession`] seam
//! - Converting planar YCbCr frames into interleaved RGB ([`ColorConverter`])
//! - Decoding one coded tile into an owned [`DecodedTile`] ([`decode_tile`])
//! - A subprocess backend built on the system `ffmpeg` ([`FfmpegDecoder`])
//!
//! # Concurrency
//!
//! Decoders are `Send + Sync` factories; every call to [`decode_tile`] opens
//! and drops its own session. [`ColorConverter`] carries mutable scratch
//! state and is owned by exactly one task at a time.
//!
//! # Examples
//!
//! ```ignore
//! use heifconv_core::decode::{decode_tile, ColorConverter, FfmpegDecoder};
//!
//! let decoder = FfmpegDecoder::new();
//! let mut converter = ColorConverter::default();
//! let tile = decode_tile(&decoder, tile_item, &mut converter)?;
//! println!("Decoded {}x{} tile", tile.width, tile.height);
//! ```

mod backend;
mod color;
mod ffmpeg;
mod tile;
mod types;

pub use backend::{DecodeSession, HevcDecoder};
pub use color::{ColorConverter, ColorMatrix, ColorParams};
pub use ffmpeg::{parse_y4m, FfmpegDecoder};
pub use tile::{check_tile_size, decode_tile};
pub use types::{ChromaFormat, DecodeError, DecodedTile, PlanarFrame};
