//! Pipeline driver.
//!
//! Sequences one conversion through its stages:
//!
//! ```text
//! Init -> GridResolved -> TilesDecoded -> Composited -> Oriented -> Saved
//! ```
//!
//! Any fatal error ends the conversion before `Saved`, and the output file is
//! only created at that last step. Thumbnail mode decodes the grid's thumbnail
//! item in place of the tiles and skips compositing. Sequential and parallel
//! tile decoding differ only inside `TilesDecoded`.

mod config;
mod driver;

pub use config::{ConvertConfig, ConvertMode, DecodeStrategy};
pub use driver::{ConversionReport, Converter, PipelineStage};
