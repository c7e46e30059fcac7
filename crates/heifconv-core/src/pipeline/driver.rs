//! Conversion driver: grid resolution, tile decode, compositing, orientation, save.

use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::{ConvertConfig, ConvertMode, DecodeStrategy};
use crate::container::{ContainerReader, ContextId, HeifReader, ItemId};
use crate::decode::{
    check_tile_size, decode_tile, ColorConverter, ColorParams, DecodeError, DecodedTile,
    HevcDecoder,
};
use crate::encode::{self, OutputFormat};
use crate::grid::{self, Canvas, GridDescriptor, ResolvedGrid, TileItem};
use crate::metadata::{extract_exif, parse_orientation, Orientation};
use crate::transform;
use crate::ConvertError;

/// Observable states of one conversion, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineStage {
    Init,
    GridResolved,
    TilesDecoded,
    Composited,
    Oriented,
    Saved,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Init => "init",
            PipelineStage::GridResolved => "grid-resolved",
            PipelineStage::TilesDecoded => "tiles-decoded",
            PipelineStage::Composited => "composited",
            PipelineStage::Oriented => "oriented",
            PipelineStage::Saved => "saved",
        };
        f.write_str(name)
    }
}

/// Summary of a finished conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionReport {
    pub mode: ConvertMode,
    /// Grid geometry, as read from the container.
    pub grid: GridDescriptor,
    /// Number of coded items decoded (tiles, or 1 for a thumbnail).
    pub tile_count: usize,
    pub orientation: Orientation,
    /// Width of the written image, after orientation.
    pub output_width: u32,
    /// Height of the written image, after orientation.
    pub output_height: u32,
    /// Encoded size; zero until saved.
    pub output_bytes: usize,
    pub stage: PipelineStage,
    pub tile_decode_time: Duration,
    /// Compositing plus orientation.
    pub build_time: Duration,
    pub total_time: Duration,
}

/// Runs conversions with one decoder backend and one configuration.
#[derive(Debug, Clone)]
pub struct Converter<D> {
    decoder: D,
    config: ConvertConfig,
}

impl<D: HevcDecoder> Converter<D> {
    pub fn new(decoder: D, config: ConvertConfig) -> Self {
        Self { decoder, config }
    }

    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Convert a HEIF file on disk into `output`.
    ///
    /// The output format is checked before the input is even read.
    pub fn convert_file(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<ConversionReport, ConvertError> {
        let output = output.as_ref();
        OutputFormat::from_path(output)?;
        let reader = HeifReader::open(input)?;
        self.convert(&reader, output)
    }

    /// Convert from an open container into `output`.
    ///
    /// Nothing is written unless every stage succeeds.
    pub fn convert<R>(&self, reader: &R, output: &Path) -> Result<ConversionReport, ConvertError>
    where
        R: ContainerReader + ?Sized,
    {
        let started = Instant::now();
        OutputFormat::from_path(output)?;

        let (canvas, mut report) = self.render(reader)?;

        report.output_bytes = encode::save(&canvas, output, self.config.quality)?;
        advance(&mut report.stage, PipelineStage::Saved);

        report.total_time = started.elapsed();
        self.log_timings(&report);
        Ok(report)
    }

    /// Reconstruct the oriented raster without encoding it.
    pub fn render<R>(&self, reader: &R) -> Result<(Canvas, ConversionReport), ConvertError>
    where
        R: ContainerReader + ?Sized,
    {
        let started = Instant::now();
        let mut stage = PipelineStage::Init;
        let context = reader.context_id();

        let grid = grid::resolve(reader, context)?;
        let descriptor = grid.descriptor;
        advance(&mut stage, PipelineStage::GridResolved);
        self.log(format_args!(
            "Grid is {}x{} pixels in tiles {}x{}",
            descriptor.output_width, descriptor.output_height, descriptor.columns, descriptor.rows
        ));

        let orientation = self.orientation(reader, context, grid.grid_item_id);

        let decode_started = Instant::now();
        let (canvas, tile_count, tile_decode_time) = match self.config.mode {
            ConvertMode::Full => {
                let tiles = grid::fetch_tiles(reader, context, &grid)?;
                let tile_count = tiles.len();
                let color = self.color_params(reader, context, grid.first_tile_id)?;
                let expected = reader
                    .item_extents(context, grid.first_tile_id)?
                    .map(|e| (e.width, e.height));

                let decoded = self.decode_tiles(tiles, color, expected)?;
                advance(&mut stage, PipelineStage::TilesDecoded);
                let tile_decode_time = decode_started.elapsed();

                let canvas = grid::composite(
                    decoded,
                    descriptor.columns,
                    descriptor.output_width,
                    descriptor.output_height,
                )?;
                advance(&mut stage, PipelineStage::Composited);
                (canvas, tile_count, tile_decode_time)
            }
            ConvertMode::Thumbnail => {
                let canvas = self.decode_thumbnail(reader, context, &grid)?;
                advance(&mut stage, PipelineStage::TilesDecoded);
                let tile_decode_time = decode_started.elapsed();
                advance(&mut stage, PipelineStage::Composited);
                (canvas, 1, tile_decode_time)
            }
        };

        let canvas = transform::correct(canvas, orientation)?;
        advance(&mut stage, PipelineStage::Oriented);
        let build_time = decode_started.elapsed().saturating_sub(tile_decode_time);

        let report = ConversionReport {
            mode: self.config.mode,
            grid: descriptor,
            tile_count,
            orientation,
            output_width: canvas.width,
            output_height: canvas.height,
            output_bytes: 0,
            stage,
            tile_decode_time,
            build_time,
            total_time: started.elapsed(),
        };
        Ok((canvas, report))
    }

    /// Orientation from the grid's EXIF item; any failure means `Normal`.
    fn orientation<R>(&self, reader: &R, context: ContextId, item: ItemId) -> Orientation
    where
        R: ContainerReader + ?Sized,
    {
        match extract_exif(reader, context, item) {
            Ok(blob) => {
                let orientation = parse_orientation(&blob);
                debug!(item, %orientation, "exif orientation");
                orientation
            }
            Err(e) => {
                warn!(item, error = %e, "no usable EXIF, assuming normal orientation");
                Orientation::Normal
            }
        }
    }

    fn color_params<R>(
        &self,
        reader: &R,
        context: ContextId,
        item: ItemId,
    ) -> Result<ColorParams, ConvertError>
    where
        R: ContainerReader + ?Sized,
    {
        if let Some(color) = self.config.color {
            return Ok(color);
        }
        Ok(reader
            .item_color(context, item)?
            .map(|nclx| ColorParams::from_nclx(&nclx))
            .unwrap_or_default())
    }

    fn decode_thumbnail<R>(
        &self,
        reader: &R,
        context: ContextId,
        grid: &ResolvedGrid,
    ) -> Result<Canvas, ConvertError>
    where
        R: ContainerReader + ?Sized,
    {
        let id = grid.thumbnail()?;
        let tile = TileItem {
            id,
            order_index: 0,
            coded_payload: reader.item_data_with_decoder_parameters(context, id, None)?,
        };
        let color = self.color_params(reader, context, id)?;
        let expected = reader
            .item_extents(context, id)?
            .map(|e| (e.width, e.height));

        let decoded = decode_checked(&self.decoder, tile, &mut ColorConverter::new(color), expected)?;
        debug!(
            item = id,
            width = decoded.width,
            height = decoded.height,
            "decoded thumbnail"
        );
        Ok(Canvas::new(decoded.width, decoded.height, decoded.data))
    }

    /// Decode every tile, returning them in row-major order.
    fn decode_tiles(
        &self,
        tiles: Vec<TileItem>,
        color: ColorParams,
        expected: Option<(u32, u32)>,
    ) -> Result<Vec<DecodedTile>, ConvertError> {
        match self.config.decode {
            DecodeStrategy::Sequential => {
                let mut converter = ColorConverter::new(color);
                let decoded = tiles
                    .into_iter()
                    .map(|tile| decode_checked(&self.decoder, tile, &mut converter, expected))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(decoded)
            }
            DecodeStrategy::Parallel { threads } => {
                let decoder = &self.decoder;
                let run = move || decode_parallel(decoder, tiles, color, expected);
                let decoded = match threads {
                    Some(n) => rayon::ThreadPoolBuilder::new()
                        .num_threads(n)
                        .build()
                        .map_err(|e| ConvertError::ThreadPool(e.to_string()))?
                        .install(run)?,
                    None => run()?,
                };
                Ok(decoded)
            }
        }
    }

    fn log(&self, message: fmt::Arguments<'_>) {
        if self.config.verbose {
            info!("{}", message);
        } else {
            debug!("{}", message);
        }
    }

    fn log_timings(&self, report: &ConversionReport) {
        self.log(format_args!(
            "Export & encode tiles {}ms",
            report.tile_decode_time.as_millis()
        ));
        self.log(format_args!("Building image {}ms", report.build_time.as_millis()));
        self.log(format_args!("Total Time {}ms", report.total_time.as_millis()));
    }
}

/// Fan tiles out over the current rayon pool, one converter per worker,
/// then restore row-major order from each tile's index.
fn decode_parallel<D>(
    decoder: &D,
    tiles: Vec<TileItem>,
    color: ColorParams,
    expected: Option<(u32, u32)>,
) -> Result<Vec<DecodedTile>, DecodeError>
where
    D: HevcDecoder + ?Sized,
{
    let mut indexed = tiles
        .into_par_iter()
        .map_init(
            || ColorConverter::new(color),
            |converter, tile| {
                let index = tile.order_index;
                decode_checked(decoder, tile, converter, expected).map(|t| (index, t))
            },
        )
        .collect::<Result<Vec<_>, _>>()?;

    indexed.sort_unstable_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, tile)| tile).collect())
}

fn decode_checked<D>(
    decoder: &D,
    tile: TileItem,
    converter: &mut ColorConverter,
    expected: Option<(u32, u32)>,
) -> Result<DecodedTile, DecodeError>
where
    D: HevcDecoder + ?Sized,
{
    let id = tile.id;
    let decoded = decode_tile(decoder, tile, converter)?;
    if let Some(expected) = expected {
        check_tile_size(&decoded, id, expected)?;
    }
    Ok(decoded)
}

fn advance(stage: &mut PipelineStage, next: PipelineStage) {
    debug_assert!(next > *stage, "stage {next} cannot follow {stage}");
    debug!(from = %stage, to = %next, "pipeline stage");
    *stage = next;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        let stages = [
            PipelineStage::Init,
            PipelineStage::GridResolved,
            PipelineStage::TilesDecoded,
            PipelineStage::Composited,
            PipelineStage::Oriented,
            PipelineStage::Saved,
        ];
        assert!(stages.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(PipelineStage::TilesDecoded.to_string(), "tiles-decoded");
    }

    #[test]
    fn test_advance() {
        let mut stage = PipelineStage::Init;
        advance(&mut stage, PipelineStage::GridResolved);
        assert_eq!(stage, PipelineStage::GridResolved);
    }
}
