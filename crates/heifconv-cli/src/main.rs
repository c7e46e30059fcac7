use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use heifconv_core::{
    ConversionReport, ConvertConfig, ConvertMode, Converter, FfmpegDecoder,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "heifconv",
    version,
    about = "Convert tiled HEIF/HEIC images to JPEG, PNG, TIFF or PPM"
)]
struct Args {
    /// Input HEIF/HEIC file
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output file; the extension picks the format (.jpg, .jpeg, .png, .tif, .tiff, .ppm)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Input and/or output given positionally
    #[arg(value_name = "PATH", num_args = 0..=2)]
    paths: Vec<PathBuf>,

    /// JPEG quality (1-100)
    #[arg(short, long, default_value_t = 90, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Print grid geometry and timings
    #[arg(short, long)]
    verbose: bool,

    /// Export the embedded thumbnail instead of the full image
    #[arg(short, long)]
    thumbnail: bool,

    /// Decode tiles in parallel
    #[arg(short, long)]
    parallel: bool,

    /// Worker threads for parallel decoding (default: one per core)
    #[arg(long, value_name = "N", requires = "parallel", value_parser = clap::value_parser!(usize))]
    threads: Option<usize>,

    /// ffmpeg executable used to decode HEVC tiles
    #[arg(long, value_name = "PATH", default_value = "ffmpeg")]
    ffmpeg: PathBuf,
}

impl Args {
    /// Resolve input and output from flags first, then positional paths.
    fn paths(&self) -> Result<(PathBuf, PathBuf)> {
        let mut positional = self.paths.iter().cloned();
        let input = self
            .input
            .clone()
            .or_else(|| positional.next())
            .context("missing input file (use -i FILE or a positional path)")?;
        let output = self
            .output
            .clone()
            .or_else(|| positional.next())
            .context("missing output file (use -o FILE or a positional path)")?;
        if positional.next().is_some() {
            bail!("too many paths given");
        }
        Ok((input, output))
    }

    fn config(&self) -> ConvertConfig {
        let mode = if self.thumbnail {
            ConvertMode::Thumbnail
        } else {
            ConvertMode::Full
        };
        let config = ConvertConfig::new()
            .with_quality(self.quality)
            .with_mode(mode)
            .with_verbose(self.verbose);
        if self.parallel {
            config.parallel(self.threads)
        } else {
            config
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("heifconv: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let (input, output) = args.paths()?;
    let config = args.config();
    info!(?config, input = %input.display(), output = %output.display(), "starting conversion");

    let converter = Converter::new(FfmpegDecoder::with_program(&args.ffmpeg), config);
    let report = converter
        .convert_file(&input, &output)
        .with_context(|| format!("failed to convert {}", input.display()))?;

    if args.verbose {
        for line in timing_lines(&report) {
            println!("{line}");
        }
    }
    info!(
        width = report.output_width,
        height = report.output_height,
        bytes = report.output_bytes,
        "wrote {}",
        output.display()
    );
    Ok(())
}

fn timing_lines(report: &ConversionReport) -> Vec<String> {
    let grid = &report.grid;
    let mut lines = vec![format!(
        "Grid is {}x{} pixels in tiles {}x{}",
        grid.output_width, grid.output_height, grid.columns, grid.rows
    )];
    if report.mode == ConvertMode::Thumbnail {
        lines.push(format!(
            "Thumbnail is {}x{} pixels",
            report.output_width, report.output_height
        ));
    }
    lines.push(format!(
        "Export & encode tiles {}ms",
        report.tile_decode_time.as_millis()
    ));
    lines.push(format!("Building image {}ms", report.build_time.as_millis()));
    lines.push(format!("Total Time {}ms", report.total_time.as_millis()));
    lines
}
