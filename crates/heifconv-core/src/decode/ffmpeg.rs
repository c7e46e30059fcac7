//! HEVC decoding through the system `ffmpeg` binary.
//!
//! Each session runs one `ffmpeg` process: the Annex-B access unit goes in on
//! stdin as a raw `hevc` elementary stream, and one frame comes back on stdout
//! as a `yuv4mpegpipe` stream in 8-bit `yuv420p`. `ffmpeg` must be on `PATH`
//! (or configured with [`FfmpegDecoder::with_program`]); a missing binary is a
//! [`DecodeError::Backend`] error, not a silent fallback.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use tracing::debug;

use super::{ChromaFormat, DecodeError, DecodeSession, HevcDecoder, PlanarFrame};

const Y4M_MAGIC: &[u8] = b"YUV4MPEG2";
const Y4M_FRAME: &[u8] = b"FRAME";

/// Decoder backend that shells out to `ffmpeg`.
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    program: PathBuf,
}

impl FfmpegDecoder {
    pub fn new() -> Self {
        Self::with_program("ffmpeg")
    }

    /// Use a specific `ffmpeg` executable.
    pub fn with_program(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for FfmpegDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl HevcDecoder for FfmpegDecoder {
    fn open(&self) -> Result<Box<dyn DecodeSession>, DecodeError> {
        Ok(Box::new(FfmpegSession {
            program: self.program.clone(),
            output: None,
        }))
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

struct FfmpegSession {
    program: PathBuf,
    output: Option<Vec<u8>>,
}

impl DecodeSession for FfmpegSession {
    fn submit(&mut self, access_unit: &[u8]) -> Result<(), DecodeError> {
        if access_unit.is_empty() {
            return Err(DecodeError::Submit("empty access unit".to_string()));
        }

        let mut child = Command::new(&self.program)
            .args(["-hide_banner", "-loglevel", "error", "-f", "hevc", "-i", "pipe:0"])
            .args(["-frames:v", "1", "-f", "yuv4mpegpipe", "-pix_fmt", "yuv420p"])
            .arg("pipe:1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => DecodeError::Backend(format!(
                    "'{}' not found; install ffmpeg or put it on PATH",
                    self.program.display()
                )),
                _ => DecodeError::Backend(format!("failed to start ffmpeg: {e}")),
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| DecodeError::Backend("ffmpeg stdin unavailable".to_string()))?;

        // Feed stdin from another thread so a full stdout pipe cannot deadlock us
        let input = access_unit.to_vec();
        let writer = thread::spawn(move || stdin.write_all(&input));

        let output = child
            .wait_with_output()
            .map_err(|e| DecodeError::Backend(format!("ffmpeg did not finish: {e}")))?;
        let write_result = writer
            .join()
            .map_err(|_| DecodeError::Backend("ffmpeg writer thread panicked".to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DecodeError::Submit(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        // Broken pipe after a successful exit just means ffmpeg stopped reading early
        if let Err(e) = write_result {
            if e.kind() != ErrorKind::BrokenPipe {
                return Err(DecodeError::Backend(format!("writing to ffmpeg: {e}")));
            }
        }

        debug!(
            input = access_unit.len(),
            output = output.stdout.len(),
            "ffmpeg decoded access unit"
        );
        self.output = Some(output.stdout);
        Ok(())
    }

    fn receive_frame(&mut self) -> Result<Option<PlanarFrame>, DecodeError> {
        match self.output.take() {
            Some(stream) => parse_y4m(&stream),
            None => Ok(None),
        }
    }
}

/// Parse the first frame of a YUV4MPEG2 stream.
///
/// Returns `Ok(None)` when the stream has a header but no frame.
pub fn parse_y4m(data: &[u8]) -> Result<Option<PlanarFrame>, DecodeError> {
    if data.is_empty() {
        return Ok(None);
    }

    let (header, rest) = split_line(data)
        .ok_or_else(|| DecodeError::InvalidFrame("unterminated y4m header".to_string()))?;
    let mut params = header.split(|&b| b == b' ');
    if params.next() != Some(Y4M_MAGIC) {
        return Err(DecodeError::InvalidFrame("missing YUV4MPEG2 magic".to_string()));
    }

    let mut width = None;
    let mut height = None;
    let mut chroma = ChromaFormat::Yuv420;
    for param in params.filter(|p| !p.is_empty()) {
        let value = std::str::from_utf8(&param[1..])
            .map_err(|_| DecodeError::InvalidFrame("non-ASCII y4m parameter".to_string()))?;
        match param[0] {
            b'W' => width = value.parse::<u32>().ok(),
            b'H' => height = value.parse::<u32>().ok(),
            b'C' => chroma = parse_colorspace(value)?,
            _ => {}
        }
    }

    let (width, height) = match (width, height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(DecodeError::InvalidFrame(
                "y4m header lacks frame size".to_string(),
            ))
        }
    };

    if rest.is_empty() {
        return Ok(None);
    }
    let (_, planes) = split_line(rest)
        .filter(|(line, _)| line.starts_with(Y4M_FRAME))
        .ok_or_else(|| DecodeError::InvalidFrame("missing FRAME marker".to_string()))?;

    let luma = width as usize * height as usize;
    let (cw, ch) = chroma.chroma_dimensions(width, height);
    let chroma_len = cw as usize * ch as usize;
    let needed = luma + 2 * chroma_len;
    if planes.len() < needed {
        return Err(DecodeError::InvalidFrame(format!(
            "frame holds {} bytes, {} needed",
            planes.len(),
            needed
        )));
    }

    Ok(Some(PlanarFrame {
        width,
        height,
        chroma,
        y: planes[..luma].to_vec(),
        cb: planes[luma..luma + chroma_len].to_vec(),
        cr: planes[luma + chroma_len..needed].to_vec(),
    }))
}

fn parse_colorspace(value: &str) -> Result<ChromaFormat, DecodeError> {
    // The 4:2:0 variants differ only in chroma siting
    match value {
        "420" | "420jpeg" | "420paldv" | "420mpeg2" => Ok(ChromaFormat::Yuv420),
        "422" => Ok(ChromaFormat::Yuv422),
        "444" => Ok(ChromaFormat::Yuv444),
        _ => Err(DecodeError::InvalidFrame(format!(
            "unsupported y4m colorspace C{value}"
        ))),
    }
}

fn split_line(data: &[u8]) -> Option<(&[u8], &[u8])> {
    let end = data.iter().position(|&b| b == b'\n')?;
    Some((&data[..end], &data[end + 1..]))
}
