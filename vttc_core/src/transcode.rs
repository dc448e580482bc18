//! Audio/video transcoding backend
//!
//! [`FfmpegTranscoder`] runs one ffmpeg per item and streams the encoded
//! container from its stdout into the caller's writer, so output lands on disk
//! incrementally rather than after the whole encode.

use crate::errors::TranscodeError;
use crate::ffmpeg_process::{ffmpeg_failure, FfmpegProcess};
use crate::logging::log_external_tool;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;
use tracing::debug;

/// Fragmented MP4 layout; lets mp4 be written to a non-seekable pipe.
pub const STREAMABLE_OUTPUT_FLAGS: &[&str] = &[
    "-movflags",
    "+frag_keyframe+separate_moof+omit_tfhd_offset+empty_moov",
];

pub trait TranscodeBackend: Send + Sync {
    /// Transcode `input` into `container`, writing the stream to `output`.
    fn transcode(
        &self,
        input: &Path,
        output: &mut dyn Write,
        container: &str,
        flags: &[String],
    ) -> Result<(), TranscodeError>;
}

#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn is_available(&self) -> bool {
        which::which(&self.program).is_ok()
    }

    /// Resolve the executable, failing when it is not installed.
    pub fn ensure_available(&self) -> Result<PathBuf, TranscodeError> {
        which::which(&self.program).map_err(|e| {
            TranscodeError::new(format!(
                "{} not found ({}). Install ffmpeg or pass --ffmpeg <path>",
                self.program.display(),
                e
            ))
        })
    }

    fn build_args(input: &Path, container: &str, flags: &[String]) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-nostdin", "-i"]
            .iter()
            .map(OsString::from)
            .collect();
        args.push(input.as_os_str().to_os_string());
        args.extend(flags.iter().map(OsString::from));
        args.push(OsString::from("-f"));
        args.push(OsString::from(container));
        args.push(OsString::from("pipe:1"));
        args
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl TranscodeBackend for FfmpegTranscoder {
    fn transcode(
        &self,
        input: &Path,
        output: &mut dyn Write,
        container: &str,
        flags: &[String],
    ) -> Result<(), TranscodeError> {
        let args = Self::build_args(input, container, flags);
        let mut cmd = Command::new(&self.program);
        cmd.args(&args);

        let start = Instant::now();
        let mut process = FfmpegProcess::spawn(&mut cmd).map_err(|e| {
            TranscodeError::new(format!(
                "Failed to start {}: {:#}",
                self.program.display(),
                e
            ))
        })?;

        let copied = match process.take_stdout() {
            Some(mut stdout) => std::io::copy(&mut stdout, output).and_then(|n| {
                output.flush()?;
                Ok(n)
            }),
            None => Err(std::io::Error::other("ffmpeg stdout was not captured")),
        };

        if let Err(e) = &copied {
            // Nothing is reading the pipe any more; stop ffmpeg before waiting on it.
            let _ = process.kill();
            debug!(input = %input.display(), error = %e, "Output stream failed, ffmpeg killed");
        }

        let (status, stderr) = process
            .wait_with_output()
            .map_err(|e| TranscodeError::new(format!("{:#}", e)))?;
        log_external_tool(
            &self.program.to_string_lossy(),
            &args,
            &stderr,
            status.code(),
            start.elapsed(),
        );

        match copied {
            Err(e) => Err(TranscodeError {
                message: format!("Failed to write output stream: {}", e),
                stderr,
                exit_code: status.code(),
            }),
            Ok(_) if !status.success() => Err(ffmpeg_failure(status, stderr)),
            Ok(bytes) => {
                debug!(input = %input.display(), bytes, "Transcode finished");
                Ok(())
            }
        }
    }
}
