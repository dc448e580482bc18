//! FFmpeg process management
//!
//! When stdout carries the encoded stream and stderr is also piped, ffmpeg can
//! fill the stderr pipe (64KB on most systems) while we are blocked reading
//! stdout. Both sides then wait on each other forever. [`FfmpegProcess`] drains
//! stderr on its own thread so stdout can be read to completion.
//!
//! ```ignore
//! use vttc_core::ffmpeg_process::FfmpegProcess;
//! use std::process::Command;
//!
//! let mut cmd = Command::new("ffmpeg");
//! cmd.args(["-i", "input.mov", "-f", "mp3", "pipe:1"]);
//!
//! let mut process = FfmpegProcess::spawn(&mut cmd)?;
//! let mut stdout = process.take_stdout().unwrap();
//! std::io::copy(&mut stdout, &mut out_file)?;
//! let (status, stderr) = process.wait_with_output()?;
//! ```

use crate::errors::TranscodeError;
use anyhow::{Context, Result};
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, ExitStatus, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, info};

pub struct FfmpegProcess {
    child: Child,
    stderr_thread: Option<JoinHandle<String>>,
}

impl FfmpegProcess {
    /// Spawn `cmd` with piped stdout/stderr and start draining stderr.
    pub fn spawn(cmd: &mut Command) -> Result<Self> {
        debug!(command = ?cmd, "Executing FFmpeg command");

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().context("Failed to spawn FFmpeg process")?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow::anyhow!("Failed to capture FFmpeg stderr"))?;

        let stderr_thread = thread::spawn(move || {
            let mut buf = String::new();
            let reader = BufReader::new(stderr);
            for line in reader.lines().map_while(std::result::Result::ok) {
                buf.push_str(&line);
                buf.push('\n');
            }
            buf
        });

        Ok(Self {
            child,
            stderr_thread: Some(stderr_thread),
        })
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Wait for exit and collect everything written to stderr.
    pub fn wait_with_output(mut self) -> Result<(ExitStatus, String)> {
        let status = self.child.wait().context("Failed to wait for FFmpeg")?;
        let stderr = self
            .stderr_thread
            .take()
            .map(|t| t.join().unwrap_or_default())
            .unwrap_or_default();

        if status.success() {
            debug!(exit_code = status.code(), "FFmpeg process completed");
        } else {
            error!(
                exit_code = status.code(),
                stderr_output = %stderr,
                "FFmpeg process failed"
            );
        }

        Ok((status, stderr))
    }

    pub fn kill(&mut self) -> Result<()> {
        self.child.kill().context("Failed to kill FFmpeg process")
    }
}

/// Pick the most meaningful line out of ffmpeg's stderr.
///
/// Prefers the last line mentioning an error, then the last line that is not
/// progress output.
pub fn format_ffmpeg_error(stderr: &str) -> String {
    if let Some(error_line) = stderr
        .lines()
        .rev()
        .find(|line| line.contains("Error") || line.contains("error"))
    {
        return error_line.trim().to_string();
    }

    stderr
        .lines()
        .rev()
        .find(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty()
                && !trimmed.starts_with("frame=")
                && !trimmed.starts_with("fps=")
                && !trimmed.starts_with("size=")
        })
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "Unknown FFmpeg error".to_string())
}

/// Build a [`TranscodeError`] from a finished ffmpeg invocation.
pub fn ffmpeg_failure(status: ExitStatus, stderr: String) -> TranscodeError {
    TranscodeError {
        message: format_ffmpeg_error(&stderr),
        exit_code: status.code(),
        stderr,
    }
}

/// Run ffmpeg to completion with captured output (no streaming).
pub fn run_ffmpeg(program: &Path, args: &[&std::ffi::OsStr]) -> Result<Output, TranscodeError> {
    let mut cmd = Command::new(program);
    cmd.args(args).stdin(Stdio::null());

    let start = Instant::now();
    let output = cmd.output().map_err(|e| {
        TranscodeError::new(format!(
            "Failed to execute {}: {}",
            program.display(),
            e
        ))
    })?;

    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    crate::logging::log_external_tool(
        &program.to_string_lossy(),
        args,
        &stderr,
        output.status.code(),
        start.elapsed(),
    );

    if !output.status.success() {
        return Err(ffmpeg_failure(output.status, stderr));
    }

    info!(exit_code = output.status.code(), "FFmpeg command completed");
    Ok(output)
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn progress_line() -> impl Strategy<Value = String> {
        (0u32..100_000, 0u32..1_000_000).prop_map(|(frame, size)| {
            format!("frame={:>5} fps=25.0 q=28.0 size={:>8}kB time=00:00:04.00", frame, size)
        })
    }

    proptest! {
        #[test]
        fn prop_progress_never_hides_the_last_message(
            message in "[a-z][a-z ':/.]{0,60}",
            progress in proptest::collection::vec(progress_line(), 0..6),
        ) {
            prop_assume!(!message.contains("error") && !message.trim().is_empty());
            let stderr = format!("{}\n{}\n", message, progress.join("\n"));
            prop_assert_eq!(format_ffmpeg_error(&stderr), message.trim());
        }

        #[test]
        fn prop_encoder_error_line_is_chosen(
            encoder in prop_oneof![Just("libopus"), Just("libvpx-vp9"), Just("libmp3lame"), Just("libwebp")],
            stream in 0u8..4,
            progress in proptest::collection::vec(progress_line(), 0..4),
        ) {
            let error_line = format!(
                "Error while opening encoder for output stream #0:{} ({})",
                stream, encoder
            );
            let stderr = format!(
                "{}\n{}\nConversion failed!\n",
                progress.join("\n"),
                error_line
            );
            prop_assert_eq!(format_ffmpeg_error(&stderr), error_line);
        }
    }
}
