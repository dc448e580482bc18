//! Conversion API
//!
//! One run from user choices to a finished batch:
//! resolve → safety check → ffmpeg preflight → discover → dispatch.
//!
//! The outcomes a user should see as "nothing to do" (unknown format, no
//! matching files) come back as [`RunOutcome`] variants; everything that
//! stops the run for real is an error.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;
use vttc_core::{
    check_dangerous_directory, discover, encoder_uses_ffmpeg, resolve, summary_line, Batch,
    BatchResult, DiscoveryError, Dispatcher, EncodingPlan, FfmpegTranscoder, ImageCrateBackend,
    QualityTier, ResolveError, WorkerLimits,
};

const SPINNER_TEMPLATE: &str = "{spinner:.cyan} {msg} [{pos}/{len}] {elapsed_precise}";

#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub input: PathBuf,
    pub format: String,
    pub quality: QualityTier,
}

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub limits: WorkerLimits,
    pub ffmpeg: PathBuf,
    pub show_progress: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            limits: WorkerLimits::detect(),
            ffmpeg: PathBuf::from("ffmpeg"),
            show_progress: true,
        }
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    /// The format is not one vttc converts to. Nothing was touched.
    UnknownFormat(ResolveError),
    NoCompatibleFiles {
        input: PathBuf,
        issues: Vec<DiscoveryError>,
    },
    Completed {
        plan: EncodingPlan,
        result: BatchResult,
        issues: Vec<DiscoveryError>,
        elapsed: Duration,
    },
}

impl RunOutcome {
    /// True when at least one item failed.
    pub fn has_failures(&self) -> bool {
        matches!(self, RunOutcome::Completed { result, .. } if result.has_failures())
    }
}

/// Whether converting to `plan` requires the ffmpeg executable.
pub fn needs_ffmpeg(plan: &EncodingPlan) -> bool {
    plan.media_class().is_transcoded() || encoder_uses_ffmpeg(plan.target_format())
}

pub fn run(request: &ConversionRequest, settings: &RunSettings) -> Result<RunOutcome> {
    let plan = match resolve(&request.format, request.quality) {
        Ok(plan) => plan,
        Err(e) => return Ok(RunOutcome::UnknownFormat(e)),
    };

    check_dangerous_directory(&request.input)?;

    let transcoder = FfmpegTranscoder::new(&settings.ffmpeg);
    if needs_ffmpeg(&plan) {
        let resolved = transcoder
            .ensure_available()
            .with_context(|| format!("{} conversion needs ffmpeg", plan.target_format()))?;
        info!(ffmpeg = %resolved.display(), "Using ffmpeg");
    }

    let found = discover(&request.input, &plan)
        .with_context(|| format!("Failed to scan {}", request.input.display()))?;

    if found.items.is_empty() {
        return Ok(RunOutcome::NoCompatibleFiles {
            input: request.input.clone(),
            issues: found.issues,
        });
    }

    let batch = Batch::new(plan, found.items);
    let dispatcher = Dispatcher::new(
        ImageCrateBackend::new(&settings.ffmpeg),
        transcoder,
        settings.limits,
    );

    let spinner = conversion_spinner(&batch, settings.show_progress)?;
    let start = Instant::now();
    let result = dispatcher.run_with(&batch, |_, _| spinner.inc(1))?;
    let elapsed = start.elapsed();
    spinner.finish_with_message(summary_line(&result));

    Ok(RunOutcome::Completed {
        plan: batch.plan().clone(),
        result,
        issues: found.issues,
        elapsed,
    })
}

fn conversion_spinner(batch: &Batch, visible: bool) -> Result<ProgressBar> {
    let spinner = ProgressBar::new(batch.len() as u64);
    if !visible {
        spinner.set_draw_target(ProgressDrawTarget::hidden());
        return Ok(spinner);
    }

    spinner.set_style(
        ProgressStyle::default_spinner()
            .template(SPINNER_TEMPLATE)
            .context("Invalid spinner template")?,
    );
    spinner.set_message(format!(
        "Converting {} file(s) into {}",
        batch.len(),
        batch.plan().target_format()
    ));
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}
