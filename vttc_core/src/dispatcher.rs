//! Conversion Dispatcher
//!
//! Runs every [`WorkItem`] of a [`Batch`] on a bounded rayon pool and joins
//! them all before reporting. Items are independent: each owns its output
//! path, and a failing item is recorded without touching its siblings.
//!
//! - Image items: decode, downscale when either side exceeds
//!   [`MAX_IMAGE_DIMENSION`], encode at the plan's quality scalar.
//! - Video/audio items: stream through the transcoder with the baseline
//!   streamable flags, the tier's bitrate flags and the target's codec flags.
//!
//! A failed item's partially written output is removed.

use crate::batch::{Batch, BatchResult};
use crate::discovery::WorkItem;
use crate::errors::{ConversionError, DispatchError};
use crate::formats::{EncodingPlan, MediaClass};
use crate::image_backend::{ImageBackend, MAX_IMAGE_DIMENSION};
use crate::thread_manager::WorkerLimits;
use crate::transcode::{TranscodeBackend, STREAMABLE_OUTPUT_FLAGS};
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Byte sizes of one successful conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemSizes {
    pub input: u64,
    pub output: u64,
}

pub struct Dispatcher<I, T> {
    image: I,
    transcoder: T,
    limits: WorkerLimits,
}

impl<I, T> Dispatcher<I, T>
where
    I: ImageBackend,
    T: TranscodeBackend,
{
    pub fn new(image: I, transcoder: T, limits: WorkerLimits) -> Self {
        Self {
            image,
            transcoder,
            limits,
        }
    }

    pub fn limits(&self) -> WorkerLimits {
        self.limits
    }

    pub fn run(&self, batch: &Batch) -> Result<BatchResult, DispatchError> {
        self.run_with(batch, |_, _| {})
    }

    /// Like [`Dispatcher::run`], calling `on_item` from the worker as each item finishes.
    pub fn run_with<F>(&self, batch: &Batch, on_item: F) -> Result<BatchResult, DispatchError>
    where
        F: Fn(&WorkItem, Option<&ConversionError>) + Sync,
    {
        let mut result = BatchResult::new();
        if batch.is_empty() {
            return Ok(result);
        }

        let plan = batch.plan();
        let workers = self.limits.pool_size(plan.media_class(), batch.len());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("vttc-worker-{}", i))
            .build()?;

        info!(
            items = batch.len(),
            workers,
            target = plan.target_format(),
            quality = %plan.quality_tier(),
            media_class = %plan.media_class(),
            "Starting batch"
        );
        let start = Instant::now();

        let outcomes: Vec<Result<ItemSizes, ConversionError>> = pool.install(|| {
            batch
                .items()
                .par_iter()
                .map(|item| {
                    let outcome = self.convert_item(plan, item);
                    on_item(item, outcome.as_ref().err());
                    outcome
                })
                .collect()
        });

        for (item, outcome) in batch.items().iter().zip(outcomes) {
            match outcome {
                Ok(sizes) => result.success(sizes.input, sizes.output),
                Err(e) => {
                    error!(
                        input = %item.input_path().display(),
                        error = %e,
                        "Conversion failed"
                    );
                    result.fail(item, e.to_string());
                }
            }
        }

        info!(
            attempted = result.attempted,
            succeeded = result.succeeded,
            failed = result.failed,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Batch finished"
        );

        Ok(result)
    }

    /// Convert a single item, removing its output again if anything fails.
    pub fn convert_item(
        &self,
        plan: &EncodingPlan,
        item: &WorkItem,
    ) -> Result<ItemSizes, ConversionError> {
        debug!(
            input = %item.input_path().display(),
            output = %item.output_path().display(),
            "Converting"
        );

        let converted = match plan.media_class() {
            MediaClass::Image => self.convert_image(plan, item),
            MediaClass::Video | MediaClass::Audio => self.transcode_item(plan, item),
        };

        match converted {
            Ok(()) => Ok(ItemSizes {
                input: file_size(item.input_path()),
                output: file_size(item.output_path()),
            }),
            Err(e) => {
                remove_partial_output(item.output_path());
                Err(e)
            }
        }
    }

    fn convert_image(&self, plan: &EncodingPlan, item: &WorkItem) -> Result<(), ConversionError> {
        let quality = plan
            .quality()
            .scalar()
            .ok_or(ConversionError::PlanMismatch("image quality"))?;

        let handle = self.image.decode(item.input_path())?;
        let dimensions = self.image.metadata(&handle);

        let handle = if dimensions.exceeds(MAX_IMAGE_DIMENSION) {
            info!(
                input = %item.input_path().display(),
                original = %dimensions,
                max_edge = MAX_IMAGE_DIMENSION,
                "Image downscaled for compatibility"
            );
            self.image.resize(handle, MAX_IMAGE_DIMENSION)?
        } else {
            handle
        };

        self.image
            .encode(&handle, plan.target_format(), quality, item.output_path())
    }

    fn transcode_item(&self, plan: &EncodingPlan, item: &WorkItem) -> Result<(), ConversionError> {
        let flags = transcode_flags(plan)?;

        let file =
            File::create(item.output_path()).map_err(|e| ConversionError::io(item.output_path(), e))?;
        let mut writer = BufWriter::new(file);
        self.transcoder
            .transcode(item.input_path(), &mut writer, plan.target_format(), &flags)?;
        writer
            .flush()
            .map_err(|e| ConversionError::io(item.output_path(), e))
    }
}

/// Baseline streamable flags, then the tier's bitrate flags, then the target's codec flags.
pub fn transcode_flags(plan: &EncodingPlan) -> Result<Vec<String>, ConversionError> {
    let quality = plan
        .quality()
        .flags()
        .ok_or(ConversionError::PlanMismatch("transcode"))?;

    Ok(STREAMABLE_OUTPUT_FLAGS
        .iter()
        .map(|f| f.to_string())
        .chain(quality.iter().cloned())
        .chain(plan.extra_flags().iter().cloned())
        .collect())
}

fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

fn remove_partial_output(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove partial output"),
    }
}
