//! Conversion engine for vttc
//!
//! Converts every matching file under a folder into one target format:
//! - Format resolution (target + quality tier → encoding plan)
//! - File discovery with a mirrored `output/` tree
//! - Bounded, fail-isolated batch dispatch over image and ffmpeg backends
//! - Safety checks (dangerous directory detection)
//! - Logging and summary reporting

pub mod errors;
pub mod formats;
pub mod discovery;
pub mod batch;
pub mod dispatcher;
pub mod image_backend;
pub mod transcode;
pub mod ffmpeg_process;
pub mod thread_manager;
pub mod safety;
pub mod report;
pub mod logging;

pub use errors::{ConversionError, DiscoveryError, DispatchError, ResolveError, TranscodeError};
pub use formats::{
    resolve, supported_targets, EncodingPlan, MediaClass, QualityParameters, QualityTier,
};
pub use discovery::{discover, Discovered, WorkItem, OUTPUT_DIR_NAME};
pub use batch::{Batch, BatchResult, ItemFailure};
pub use dispatcher::{transcode_flags, Dispatcher};
pub use image_backend::{
    encoder_uses_ffmpeg, Dimensions, ImageBackend, ImageCrateBackend, MAX_IMAGE_DIMENSION,
};
pub use transcode::{FfmpegTranscoder, TranscodeBackend};
pub use thread_manager::WorkerLimits;
pub use safety::{check_dangerous_directory, SafetyError};
pub use report::{format_bytes, format_duration, print_summary_report, summary_line};
pub use logging::{init_logging, LogConfig};
