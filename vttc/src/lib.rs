//! vttc - batch convert a folder of images, videos and audio into one format
//!
//! ```rust,ignore
//! use vttc::conversion_api::{run, ConversionRequest, RunSettings};
//! use vttc_core::QualityTier;
//!
//! let request = ConversionRequest {
//!     input: "./holiday".into(),
//!     format: "webp".to_string(),
//!     quality: QualityTier::Mid,
//! };
//! let outcome = run(&request, &RunSettings::default())?;
//! ```

pub mod conversion_api;
pub mod prompts;

pub use conversion_api::{run, ConversionRequest, RunOutcome, RunSettings};
