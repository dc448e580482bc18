//! Image decode/resize/encode backend
//!
//! [`ImageBackend`] is the seam the dispatcher converts images through.
//! [`ImageCrateBackend`] is the production adapter: the `image` crate for
//! decoding, PNG/JPEG/AVIF encoding and resizing, with ffmpeg covering the
//! two gaps the crate leaves (AVIF decoding and lossy WebP encoding).

use crate::errors::ConversionError;
use crate::ffmpeg_process::run_ffmpeg;
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Largest width or height written without downscaling.
pub const MAX_IMAGE_DIMENSION: u32 = 16384;

/// AVIF encoder speed (1 slowest .. 10 fastest).
const AVIF_SPEED: u8 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either side is strictly larger than `ceiling`.
    pub fn exceeds(&self, ceiling: u32) -> bool {
        self.width > ceiling || self.height > ceiling
    }

    pub fn longest_edge(&self) -> u32 {
        self.width.max(self.height)
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

pub trait ImageBackend: Send + Sync {
    /// Decoded image; owned by exactly one work item.
    type Handle: Send;

    fn decode(&self, path: &Path) -> Result<Self::Handle, ConversionError>;

    fn metadata(&self, handle: &Self::Handle) -> Dimensions;

    /// Downscale so the longest edge is at most `max_edge`, keeping aspect ratio.
    fn resize(&self, handle: Self::Handle, max_edge: u32) -> Result<Self::Handle, ConversionError>;

    /// Encode to `format` (a target extension) at `quality` (0-100) and write `output`.
    fn encode(
        &self,
        handle: &Self::Handle,
        format: &str,
        quality: u8,
        output: &Path,
    ) -> Result<(), ConversionError>;
}

/// Whether [`ImageCrateBackend`] shells out to ffmpeg to encode `format`.
pub fn encoder_uses_ffmpeg(format: &str) -> bool {
    format == "webp"
}

#[derive(Debug, Clone)]
pub struct ImageCrateBackend {
    ffmpeg: PathBuf,
}

impl ImageCrateBackend {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }

    fn decode_with_image_crate(&self, path: &Path) -> Result<DynamicImage, ConversionError> {
        let mut reader = image::ImageReader::open(path)
            .map_err(|e| ConversionError::io(path, e))?
            .with_guessed_format()
            .map_err(|e| ConversionError::io(path, e))?;
        reader.no_limits();
        reader
            .decode()
            .map_err(|e| ConversionError::Decode(format!("{}: {}", path.display(), e)))
    }

    /// AVIF inputs are decoded through ffmpeg into a scratch PNG.
    fn decode_with_ffmpeg(&self, path: &Path) -> Result<DynamicImage, ConversionError> {
        let scratch = scratch_png()?;
        run_ffmpeg(
            &self.ffmpeg,
            &[
                OsStr::new("-hide_banner"),
                OsStr::new("-nostdin"),
                OsStr::new("-y"),
                OsStr::new("-i"),
                path.as_os_str(),
                OsStr::new("-frames:v"),
                OsStr::new("1"),
                scratch.path().as_os_str(),
            ],
        )?;
        self.decode_with_image_crate(scratch.path())
    }

    /// The image crate only writes lossless WebP; lossy output goes through libwebp in ffmpeg.
    fn encode_webp(
        &self,
        image: &DynamicImage,
        quality: u8,
        output: &Path,
    ) -> Result<(), ConversionError> {
        let scratch = scratch_png()?;
        write_png(image, scratch.path())?;
        let quality = quality.to_string();
        run_ffmpeg(
            &self.ffmpeg,
            &[
                OsStr::new("-hide_banner"),
                OsStr::new("-nostdin"),
                OsStr::new("-y"),
                OsStr::new("-i"),
                scratch.path().as_os_str(),
                OsStr::new("-c:v"),
                OsStr::new("libwebp"),
                OsStr::new("-quality"),
                OsStr::new(&quality),
                output.as_os_str(),
            ],
        )?;
        Ok(())
    }
}

impl Default for ImageCrateBackend {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl ImageBackend for ImageCrateBackend {
    type Handle = DynamicImage;

    fn decode(&self, path: &Path) -> Result<DynamicImage, ConversionError> {
        let is_avif = path
            .extension()
            .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case("avif"));
        if is_avif {
            self.decode_with_ffmpeg(path)
        } else {
            self.decode_with_image_crate(path)
        }
    }

    fn metadata(&self, handle: &DynamicImage) -> Dimensions {
        Dimensions::new(handle.width(), handle.height())
    }

    fn resize(&self, handle: DynamicImage, max_edge: u32) -> Result<DynamicImage, ConversionError> {
        Ok(handle.resize(max_edge, max_edge, FilterType::Lanczos3))
    }

    fn encode(
        &self,
        handle: &DynamicImage,
        format: &str,
        quality: u8,
        output: &Path,
    ) -> Result<(), ConversionError> {
        debug!(format, quality, output = %output.display(), "Encoding image");
        match format {
            "webp" => self.encode_webp(handle, quality, output),
            "png" => write_png(handle, output),
            "jpg" | "jpeg" | "jfif" => write_encoded(output, format, |w| {
                let rgb = DynamicImage::ImageRgb8(handle.to_rgb8());
                rgb.write_with_encoder(JpegEncoder::new_with_quality(w, quality))
            }),
            "avif" => write_encoded(output, format, |w| {
                let rgba = DynamicImage::ImageRgba8(handle.to_rgba8());
                rgba.write_with_encoder(AvifEncoder::new_with_speed_quality(
                    w, AVIF_SPEED, quality,
                ))
            }),
            other => Err(ConversionError::Encode {
                format: other.to_string(),
                message: "not an image target".to_string(),
            }),
        }
    }
}

fn write_png(image: &DynamicImage, output: &Path) -> Result<(), ConversionError> {
    write_encoded(output, "png", |w| {
        let normalized = if image.color().has_alpha() {
            DynamicImage::ImageRgba8(image.to_rgba8())
        } else {
            DynamicImage::ImageRgb8(image.to_rgb8())
        };
        normalized.write_with_encoder(PngEncoder::new(w))
    })
}

/// Create `output`, hand a buffered writer to `encode`, then flush.
fn write_encoded<F>(output: &Path, format: &str, encode: F) -> Result<(), ConversionError>
where
    F: FnOnce(&mut BufWriter<File>) -> image::ImageResult<()>,
{
    let file = File::create(output).map_err(|e| ConversionError::io(output, e))?;
    let mut writer = BufWriter::new(file);
    encode(&mut writer).map_err(|e| ConversionError::Encode {
        format: format.to_string(),
        message: e.to_string(),
    })?;
    writer.flush().map_err(|e| ConversionError::io(output, e))
}

fn scratch_png() -> Result<tempfile::NamedTempFile, ConversionError> {
    tempfile::Builder::new()
        .prefix("vttc-")
        .suffix(".png")
        .tempfile()
        .map_err(|e| ConversionError::io(std::env::temp_dir(), e))
}
