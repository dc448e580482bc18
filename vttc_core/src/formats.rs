//! Format Resolution
//!
//! Turns a target format and quality tier into an [`EncodingPlan`]: the media
//! class handling the run, the source extensions eligible for it, the encoder
//! parameters for the tier and any codec/container flags the target needs.
//!
//! Resolution is pure and happens before any filesystem access, so an unknown
//! format never leaves a half-created output tree behind.

use crate::errors::ResolveError;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub const IMAGE_EXTENSIONS: &[&str] = &[
    "avif", "gif", "jpeg", "jpg", "png", "tiff", "webp", "jfif",
];

pub const VIDEO_EXTENSIONS: &[&str] = &["avi", "m4v", "mkv", "mov", "mp4", "mpeg", "webm", "wmv"];

/// Audio-only containers. The audio class also accepts every video container,
/// since the soundtrack can be extracted from it.
pub const AUDIO_ONLY_EXTENSIONS: &[&str] = &["aac", "flac", "m4a", "mp3", "ogg", "wav"];

pub const IMAGE_TARGETS: &[&str] = &["webp", "png", "avif", "jpg", "jpeg", "jfif"];
pub const VIDEO_TARGETS: &[&str] = &["webm", "mp4"];
pub const AUDIO_TARGETS: &[&str] = &["mp3", "ogg"];

/// Audio bitrate shared by every video tier.
const VIDEO_AUDIO_BITRATE: &str = "96k";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaClass {
    Image,
    Video,
    Audio,
}

impl MediaClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaClass::Image => "image",
            MediaClass::Video => "video",
            MediaClass::Audio => "audio",
        }
    }

    /// Whether items of this class go through the transcoding backend.
    pub fn is_transcoded(&self) -> bool {
        !matches!(self, MediaClass::Image)
    }
}

impl fmt::Display for MediaClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    High,
    Mid,
    Low,
}

impl QualityTier {
    pub const ALL: [QualityTier; 3] = [QualityTier::High, QualityTier::Mid, QualityTier::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::High => "high",
            QualityTier::Mid => "mid",
            QualityTier::Low => "low",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityTier {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(QualityTier::High),
            "mid" => Ok(QualityTier::Mid),
            "low" => Ok(QualityTier::Low),
            _ => Err(ResolveError::UnknownQuality(s.to_string())),
        }
    }
}

/// Encoder parameters for one tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityParameters {
    /// Image quality scalar, 0-100.
    Scalar(u8),
    /// Ordered bitrate flags for the transcoder.
    Flags(Vec<String>),
}

impl QualityParameters {
    pub fn scalar(&self) -> Option<u8> {
        match self {
            QualityParameters::Scalar(q) => Some(*q),
            QualityParameters::Flags(_) => None,
        }
    }

    pub fn flags(&self) -> Option<&[String]> {
        match self {
            QualityParameters::Scalar(_) => None,
            QualityParameters::Flags(flags) => Some(flags),
        }
    }
}

/// Immutable description of how one run converts its inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodingPlan {
    target_format: String,
    quality_tier: QualityTier,
    media_class: MediaClass,
    accepted_extensions: BTreeSet<&'static str>,
    quality: QualityParameters,
    extra_flags: Vec<String>,
}

impl EncodingPlan {
    pub fn target_format(&self) -> &str {
        &self.target_format
    }

    pub fn quality_tier(&self) -> QualityTier {
        self.quality_tier
    }

    pub fn media_class(&self) -> MediaClass {
        self.media_class
    }

    pub fn accepted_extensions(&self) -> &BTreeSet<&'static str> {
        &self.accepted_extensions
    }

    pub fn quality(&self) -> &QualityParameters {
        &self.quality
    }

    pub fn extra_flags(&self) -> &[String] {
        &self.extra_flags
    }

    /// Case-insensitive check of a bare extension (no leading dot).
    pub fn accepts_extension(&self, ext: &str) -> bool {
        self.accepted_extensions
            .contains(ext.to_ascii_lowercase().as_str())
    }

    pub fn accepts_path(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.accepts_extension(e))
    }
}

/// Every target format the resolver knows, in menu order.
pub fn supported_targets() -> impl Iterator<Item = &'static str> {
    IMAGE_TARGETS
        .iter()
        .chain(VIDEO_TARGETS)
        .chain(AUDIO_TARGETS)
        .copied()
}

pub fn media_class_for(target_format: &str) -> Option<MediaClass> {
    if IMAGE_TARGETS.contains(&target_format) {
        Some(MediaClass::Image)
    } else if VIDEO_TARGETS.contains(&target_format) {
        Some(MediaClass::Video)
    } else if AUDIO_TARGETS.contains(&target_format) {
        Some(MediaClass::Audio)
    } else {
        None
    }
}

/// Resolve a target format and tier into an [`EncodingPlan`].
///
/// The format is matched after trimming and lowercasing; anything outside the
/// fixed tables is a [`ResolveError::UnknownFormat`].
pub fn resolve(target_format: &str, tier: QualityTier) -> Result<EncodingPlan, ResolveError> {
    let target = target_format.trim().to_ascii_lowercase();
    let media_class = media_class_for(&target)
        .ok_or_else(|| ResolveError::UnknownFormat(target_format.to_string()))?;

    let accepted_extensions: BTreeSet<&'static str> = match media_class {
        MediaClass::Image => IMAGE_EXTENSIONS.iter().copied().collect(),
        MediaClass::Video => VIDEO_EXTENSIONS.iter().copied().collect(),
        MediaClass::Audio => VIDEO_EXTENSIONS
            .iter()
            .chain(AUDIO_ONLY_EXTENSIONS)
            .copied()
            .collect(),
    };

    let quality = match media_class {
        MediaClass::Image => QualityParameters::Scalar(image_quality(tier)),
        MediaClass::Video => QualityParameters::Flags(to_flags(&[
            "-b:v",
            video_bitrate(tier),
            "-b:a",
            VIDEO_AUDIO_BITRATE,
        ])),
        MediaClass::Audio => QualityParameters::Flags(to_flags(&["-b:a", audio_bitrate(tier)])),
    };

    let extra_flags = to_flags(extra_flags_for(&target));

    Ok(EncodingPlan {
        target_format: target,
        quality_tier: tier,
        media_class,
        accepted_extensions,
        quality,
        extra_flags,
    })
}

fn image_quality(tier: QualityTier) -> u8 {
    match tier {
        QualityTier::High => 90,
        QualityTier::Mid => 80,
        QualityTier::Low => 60,
    }
}

fn video_bitrate(tier: QualityTier) -> &'static str {
    match tier {
        QualityTier::High => "2M",
        QualityTier::Mid => "1M",
        QualityTier::Low => "512k",
    }
}

fn audio_bitrate(tier: QualityTier) -> &'static str {
    match tier {
        QualityTier::High => "160k",
        QualityTier::Mid => "128k",
        QualityTier::Low => "96k",
    }
}

fn extra_flags_for(target: &str) -> &'static [&'static str] {
    match target {
        "webm" => &["-c:v", "libvpx-vp9", "-c:a", "libopus", "-row-mt", "1"],
        "mp4" => &["-c:a", "libopus"],
        "ogg" => &["-vn", "-c:a", "libopus"],
        "mp3" => &["-vn"],
        _ => &[],
    }
}

fn to_flags(flags: &[&str]) -> Vec<String> {
    flags.iter().map(|f| f.to_string()).collect()
}
