//! Worker pool sizing
//!
//! CPU cores are treated as a fixed budget with a small reserve left for the
//! OS and the terminal. Image work runs in-process and scales with cores;
//! every transcode spawns an ffmpeg that is itself multi-threaded, so only a
//! few run at once.

use crate::formats::MediaClass;

/// Upper bound on concurrent transcodes picked by [`WorkerLimits::detect`].
const MAX_DEFAULT_TRANSCODES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerLimits {
    pub image: usize,
    pub transcode: usize,
}

impl WorkerLimits {
    /// Limits derived from the host's core count.
    pub fn detect() -> Self {
        Self::for_cores(num_cpus::get())
    }

    pub fn for_cores(total_cores: usize) -> Self {
        let available = available_cores(total_cores);
        // Each ffmpeg wants a few cores of its own.
        let transcode = if available >= 8 {
            MAX_DEFAULT_TRANSCODES
        } else {
            1
        };

        Self {
            image: available,
            transcode,
        }
    }

    pub fn with_image(mut self, workers: usize) -> Self {
        self.image = workers.max(1);
        self
    }

    pub fn with_transcode(mut self, workers: usize) -> Self {
        self.transcode = workers.max(1);
        self
    }

    pub fn for_class(&self, class: MediaClass) -> usize {
        match class {
            MediaClass::Image => self.image,
            MediaClass::Video | MediaClass::Audio => self.transcode,
        }
    }

    /// Pool size for a batch: never more workers than items, never zero.
    pub fn pool_size(&self, class: MediaClass, items: usize) -> usize {
        self.for_class(class).min(items).max(1)
    }
}

impl Default for WorkerLimits {
    fn default() -> Self {
        Self::detect()
    }
}

/// Cores left after reserving 20% (at least 1, at most 2) for the system.
fn available_cores(total_cores: usize) -> usize {
    let reserved = ((total_cores as f64 * 0.2).ceil() as usize).clamp(1, 2);
    total_cores.saturating_sub(reserved).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_is_positive() {
        let limits = WorkerLimits::detect();
        assert!(limits.image >= 1);
        assert!(limits.transcode >= 1);
        assert!(limits.transcode <= MAX_DEFAULT_TRANSCODES);
    }

    #[test]
    fn test_available_cores_reserve() {
        assert_eq!(available_cores(1), 1);
        assert_eq!(available_cores(2), 1);
        assert_eq!(available_cores(4), 3);
        assert_eq!(available_cores(10), 8);
        assert_eq!(available_cores(64), 62);
    }

    #[test]
    fn test_for_cores() {
        assert_eq!(
            WorkerLimits::for_cores(4),
            WorkerLimits {
                image: 3,
                transcode: 1
            }
        );
        assert_eq!(
            WorkerLimits::for_cores(16),
            WorkerLimits {
                image: 14,
                transcode: 2
            }
        );
    }

    #[test]
    fn test_overrides_are_clamped() {
        let limits = WorkerLimits::for_cores(8).with_image(0).with_transcode(0);
        assert_eq!(limits.image, 1);
        assert_eq!(limits.transcode, 1);

        let limits = WorkerLimits::for_cores(8).with_transcode(5);
        assert_eq!(limits.for_class(MediaClass::Audio), 5);
        assert_eq!(limits.for_class(MediaClass::Video), 5);
        assert_eq!(limits.for_class(MediaClass::Image), 6);
    }

    #[test]
    fn test_pool_size_bounded_by_items() {
        let limits = WorkerLimits {
            image: 8,
            transcode: 2,
        };
        assert_eq!(limits.pool_size(MediaClass::Image, 3), 3);
        assert_eq!(limits.pool_size(MediaClass::Image, 100), 8);
        assert_eq!(limits.pool_size(MediaClass::Video, 100), 2);
        assert_eq!(limits.pool_size(MediaClass::Audio, 0), 1);
    }
}
