//! Refuses to convert inside protected system directories.
//!
//! Runs before discovery, so a blocked run creates no `output` folder.

use std::path::{Path, PathBuf};
use thiserror::Error;

const DANGEROUS_DIRS: &[&str] = &[
    "/",
    "/System",
    "/usr",
    "/bin",
    "/sbin",
    "/etc",
    "/var",
    "/private",
    "/Library",
    "/Applications",
    "/Users",
    "/home",
    "/root",
    "/boot",
    "/dev",
    "/proc",
    "/sys",
    "/tmp",
    "/opt",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SafetyError {
    #[error("Refusing to convert inside protected system directory '{}'", .0.display())]
    SystemDirectory(PathBuf),

    #[error("Refusing to convert at home directory root '{}'; pick a subfolder", .0.display())]
    HomeRoot(PathBuf),
}

pub fn check_dangerous_directory(path: &Path) -> Result<(), SafetyError> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

    for candidate in [path, canonical.as_path()] {
        if DANGEROUS_DIRS.iter().any(|d| candidate == Path::new(d)) {
            return Err(SafetyError::SystemDirectory(candidate.to_path_buf()));
        }
    }

    let path_str = canonical.to_string_lossy();
    if canonical.components().count() <= 3
        && (path_str.starts_with("/Users/") || path_str.starts_with("/home/"))
    {
        return Err(SafetyError::HomeRoot(canonical));
    }

    Ok(())
}
