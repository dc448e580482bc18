//! File Discovery
//!
//! Walks an input folder, keeps files whose extension the [`EncodingPlan`]
//! accepts and pairs each with its mirrored path under `<root>/output`.
//!
//! - The walk is iterative (walkdir keeps its own stack of open directories),
//!   so deep trees do not grow the call stack.
//! - `<root>/output` is pruned from the walk, previous results are never
//!   picked up again.
//! - Output directories are created only for matching files, with
//!   `create_dir_all`, so existing directories and concurrent creation are fine.
//! - A directory that cannot be read or created is recorded and skipped; its
//!   siblings are still discovered. Only an unreadable root is fatal.
//! - Every output path belongs to exactly one input. When two inputs map to
//!   the same file (`a.jpg` and `a.png` both becoming `a.webp`), the first in
//!   walk order keeps it and the other is recorded as an issue.

use crate::errors::DiscoveryError;
use crate::formats::EncodingPlan;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const OUTPUT_DIR_NAME: &str = "output";

/// One input file and the path its conversion is written to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct WorkItem {
    input_path: PathBuf,
    output_path: PathBuf,
}

impl WorkItem {
    pub fn new(input_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
        }
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

/// Result of a discovery pass.
#[derive(Debug, Default)]
pub struct Discovered {
    /// Work items in walk order (entries sorted by file name).
    pub items: Vec<WorkItem>,
    /// Path-scoped problems that did not stop the walk.
    pub issues: Vec<DiscoveryError>,
}

pub fn output_root(input_root: &Path) -> PathBuf {
    input_root.join(OUTPUT_DIR_NAME)
}

/// Mirror `input_file` under `<input_root>/output`, swapping its extension
/// for `target_format`. Returns `None` when the file is not under the root.
pub fn mirrored_output_path(
    input_root: &Path,
    input_file: &Path,
    target_format: &str,
) -> Option<PathBuf> {
    let relative = input_file.strip_prefix(input_root).ok()?;
    if relative.as_os_str().is_empty() {
        return None;
    }
    Some(
        output_root(input_root)
            .join(relative)
            .with_extension(target_format),
    )
}

/// Discover every file under `input_root` the plan accepts.
///
/// The root is canonicalized first, so every returned path is absolute. An
/// empty result is not an error; nothing is written to disk in that case.
pub fn discover(input_root: &Path, plan: &EncodingPlan) -> Result<Discovered, DiscoveryError> {
    let metadata = fs::metadata(input_root).map_err(|source| DiscoveryError::UnreadableRoot {
        path: input_root.to_path_buf(),
        source,
    })?;
    if !metadata.is_dir() {
        return Err(DiscoveryError::NotADirectory(input_root.to_path_buf()));
    }

    let root = input_root
        .canonicalize()
        .map_err(|source| DiscoveryError::UnreadableRoot {
            path: input_root.to_path_buf(),
            source,
        })?;
    // walkdir reports an unreadable root as an ordinary entry error; check it here
    // so it is fatal rather than path-scoped.
    fs::read_dir(&root).map_err(|source| DiscoveryError::UnreadableRoot {
        path: root.clone(),
        source,
    })?;

    let out_root = output_root(&root);
    let mut discovered = Discovered::default();
    let mut ensured_dirs: HashSet<PathBuf> = HashSet::new();
    let mut failed_dirs: HashSet<PathBuf> = HashSet::new();
    let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();

    let walker = WalkDir::new(&root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.path() != out_root.as_path());

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.clone());
                warn!(path = %path.display(), error = %err, "Skipping unreadable entry");
                discovered.issues.push(DiscoveryError::UnreadableEntry {
                    path,
                    message: err.to_string(),
                });
                continue;
            }
        };

        if !entry.file_type().is_file() || !plan.accepts_path(entry.path()) {
            continue;
        }

        let input_path = entry.path();
        let Some(output_path) = mirrored_output_path(&root, input_path, plan.target_format())
        else {
            continue;
        };

        if let Some(first) = claimed.get(&output_path) {
            warn!(
                input = %input_path.display(),
                first = %first.display(),
                output = %output_path.display(),
                "Output path already taken, skipping"
            );
            discovered.issues.push(DiscoveryError::OutputCollision {
                path: output_path,
                first: first.clone(),
                second: input_path.to_path_buf(),
            });
            continue;
        }

        if let Some(parent) = output_path.parent() {
            if failed_dirs.contains(parent) {
                continue;
            }
            if !ensured_dirs.contains(parent) {
                match fs::create_dir_all(parent) {
                    Ok(()) => {
                        ensured_dirs.insert(parent.to_path_buf());
                    }
                    Err(source) => {
                        warn!(
                            path = %parent.display(),
                            error = %source,
                            "Cannot create output folder, skipping its files"
                        );
                        failed_dirs.insert(parent.to_path_buf());
                        discovered.issues.push(DiscoveryError::CreateOutputDir {
                            path: parent.to_path_buf(),
                            source,
                        });
                        continue;
                    }
                }
            }
        }

        debug!(
            input = %input_path.display(),
            output = %output_path.display(),
            "Discovered work item"
        );
        claimed.insert(output_path.clone(), input_path.to_path_buf());
        discovered
            .items
            .push(WorkItem::new(input_path.to_path_buf(), output_path));
    }

    info!(
        root = %root.display(),
        matched = discovered.items.len(),
        issues = discovered.issues.len(),
        media_class = %plan.media_class(),
        "Discovery finished"
    );

    Ok(discovered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::{resolve, QualityTier};
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    fn canonical(dir: &TempDir) -> PathBuf {
        dir.path().canonicalize().unwrap()
    }

    #[test]
    fn test_empty_directory_yields_nothing_and_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let plan = resolve("webp", QualityTier::Mid).unwrap();

        let found = discover(dir.path(), &plan).unwrap();

        assert!(found.items.is_empty());
        assert!(found.issues.is_empty());
        assert!(!dir.path().join(OUTPUT_DIR_NAME).exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_only_accepted_extensions_are_discovered() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.png");
        touch(dir.path(), "b.mp4");
        touch(dir.path(), "notes.txt");
        let plan = resolve("webp", QualityTier::Mid).unwrap();

        let found = discover(dir.path(), &plan).unwrap();
        let root = canonical(&dir);

        assert_eq!(
            found.items,
            vec![WorkItem::new(
                root.join("a.png"),
                root.join("output").join("a.webp")
            )]
        );
    }

    #[test]
    fn test_structure_is_mirrored_under_output() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "trips/2023/beach.JPG");
        touch(dir.path(), "trips/city.png");
        touch(dir.path(), "top.gif");
        let plan = resolve("avif", QualityTier::High).unwrap();

        let found = discover(dir.path(), &plan).unwrap();
        let root = canonical(&dir);

        let outputs: Vec<_> = found
            .items
            .iter()
            .map(|i| i.output_path().strip_prefix(root.join("output")).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            outputs,
            vec![
                PathBuf::from("top.avif"),
                PathBuf::from("trips/2023/beach.avif"),
                PathBuf::from("trips/city.avif"),
            ]
        );
        for item in &found.items {
            assert_eq!(item.output_path().extension().unwrap(), "avif");
            assert!(item.output_path().parent().unwrap().is_dir());
            let rel_in = item.input_path().strip_prefix(&root).unwrap();
            let rel_out = item.output_path().strip_prefix(root.join("output")).unwrap();
            assert_eq!(rel_in.parent(), rel_out.parent());
        }
    }

    #[test]
    fn test_output_tree_is_excluded() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "photo.png");
        touch(dir.path(), "output/photo.png");
        touch(dir.path(), "output/nested/old.jpg");
        let plan = resolve("png", QualityTier::Low).unwrap();

        let found = discover(dir.path(), &plan).unwrap();

        assert_eq!(found.items.len(), 1);
        assert_eq!(
            found.items[0].input_path(),
            canonical(&dir).join("photo.png")
        );
    }

    #[test]
    fn test_nested_output_named_folders_are_still_walked() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "project/output/frame.png");
        let plan = resolve("jpg", QualityTier::Mid).unwrap();

        let found = discover(dir.path(), &plan).unwrap();

        assert_eq!(found.items.len(), 1);
        assert_eq!(
            found.items[0].output_path(),
            canonical(&dir).join("output/project/output/frame.jpg")
        );
    }

    #[test]
    fn test_discovery_is_idempotent() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "x/clip.mov");
        touch(dir.path(), "song.wav");
        let plan = resolve("mp3", QualityTier::High).unwrap();

        let first = discover(dir.path(), &plan).unwrap();
        let second = discover(dir.path(), &plan).unwrap();

        assert!(first.issues.is_empty());
        assert!(second.issues.is_empty());
        assert_eq!(first.items, second.items);
        assert_eq!(first.items.len(), 2);
    }

    #[test]
    fn test_audio_target_picks_up_video_containers() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "clip.mov");
        let plan = resolve("mp3", QualityTier::High).unwrap();

        let found = discover(dir.path(), &plan).unwrap();

        assert_eq!(found.items.len(), 1);
        assert_eq!(
            found.items[0].output_path(),
            canonical(&dir).join("output").join("clip.mp3")
        );
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let plan = resolve("png", QualityTier::Mid).unwrap();

        let err = discover(&dir.path().join("nope"), &plan).unwrap_err();

        assert!(matches!(err, DiscoveryError::UnreadableRoot { .. }));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_file_root_is_rejected() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "single.png");
        let plan = resolve("png", QualityTier::Mid).unwrap();

        let err = discover(&dir.path().join("single.png"), &plan).unwrap_err();

        assert!(matches!(err, DiscoveryError::NotADirectory(_)));
    }

    #[test]
    fn test_blocked_output_dir_does_not_stop_siblings() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "blocked/a.png");
        touch(dir.path(), "open/b.png");
        // A regular file where the mirrored directory should go.
        touch(dir.path(), "output/blocked");
        let plan = resolve("webp", QualityTier::Mid).unwrap();

        let found = discover(dir.path(), &plan).unwrap();

        assert_eq!(found.items.len(), 1);
        assert!(found.items[0].input_path().ends_with("open/b.png"));
        assert_eq!(found.issues.len(), 1);
        assert!(matches!(
            found.issues[0],
            DiscoveryError::CreateOutputDir { .. }
        ));
        assert!(found.issues[0].path().ends_with("output/blocked"));
    }

    #[test]
    fn test_same_stem_inputs_do_not_share_an_output() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.jpg");
        touch(dir.path(), "a.png");
        touch(dir.path(), "b.png");
        touch(dir.path(), "nested/a.gif");
        let plan = resolve("webp", QualityTier::Mid).unwrap();

        let found = discover(dir.path(), &plan).unwrap();
        let root = canonical(&dir);

        let inputs: Vec<_> = found.items.iter().map(|i| i.input_path().to_path_buf()).collect();
        assert_eq!(
            inputs,
            vec![
                root.join("a.jpg"),
                root.join("b.png"),
                root.join("nested/a.gif")
            ]
        );
        let outputs: HashSet<_> = found.items.iter().map(|i| i.output_path()).collect();
        assert_eq!(outputs.len(), found.items.len());

        assert_eq!(found.issues.len(), 1);
        match &found.issues[0] {
            DiscoveryError::OutputCollision {
                path,
                first,
                second,
            } => {
                assert_eq!(path, &root.join("output/a.webp"));
                assert_eq!(first, &root.join("a.jpg"));
                assert_eq!(second, &root.join("a.png"));
            }
            other => panic!("unexpected issue: {:?}", other),
        }
    }

    #[test]
    fn test_mirrored_output_path() {
        let root = Path::new("/media/in");
        assert_eq!(
            mirrored_output_path(root, Path::new("/media/in/a/b/c.tar.gz"), "webm"),
            Some(PathBuf::from("/media/in/output/a/b/c.tar.webm"))
        );
        assert_eq!(
            mirrored_output_path(root, Path::new("/elsewhere/c.png"), "webp"),
            None
        );
        assert_eq!(mirrored_output_path(root, root, "webp"), None);
    }
}
