//! Recursive folder expansion for folder uploads.
//!
//! Every regular file below the selected folder becomes a [`FileWorkItem`]
//! whose `relative_path` starts with the folder's own name exactly once:
//! selecting `fw/` that holds `fw/sub/b.txt` yields `fw/sub/b.txt`, never
//! `fw/fw/sub/b.txt`. Entries that cannot be read, and symlinks, are skipped
//! and listed in [`WalkReport::skipped`]; one bad entry never aborts the walk.

use std::path::{Component, Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

use crate::error::FpbError;

/// A file to upload and its path relative to the selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWorkItem {
    /// `/`-separated, beginning with the root segment.
    pub relative_path: String,
    /// Local path to read from.
    pub path: PathBuf,
}

impl FileWorkItem {
    /// Relative directories that must exist before this file can be written,
    /// shallowest first, excluding the root segment itself.
    pub fn parent_dirs(&self) -> Vec<String> {
        let segments: Vec<&str> = self.relative_path.split('/').collect();
        (2..segments.len())
            .map(|n| segments[..n].join("/"))
            .collect()
    }
}

/// An entry the walk could not read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub path: Option<PathBuf>,
    pub reason: String,
}

/// Result of one walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkReport {
    pub items: Vec<FileWorkItem>,
    pub skipped: Vec<SkippedEntry>,
}

/// Expand `root` depth-first into a flat file list.
///
/// The root segment is `prefix` when given, otherwise the folder's own name.
pub fn walk_dir(root: &Path, prefix: Option<&str>) -> Result<WalkReport, FpbError> {
    if !root.is_dir() {
        return Err(FpbError::Precondition(format!(
            "Not a directory: {}",
            root.display()
        )));
    }

    let root_segment = match prefix {
        Some(p) => p.trim_matches('/').to_string(),
        None => root_name(root)?,
    };

    let mut report = WalkReport::default();
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("skipping unreadable entry: {e}");
                report.skipped.push(SkippedEntry {
                    path: e.path().map(Path::to_path_buf),
                    reason: e.to_string(),
                });
                continue;
            }
        };
        // Links are not followed, so their targets would be lost silently.
        if entry.path_is_symlink() {
            warn!("skipping symlink {}", entry.path().display());
            report.skipped.push(SkippedEntry {
                path: Some(entry.path().to_path_buf()),
                reason: format!("symlink not followed: {}", entry.path().display()),
            });
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        let mut segments = vec![root_segment.clone()];
        segments.extend(rel.components().filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        }));

        report.items.push(FileWorkItem {
            relative_path: segments.join("/"),
            path: entry.into_path(),
        });
    }
    Ok(report)
}

/// Name of the selected folder, resolving `.`-style paths first.
fn root_name(root: &Path) -> Result<String, FpbError> {
    let resolved = match root.file_name() {
        Some(_) => root.to_path_buf(),
        None => root.canonicalize()?,
    };
    resolved
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| FpbError::Precondition(format!("Cannot name folder {}", root.display())))
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_dirs_exclude_root() {
        let item = FileWorkItem {
            relative_path: "fw/a/b/c.bin".into(),
            path: PathBuf::new(),
        };
        assert_eq!(item.parent_dirs(), vec!["fw/a", "fw/a/b"]);

        let top = FileWorkItem {
            relative_path: "fw/c.bin".into(),
            path: PathBuf::new(),
        };
        assert!(top.parent_dirs().is_empty());
    }

    #[test]
    fn missing_root_is_a_precondition_failure() {
        let err = walk_dir(Path::new("/definitely/not/here"), None).unwrap_err();
        assert!(matches!(err, FpbError::Precondition(_)));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_reported_as_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("fw");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(root.join("a.bin"), b"a").unwrap();
        std::os::unix::fs::symlink(root.join("a.bin"), root.join("link.bin")).unwrap();

        let report = walk_dir(&root, None).unwrap();
        let paths: Vec<_> = report.items.iter().map(|i| i.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["fw/a.bin"]);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].reason.contains("symlink"));
        assert_eq!(report.skipped[0].path.as_deref(), Some(root.join("link.bin").as_path()));
    }
}
