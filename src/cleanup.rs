//! Best-effort removal of processed chunk files.

use std::path::{Path, PathBuf};

use crate::error::BatchError;

/// Outcome of a [`clean_up_files`] pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

/// Deletes each path. A failure is logged and recorded, and the remaining
/// paths are still attempted.
pub async fn clean_up_files(paths: &[PathBuf]) -> CleanupReport {
    let mut report = CleanupReport::default();
    for path in paths {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                tracing::info!(path = %path.display(), "deleted temporary file");
                report.removed.push(path.clone());
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to delete temporary file");
                report.failed.push(path.clone());
            }
        }
    }
    report
}

/// Creates `dir` and its parents if they do not exist yet.
pub async fn ensure_directory(dir: &Path) -> Result<(), BatchError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| BatchError::io(dir, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn removes_all_existing_files() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.jsonl");
        let b = dir.path().join("b.jsonl");
        std::fs::write(&a, "{}\n").unwrap();
        std::fs::write(&b, "{}\n").unwrap();

        let report = clean_up_files(&[a.clone(), b.clone()]).await;

        assert_eq!(report.removed, vec![a.clone(), b.clone()]);
        assert!(report.failed.is_empty());
        assert!(!a.exists() && !b.exists());
    }

    #[tokio::test]
    async fn failure_does_not_stop_remaining_deletions() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.jsonl");
        let present = dir.path().join("present.jsonl");
        std::fs::write(&present, "{}\n").unwrap();

        let report = clean_up_files(&[missing.clone(), present.clone()]).await;

        assert_eq!(report.failed, vec![missing]);
        assert_eq!(report.removed, vec![present.clone()]);
        assert!(!present.exists());
    }

    #[tokio::test]
    async fn ensure_directory_creates_nested_dirs() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("out/results");
        ensure_directory(&nested).await.unwrap();
        assert!(nested.is_dir());
        // Second call on an existing directory is fine.
        ensure_directory(&nested).await.unwrap();
    }
}
