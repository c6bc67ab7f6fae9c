//! Line source (stage S1).
//!
//! Produces one raw record per line from a bounded set of text files.
//! Delivers bytes exactly; parsing is the next stage's job.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing::error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("input path does not exist: {0}")]
    Missing(PathBuf),
    #[error("cannot read directory {path}: {message}")]
    Unreadable { path: PathBuf, message: String },
}

/// Extensions accepted when expanding a directory.
const RECORD_EXTENSIONS: [&str; 2] = ["jsonl", "ndjson"];

/// A bounded source of line records.
#[derive(Debug, Clone)]
pub struct LineSource {
    files: Vec<PathBuf>,
}

impl LineSource {
    /// Build from explicit paths. Files are taken as-is; directories expand
    /// to their `.jsonl`/`.ndjson` entries, sorted for a stable order.
    /// A named path that does not exist is fatal.
    pub fn from_paths<I, P>(paths: I) -> Result<Self, SourceError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut files = Vec::new();
        for path in paths {
            let path = path.as_ref();
            if path.is_file() {
                files.push(path.to_path_buf());
            } else if path.is_dir() {
                let mut found = Vec::new();
                for entry in WalkDir::new(path).follow_links(true) {
                    let entry = entry.map_err(|e| SourceError::Unreadable {
                        path: path.to_path_buf(),
                        message: e.to_string(),
                    })?;
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let matches = entry
                        .path()
                        .extension()
                        .and_then(|e| e.to_str())
                        .map(|e| RECORD_EXTENSIONS.contains(&e))
                        .unwrap_or(false);
                    if matches {
                        found.push(entry.into_path());
                    }
                }
                found.sort();
                files.extend(found);
            } else {
                return Err(SourceError::Missing(path.to_path_buf()));
            }
        }
        Ok(Self { files })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Feed every line into `tx`. Returns the number of records delivered.
    ///
    /// Empty lines are skipped. A file that fails to open or read is logged
    /// and abandoned; the remaining files still run. Send failures mean every
    /// receiver is gone, which ends the stream early.
    pub async fn stream_into(self, tx: mpsc::Sender<String>) -> u64 {
        let mut delivered = 0u64;
        for path in &self.files {
            let file = match tokio::fs::File::open(path).await {
                Ok(file) => file,
                Err(e) => {
                    error!(path = %path.display(), error = %e, "skipping unreadable input file");
                    continue;
                }
            };
            let mut lines = tokio::io::BufReader::new(file).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        if tx.send(line).await.is_err() {
                            return delivered;
                        }
                        delivered += 1;
                    }
                    Ok(None) => break,
                    Err(e) => {
                        error!(path = %path.display(), error = %e, "read error, abandoning file");
                        break;
                    }
                }
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn streams_lines_from_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "a.jsonl", "one\ntwo\n\nthree\n");

        let source = LineSource::from_paths([path]).unwrap();
        let (tx, mut rx) = mpsc::channel(16);
        let delivered = source.stream_into(tx).await;

        assert_eq!(delivered, 3, "empty line skipped");
        let mut lines = Vec::new();
        while let Some(line) = rx.recv().await {
            lines.push(line);
        }
        assert_eq!(lines, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn directory_expands_to_sorted_record_files() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, "b.jsonl", "b\n");
        write(&dir, "a.ndjson", "a\n");
        write(&dir, "ignored.txt", "x\n");

        let source = LineSource::from_paths([dir.path()]).unwrap();
        let names: Vec<_> = source
            .files()
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.ndjson", "b.jsonl"]);
    }

    #[test]
    fn missing_path_is_fatal() {
        let err = LineSource::from_paths(["/no/such/weft/input"]).unwrap_err();
        assert!(matches!(err, SourceError::Missing(_)));
    }

    #[tokio::test]
    async fn unreadable_file_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let good = write(&dir, "good.jsonl", "line\n");
        let gone = dir.path().join("gone.jsonl");
        std::fs::write(&gone, "x\n").unwrap();

        let source = LineSource::from_paths([gone.clone(), good]).unwrap();
        std::fs::remove_file(&gone).unwrap();

        let (tx, mut rx) = mpsc::channel(4);
        let delivered = source.stream_into(tx).await;
        assert_eq!(delivered, 1);
        assert_eq!(rx.recv().await.unwrap(), "line");
    }
}
