//! # Local Fetcher
//!
//! Reads a checked-out repository from disk, honouring `.gitignore`,
//! and applies the same selection rules as the GitHub fetcher.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use super::fetcher::{FetchError, RepoFetcher, RepoFile};
use super::file_filter::{FetchLimits, FileCandidate, FileFilter};

pub struct LocalFetcher {
    filter: FileFilter,
}

impl LocalFetcher {
    pub fn new(limits: FetchLimits) -> Self {
        Self {
            filter: FileFilter::new(limits),
        }
    }
}

/// Walk `root` and list files relative to it, `/`-separated
fn list_candidates(root: &Path) -> Result<Vec<FileCandidate>, FetchError> {
    let walker = ignore::WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .require_git(false)
        .build();

    let mut candidates = Vec::new();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        candidates.push(FileCandidate::new(path, size));
    }
    Ok(candidates)
}

#[async_trait]
impl RepoFetcher for LocalFetcher {
    #[tracing::instrument(skip(self))]
    async fn fetch(&self, locator: &str) -> Result<Vec<RepoFile>, FetchError> {
        let root = PathBuf::from(locator.trim());
        if !root.is_dir() {
            return Err(FetchError::NotADirectory(root));
        }

        let walk_root = root.clone();
        let candidates = tokio::task::spawn_blocking(move || list_candidates(&walk_root))
            .await
            .map_err(|e| FetchError::Walk(ignore::Error::from(std::io::Error::other(e))))??;
        let selected = self.filter.select(candidates);
        tracing::info!(root = %root.display(), selected = selected.len(), "Reading local files");

        let concurrency = self.filter.limits().fetch_concurrency.max(1);
        let files: Vec<RepoFile> = stream::iter(selected)
            .map(|candidate| {
                let full = root.join(&candidate.path);
                async move {
                    match tokio::fs::read_to_string(&full).await {
                        Ok(content) => Some(RepoFile::new(candidate.path, content)),
                        Err(e) => {
                            tracing::debug!(path = %candidate.path, error = %e, "Skipping unreadable file");
                            None
                        }
                    }
                }
            })
            .buffered(concurrency)
            .filter_map(|f| async move { f })
            .collect()
            .await;

        if files.is_empty() {
            tracing::warn!("No readable text files selected");
        }
        Ok(files)
    }
}
