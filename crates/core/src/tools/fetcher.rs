//! # Repository Fetcher
//!
//! The seam between the coordinator and wherever repository files come from.
//! `AutoFetcher` picks the local walker for existing directories and GitHub otherwise.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::file_filter::FetchLimits;
use super::github::GitHubFetcher;
use super::local::LocalFetcher;

/// A text file pulled from the repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoFile {
    pub path: String,
    pub content: String,
    pub size: u64,
}

impl RepoFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            path: path.into(),
            size: content.len() as u64,
            content,
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid GitHub URL '{0}': expected https://github.com/<owner>/<repo>")]
    InvalidUrl(String),
    #[error("Repository {owner}/{repo} not found (is it public?)")]
    NotFound { owner: String, repo: String },
    #[error("Repository {owner}/{repo} is inaccessible (HTTP {status}): {message}")]
    Inaccessible {
        owner: String,
        repo: String,
        status: u16,
        message: String,
    },
    #[error("Could not read the file tree of branch '{branch}' (HTTP {status})")]
    TreeUnavailable { branch: String, status: u16 },
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("Failed to walk directory: {0}")]
    Walk(#[from] ignore::Error),
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Source of repository files for one pipeline run
#[async_trait]
pub trait RepoFetcher: Send + Sync {
    /// Fetch a filtered, ordered, capped list of text files.
    ///
    /// Individual file failures are dropped; only whole-repository failures error.
    async fn fetch(&self, locator: &str) -> Result<Vec<RepoFile>, FetchError>;
}

/// Local directory when the locator names one, GitHub otherwise
pub struct AutoFetcher {
    github: GitHubFetcher,
    local: LocalFetcher,
}

impl AutoFetcher {
    pub fn new(limits: FetchLimits) -> Self {
        Self {
            github: GitHubFetcher::new(limits.clone()),
            local: LocalFetcher::new(limits),
        }
    }
}

#[async_trait]
impl RepoFetcher for AutoFetcher {
    async fn fetch(&self, locator: &str) -> Result<Vec<RepoFile>, FetchError> {
        let trimmed = locator.trim();
        if Path::new(trimmed).is_dir() {
            self.local.fetch(trimmed).await
        } else {
            self.github.fetch(trimmed).await
        }
    }
}
