//! # GitHub Fetcher
//!
//! Pulls the default branch of a public repository through the REST API:
//! repository metadata → recursive tree → filtered raw file contents.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::fetcher::{FetchError, RepoFetcher, RepoFile};
use super::file_filter::{FetchLimits, FileCandidate, FileFilter};

const API_BASE: &str = "https://api.github.com";
const RAW_BASE: &str = "https://raw.githubusercontent.com";
const USER_AGENT: &str = "missionforge/0.1";

/// Owner/repo pair extracted from a locator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoCoordinates {
    pub owner: String,
    pub repo: String,
}

/// Parse `https://github.com/<owner>/<repo>[.git][/...]`.
///
/// Fails before any network interaction when owner/repo can't be found.
pub fn parse_repo_url(locator: &str) -> Result<RepoCoordinates, FetchError> {
    let invalid = || FetchError::InvalidUrl(locator.to_string());
    let trimmed = locator.trim();

    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let without_host = without_scheme
        .strip_prefix("www.")
        .unwrap_or(without_scheme)
        .strip_prefix("github.com/")
        .ok_or_else(invalid)?;

    let mut segments = without_host
        .split(['/', '?', '#'])
        .filter(|s| !s.is_empty());
    let owner = segments.next().ok_or_else(invalid)?;
    let repo = segments.next().ok_or_else(invalid)?;
    let repo = repo.strip_suffix(".git").unwrap_or(repo);

    let valid = |s: &str| {
        !s.is_empty()
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    };
    if !valid(owner) || !valid(repo) {
        return Err(invalid());
    }

    Ok(RepoCoordinates {
        owner: owner.to_string(),
        repo: repo.to_string(),
    })
}

#[derive(Deserialize)]
struct RepoInfo {
    default_branch: String,
}

#[derive(Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: Option<u64>,
}

pub struct GitHubFetcher {
    client: Client,
    filter: FileFilter,
    api_base: String,
    raw_base: String,
}

impl GitHubFetcher {
    pub fn new(limits: FetchLimits) -> Self {
        Self {
            client: Client::new(),
            filter: FileFilter::new(limits),
            api_base: API_BASE.to_string(),
            raw_base: RAW_BASE.to_string(),
        }
    }

    /// Point at a GitHub Enterprise (or test) host
    pub fn with_endpoints(mut self, api_base: &str, raw_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self.raw_base = raw_base.trim_end_matches('/').to_string();
        self
    }

    async fn default_branch(&self, coords: &RepoCoordinates) -> Result<String, FetchError> {
        let url = format!("{}/repos/{}/{}", self.api_base, coords.owner, coords.repo);
        let res = self
            .client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        match res.status() {
            s if s.is_success() => Ok(res.json::<RepoInfo>().await?.default_branch),
            StatusCode::NOT_FOUND => Err(FetchError::NotFound {
                owner: coords.owner.clone(),
                repo: coords.repo.clone(),
            }),
            s => Err(FetchError::Inaccessible {
                owner: coords.owner.clone(),
                repo: coords.repo.clone(),
                status: s.as_u16(),
                message: res.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn tree(
        &self,
        coords: &RepoCoordinates,
        branch: &str,
    ) -> Result<Vec<FileCandidate>, FetchError> {
        let url = format!(
            "{}/repos/{}/{}/git/trees/{}?recursive=1",
            self.api_base,
            coords.owner,
            coords.repo,
            urlencoding::encode(branch)
        );
        let res = self
            .client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(FetchError::TreeUnavailable {
                branch: branch.to_string(),
                status: res.status().as_u16(),
            });
        }

        let tree: TreeResponse = res.json().await?;
        if tree.truncated {
            tracing::warn!(owner = %coords.owner, repo = %coords.repo, "GitHub tree listing truncated");
        }
        Ok(tree
            .tree
            .into_iter()
            .filter(|e| e.kind == "blob")
            .map(|e| FileCandidate::new(e.path, e.size.unwrap_or(0)))
            .collect())
    }

    async fn file_content(
        &self,
        coords: &RepoCoordinates,
        branch: &str,
        path: &str,
    ) -> anyhow::Result<String> {
        let encoded_path = path
            .split('/')
            .map(|s| urlencoding::encode(s).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let url = format!(
            "{}/{}/{}/{}/{}",
            self.raw_base,
            coords.owner,
            coords.repo,
            urlencoding::encode(branch),
            encoded_path
        );
        let res = self
            .client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await?
            .error_for_status()?;
        Ok(res.text().await?)
    }
}

#[async_trait]
impl RepoFetcher for GitHubFetcher {
    #[tracing::instrument(skip(self))]
    async fn fetch(&self, locator: &str) -> Result<Vec<RepoFile>, FetchError> {
        let coords = parse_repo_url(locator)?;
        let branch = self.default_branch(&coords).await?;
        let candidates = self.filter.select(self.tree(&coords, &branch).await?);
        tracing::info!(
            owner = %coords.owner,
            repo = %coords.repo,
            branch = %branch,
            selected = candidates.len(),
            "Fetching repository files"
        );

        // Join barrier: every download resolves (or is dropped) before returning.
        let concurrency = self.filter.limits().fetch_concurrency.max(1);
        let files: Vec<RepoFile> = stream::iter(candidates)
            .map(|candidate| {
                let coords = &coords;
                let branch = branch.as_str();
                async move {
                    match self.file_content(coords, branch, &candidate.path).await {
                        Ok(content) => Some(RepoFile {
                            path: candidate.path,
                            size: content.len() as u64,
                            content,
                        }),
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
