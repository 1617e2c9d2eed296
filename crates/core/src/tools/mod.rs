//! # Deterministic Tools
//!
//! Plain Rust code around the model calls: no prompts, no LLMs.
//!
//! ## Modules
//!
//! - `fetcher` - `RepoFetcher` seam, `RepoFile`, `FetchError`, `AutoFetcher`
//! - `github` - GitHub REST fetcher (default branch tree + raw contents)
//! - `local` - Local directory fetcher (`ignore`-based walk)
//! - `file_filter` - Allow-list, exclusions, priority sort and cap
//! - `chunk_parser` - Splits the final prompt into `=== PROMPT n: title ===` chunks

pub mod chunk_parser;
pub mod fetcher;
pub mod file_filter;
pub mod github;
pub mod local;

pub use chunk_parser::{audit_chunk_ids, parse_chunks, ChunkIdIssue, ParsedPromptChunk};
pub use fetcher::{AutoFetcher, FetchError, RepoFetcher, RepoFile};
pub use file_filter::{FetchLimits, FileFilter};
pub use github::{parse_repo_url, GitHubFetcher, RepoCoordinates};
pub use local::LocalFetcher;
