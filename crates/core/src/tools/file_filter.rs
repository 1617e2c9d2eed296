//! # File Filter
//!
//! Decides which repository files reach the model context and in what order.
//! Shared by the GitHub and local fetchers so both produce the same selection.

use glob::Pattern;
use serde::{Deserialize, Serialize};

/// Bounds on what a single fetch may return
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchLimits {
    /// Hard cap on returned files
    pub max_files: usize,
    /// Files above this size are skipped
    pub max_file_bytes: u64,
    /// Concurrent content downloads
    pub fetch_concurrency: usize,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            max_files: 40,
            max_file_bytes: 100_000,
            fetch_concurrency: 8,
        }
    }
}

const ALLOWED_EXTENSIONS: &[&str] = &[
    "rs", "toml", "ts", "tsx", "js", "jsx", "mjs", "cjs", "py", "go", "java", "kt", "swift", "c",
    "h", "cpp", "hpp", "cc", "cs", "rb", "php", "scala", "sh", "sql", "html", "css", "scss", "vue",
    "svelte", "json", "yaml", "yml", "md", "txt", "proto", "graphql",
];

const ALLOWED_FILENAMES: &[&str] = &["Dockerfile", "Makefile"];

const EXCLUDED_PATTERNS: &[&str] = &[
    "**/*.lock",
    "**/package-lock.json",
    "**/pnpm-lock.yaml",
    "**/yarn.lock",
    "**/*.min.js",
    "**/*.min.css",
    "**/node_modules/**",
    "**/target/**",
    "**/dist/**",
    "**/build/**",
    "**/.git/**",
    "**/vendor/**",
    "**/.next/**",
    "**/__pycache__/**",
    "**/coverage/**",
];

/// Manifests float to the top so the Scout sees the stack first
const MANIFESTS: &[&str] = &[
    "package.json",
    "Cargo.toml",
    "pyproject.toml",
    "go.mod",
    "pom.xml",
    "build.gradle",
    "requirements.txt",
    "Gemfile",
    "composer.json",
];

/// A file known by path and size, before its content is read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    pub path: String,
    pub size: u64,
}

impl FileCandidate {
    pub fn new(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }
}

pub struct FileFilter {
    limits: FetchLimits,
    excluded: Vec<Pattern>,
}

impl FileFilter {
    pub fn new(limits: FetchLimits) -> Self {
        let excluded = EXCLUDED_PATTERNS
            .iter()
            .filter_map(|p| Pattern::new(p).ok())
            .collect();
        Self { limits, excluded }
    }

    pub fn limits(&self) -> &FetchLimits {
        &self.limits
    }

    /// Extension/name allow-list
    pub fn is_text_source(&self, path: &str) -> bool {
        let name = file_name(path);
        if ALLOWED_FILENAMES.contains(&name) {
            return true;
        }
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
            }
            _ => false,
        }
    }

    /// Lock files, minified bundles, build output and dependency directories
    pub fn is_excluded(&self, path: &str) -> bool {
        // Anchor at a virtual root so "**/dir/**" also matches top-level dirs.
        let anchored = format!("/{}", path.trim_start_matches('/'));
        self.excluded.iter().any(|p| p.matches(&anchored))
    }

    pub fn accepts(&self, candidate: &FileCandidate) -> bool {
        candidate.size <= self.limits.max_file_bytes
            && self.is_text_source(&candidate.path)
            && !self.is_excluded(&candidate.path)
    }

    /// Filter, order by priority, and cap
    pub fn select(&self, candidates: Vec<FileCandidate>) -> Vec<FileCandidate> {
        let mut selected: Vec<FileCandidate> =
            candidates.into_iter().filter(|c| self.accepts(c)).collect();
        selected.sort_by(|a, b| sort_key(&a.path).cmp(&sort_key(&b.path)));
        selected.truncate(self.limits.max_files);
        selected
    }
}

impl Default for FileFilter {
    fn default() -> Self {
        Self::new(FetchLimits::default())
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn depth(path: &str) -> usize {
    path.trim_matches('/').matches('/').count()
}

fn sort_key(path: &str) -> (bool, usize, &str) {
    let is_manifest = MANIFESTS.contains(&file_name(path));
    (!is_manifest, depth(path), path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list() {
        let filter = FileFilter::default();
        assert!(filter.is_text_source("src/main.rs"));
        assert!(filter.is_text_source("web/App.TSX"));
        assert!(filter.is_text_source("Dockerfile"));
        assert!(!filter.is_text_source("assets/logo.png"));
        assert!(!filter.is_text_source(".gitignore"));
        assert!(!filter.is_text_source("LICENSE"));
    }

    #[test]
    fn test_exclusions() {
        let filter = FileFilter::default();
        assert!(filter.is_excluded("Cargo.lock"));
        assert!(filter.is_excluded("package-lock.json"));
        assert!(filter.is_excluded("node_modules/react/index.js"));
        assert!(filter.is_excluded("packages/app/node_modules/x/y.js"));
        assert!(filter.is_excluded("target/debug/build.rs"));
        assert!(filter.is_excluded("static/app.min.js"));
        assert!(!filter.is_excluded("src/builder.rs"));
        assert!(!filter.is_excluded("src/distance.rs"));
    }

    #[test]
    fn test_select_prioritizes_manifest_then_depth() {
        let filter = FileFilter::default();
        let selected = filter.select(vec![
            FileCandidate::new("src/deep/nested/mod.rs", 10),
            FileCandidate::new("README.md", 10),
            FileCandidate::new("src/lib.rs", 10),
            FileCandidate::new("crates/core/Cargo.toml", 10),
            FileCandidate::new("Cargo.toml", 10),
            FileCandidate::new("Cargo.lock", 10),
        ]);

        let paths: Vec<&str> = selected.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "Cargo.toml",
                "crates/core/Cargo.toml",
                "README.md",
                "src/lib.rs",
                "src/deep/nested/mod.rs",
            ]
        );
    }

    #[test]
    fn test_select_caps_and_skips_large_files() {
        let filter = FileFilter::new(FetchLimits {
            max_files: 2,
            max_file_bytes: 100,
            fetch_concurrency: 1,
        });
        let selected = filter.select(vec![
            FileCandidate::new("a.rs", 10),
            FileCandidate::new("b.rs", 1_000),
            FileCandidate::new("c.rs", 10),
            FileCandidate::new("d.rs", 10),
        ]);
        let paths: Vec<&str> = selected.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["a.rs", "c.rs"]);
    }
}
