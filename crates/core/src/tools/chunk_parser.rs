//! # Prompt Chunk Parser
//!
//! Splits the Taskmaster/Refiner output into the numbered prompts a coding
//! agent executes one at a time. Delimiter lines look like:
//!
//! ```text
//! === PROMPT 3: Wire the settings page ===
//! ```
//!
//! Ids and titles are passed through verbatim. Use [`audit_chunk_ids`] to
//! detect duplicates or gaps; the parser never repairs them.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Title of the synthetic chunk returned when no delimiter is present
pub const FALLBACK_TITLE: &str = "Complete Mission";

/// One self-contained instruction block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedPromptChunk {
    pub id: String,
    pub title: String,
    pub content: String,
}

fn delimiter() -> Option<&'static Regex> {
    static DELIMITER: OnceLock<Option<Regex>> = OnceLock::new();
    DELIMITER
        .get_or_init(|| {
            Regex::new(r"(?m)^[ \t]*===[ \t]*PROMPT[ \t]+(\d+)[ \t]*:[ \t]*(.*?)[ \t]*===[ \t]*\r?$")
                .map_err(|e| tracing::error!(error = %e, "Prompt delimiter pattern rejected"))
                .ok()
        })
        .as_ref()
}

fn whole_mission(text: &str) -> Vec<ParsedPromptChunk> {
    vec![ParsedPromptChunk {
        id: "1".to_string(),
        title: FALLBACK_TITLE.to_string(),
        content: text.to_string(),
    }]
}

/// Split `text` into chunks, one per delimiter line.
///
/// With no delimiter, the whole text becomes chunk `"1"` titled
/// [`FALLBACK_TITLE`]. Text before the first delimiter is not part of any chunk.
pub fn parse_chunks(text: &str) -> Vec<ParsedPromptChunk> {
    let Some(delimiter) = delimiter() else {
        return whole_mission(text);
    };
    let matches: Vec<_> = delimiter.captures_iter(text).collect();
    if matches.is_empty() {
        return whole_mission(text);
    }

    matches
        .iter()
        .enumerate()
        .map(|(i, caps)| {
            let whole = caps.get(0).map_or(0..0, |m| m.range());
            let end = matches
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map_or(text.len(), |m| m.start());
            ParsedPromptChunk {
                id: caps[1].to_string(),
                title: caps[2].trim().to_string(),
                content: text[whole.end..end].trim().to_string(),
            }
        })
        .collect()
}

/// A suspicious id in a chunk sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum ChunkIdIssue {
    /// Same id appears more than once
    Duplicate { id: String },
    /// Id is not the expected 1-based ordinal for its position
    OutOfSequence {
        id: String,
        position: usize,
        expected: usize,
    },
}

/// Report duplicate and out-of-sequence ids without changing anything
pub fn audit_chunk_ids(chunks: &[ParsedPromptChunk]) -> Vec<ChunkIdIssue> {
    let mut seen = HashSet::new();
    let mut issues = Vec::new();

    for (position, chunk) in chunks.iter().enumerate() {
        if !seen.insert(chunk.id.as_str()) {
            issues.push(ChunkIdIssue::Duplicate {
                id: chunk.id.clone(),
            });
            continue;
        }
        let expected = position + 1;
        if chunk.id.parse::<usize>().ok() != Some(expected) {
            issues.push(ChunkIdIssue::OutOfSequence {
                id: chunk.id.clone(),
                position,
                expected,
            });
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, title: &str, content: &str) -> ParsedPromptChunk {
        ParsedPromptChunk {
            id: id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_two_prompts() {
        let text = "=== PROMPT 1: Setup ===\nDo X\n=== PROMPT 2: Build ===\nDo Y\n";
        assert_eq!(
            parse_chunks(text),
            vec![chunk("1", "Setup", "Do X"), chunk("2", "Build", "Do Y")]
        );
    }

    #[test]
    fn test_delimiter_pattern_compiles() {
        assert!(delimiter().is_some());
    }

    #[test]
    fn test_fallback_without_delimiters() {
        let text = "  Just do everything.\n";
        let chunks = parse_chunks(text);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "1");
        assert_eq!(chunks[0].title, FALLBACK_TITLE);
        assert_eq!(chunks[0].content, text);
    }

    #[test]
    fn test_fallback_on_empty_input() {
        assert_eq!(parse_chunks(""), vec![chunk("1", FALLBACK_TITLE, "")]);
    }

    #[test]
    fn test_malformed_delimiters_are_content() {
        let text = "== PROMPT 1: Missing equals ==\n=== PROMPT one: Words ===\n=== TASK 1: Nope ===";
        let chunks = parse_chunks(text);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].title, FALLBACK_TITLE);
    }

    #[test]
    fn test_content_trimmed_and_preamble_dropped() {
        let text = "Here is your plan.\n\n=== PROMPT 1: Models ===\n\n  Add the User struct.  \n\n\n=== PROMPT 2: Routes ===\r\nWire /users.\r\n";
        let chunks = parse_chunks(text);
        assert_eq!(
            chunks,
            vec![
                chunk("1", "Models", "Add the User struct."),
                chunk("2", "Routes", "Wire /users."),
            ]
        );
    }

    #[test]
    fn test_titles_may_contain_colons_and_symbols() {
        let text = "=== PROMPT 7: API: add /v2 (breaking!) ===\nbody";
        let chunks = parse_chunks(text);
        assert_eq!(chunks[0].id, "7");
        assert_eq!(chunks[0].title, "API: add /v2 (breaking!)");
    }

    #[test]
    fn test_ids_pass_through_unchanged() {
        let text = "=== PROMPT 3: C ===\nc\n=== PROMPT 1: A ===\na\n=== PROMPT 3: C again ===\nc2";
        let ids: Vec<String> = parse_chunks(text).into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["3", "1", "3"]);
    }

    #[test]
    fn test_empty_chunk_body() {
        let chunks = parse_chunks("=== PROMPT 1: Empty ===\n=== PROMPT 2: Full ===\nwork");
        assert_eq!(chunks[0].content, "");
        assert_eq!(chunks[1].content, "work");
    }

    #[test]
    fn test_chunk_count_matches_delimiters() {
        let text: String = (1..=12)
            .map(|i| format!("=== PROMPT {i}: Step {i} ===\n  step body {i}\n\n"))
            .collect();
        let chunks = parse_chunks(&text);
        assert_eq!(chunks.len(), 12);
        for c in &chunks {
            assert_eq!(c.content, c.content.trim());
            assert!(!c.content.contains("==="));
        }
    }

    #[test]
    fn test_reparsing_joined_contents_has_no_boundaries() {
        let text = "=== PROMPT 1: A ===\nalpha\n=== PROMPT 2: B ===\nbeta";
        let joined = parse_chunks(text)
            .into_iter()
            .map(|c| c.content)
            .collect::<Vec<_>>()
            .join("\n");
        let reparsed = parse_chunks(&joined);
        assert_eq!(reparsed.len(), 1);
        assert_eq!(reparsed[0].title, FALLBACK_TITLE);
    }

    #[test]
    fn test_parse_is_deterministic() {
        let text = "=== PROMPT 1: A ===\nalpha\n=== PROMPT 2: B ===\nbeta";
        assert_eq!(parse_chunks(text), parse_chunks(text));
    }

    #[test]
    fn test_audit_clean_sequence() {
        let chunks = vec![chunk("1", "a", ""), chunk("2", "b", "")];
        assert!(audit_chunk_ids(&chunks).is_empty());
    }

    #[test]
    fn test_audit_reports_duplicates_and_gaps() {
        let chunks = vec![chunk("1", "a", ""), chunk("3", "c", ""), chunk("3", "c", "")];
        assert_eq!(
            audit_chunk_ids(&chunks),
            vec![
                ChunkIdIssue::OutOfSequence {
                    id: "3".to_string(),
                    position: 1,
                    expected: 2,
                },
                ChunkIdIssue::Duplicate {
                    id: "3".to_string()
                },
            ]
        );
    }
}
