//! Default prompt templates bundled at compile time.

/// Immutable preamble every mission log starts with
pub const MANIFESTO: &str = include_str!("defaults/manifesto.md");

/// Scout - maps the codebase against the objective
pub const SCOUT: &str = include_str!("defaults/scout.md");

/// Architect - turns the scout report into a change plan
pub const ARCHITECT: &str = include_str!("defaults/architect.md");

/// Taskmaster - writes the numbered prompts for the coding agent
pub const TASKMASTER: &str = include_str!("defaults/taskmaster.md");

/// Refiner - rewrites or extends the prompts from user feedback
pub const REFINER: &str = include_str!("defaults/refiner.md");

/// All default prompts with their slugs
pub fn all_defaults() -> Vec<(&'static str, &'static str)> {
    vec![
        ("manifesto", MANIFESTO),
        ("scout", SCOUT),
        ("architect", ARCHITECT),
        ("taskmaster", TASKMASTER),
        ("refiner", REFINER),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_prompts_non_empty() {
        for (slug, content) in all_defaults() {
            assert!(!content.is_empty(), "Prompt '{}' should not be empty", slug);
            assert!(content.len() > 50, "Prompt '{}' seems too short", slug);
        }
    }

    #[test]
    fn test_prompt_count() {
        assert_eq!(all_defaults().len(), 5, "Should have 5 default prompts");
    }

    #[test]
    fn test_chunk_producers_teach_the_delimiter() {
        assert!(TASKMASTER.contains("=== PROMPT 1:"));
        assert!(REFINER.contains("=== PROMPT"));
    }
}
