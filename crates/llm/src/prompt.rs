//! Prompt construction
//!
//! Selects a system prompt template from a fixed category set and assembles
//! the role-delimited prompt text sent to the inference backend.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Role delimiter opening the system turn
pub const SYSTEM_DELIMITER: &str = "<|system|>";
/// Role delimiter opening the user turn
pub const USER_DELIMITER: &str = "<|user|>";
/// Role delimiter marking the (empty) assistant turn
pub const ASSISTANT_DELIMITER: &str = "<|assistant|>";

/// Stop sequences for blocking generation, matching the prompt's role
/// delimiters. Not needed when consuming the stream incrementally.
pub fn stop_sequences() -> Vec<String> {
    vec![USER_DELIMITER.to_string(), SYSTEM_DELIMITER.to_string()]
}

const PHILOSOPHY_PROMPT: &str = "\
You are Chronicle, an assistant who specializes in philosophy. You explore \
questions about existence, ethics, and knowledge across Western, Eastern, \
Islamic, and African traditions, connect abstract concepts to everyday life, \
reference key thinkers and their contributions, and present multiple \
perspectives rather than a single verdict. Keep responses focused and \
conversational, around 2-3 paragraphs unless more detail is requested.";

const HISTORY_PROMPT: &str = "\
You are Chronicle, an assistant who brings history to life. You give rich \
context about causes, consequences, and significance, include perspectives \
from different cultures, highlight the human stories behind major events, \
and draw connections between past and present while staying historically \
accurate. Keep responses informative, around 2-3 paragraphs unless more \
detail is requested.";

const GENERAL_PROMPT: &str = "\
You are Chronicle, an assistant with deep knowledge of philosophy and \
history. Approach any topic with intellectual curiosity, draw on \
philosophical and historical perspectives when relevant, and encourage \
deeper exploration of the underlying questions. Keep responses thoughtful \
and conversational, around 2-3 paragraphs.";

/// Prompt category
///
/// Closed set mapped to compile-time templates; anything unrecognized
/// falls back to [`PromptCategory::General`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PromptCategory {
    Philosophy,
    History,
    #[default]
    General,
}

impl PromptCategory {
    /// Resolve a raw request category, falling back to the default
    pub fn parse(raw: &str) -> Self {
        match raw {
            "philosophy" => Self::Philosophy,
            "history" => Self::History,
            _ => Self::General,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Philosophy => "philosophy",
            Self::History => "history",
            Self::General => "general",
        }
    }

    /// System prompt template for this category
    pub fn system_prompt(&self) -> &'static str {
        match self {
            Self::Philosophy => PHILOSOPHY_PROMPT,
            Self::History => HISTORY_PROMPT,
            Self::General => GENERAL_PROMPT,
        }
    }
}

impl fmt::Display for PromptCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assemble the full prompt: system template, user turn, empty assistant turn
pub fn build_prompt(category: PromptCategory, message: &str) -> String {
    format!(
        "{SYSTEM_DELIMITER}\n{}\n\n{USER_DELIMITER}\n{}\n\n{ASSISTANT_DELIMITER}",
        category.system_prompt(),
        message
    )
}

/// Strip role-delimiter artifacts the model may echo back, then trim
pub fn clean_response(raw: &str) -> String {
    raw.replace(ASSISTANT_DELIMITER, "")
        .replace(USER_DELIMITER, "")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_category_falls_back_to_general() {
        assert_eq!(PromptCategory::parse("astrology"), PromptCategory::General);
        assert_eq!(PromptCategory::parse(""), PromptCategory::General);
        assert_eq!(
            PromptCategory::parse("astrology").system_prompt(),
            PromptCategory::General.system_prompt()
        );
    }

    #[test]
    fn test_known_categories_resolve() {
        assert_eq!(PromptCategory::parse("philosophy"), PromptCategory::Philosophy);
        assert_eq!(PromptCategory::parse("history"), PromptCategory::History);
    }

    #[test]
    fn test_prompt_contains_delimiters_and_message() {
        let prompt = build_prompt(PromptCategory::History, "Tell me about the Hanseatic League");
        assert!(prompt.starts_with(SYSTEM_DELIMITER));
        assert!(prompt.contains("Tell me about the Hanseatic League"));
        assert!(prompt.ends_with(ASSISTANT_DELIMITER));
        assert!(prompt.contains(HISTORY_PROMPT));
    }

    #[test]
    fn test_clean_response_strips_delimiter_artifacts() {
        let cleaned = clean_response("  <|assistant|> Rome fell in 476. <|user|>  ");
        assert_eq!(cleaned, "Rome fell in 476.");
    }

    #[test]
    fn test_stop_sequences_match_delimiters() {
        let stops = stop_sequences();
        assert!(stops.contains(&USER_DELIMITER.to_string()));
        assert!(stops.contains(&SYSTEM_DELIMITER.to_string()));
    }
}
