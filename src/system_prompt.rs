//! System prompt construction
//!
//! The base prompt (operator-configured or built in) is followed by every
//! fragment the tool servers contributed, separated by blank lines.

/// Base prompt used when the operator does not configure one
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant. Please respond to the user's request accurately and concisely.";

const SEPARATOR: &str = "\n\n";

/// Build the system prompt for every conversation.
///
/// An empty result means no system message is sent.
pub fn build_system_prompt(configured: Option<&str>, fragments: &[String]) -> String {
    let base = configured.unwrap_or(DEFAULT_SYSTEM_PROMPT);

    std::iter::once(base)
        .chain(fragments.iter().map(String::as_str))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}
