//! `@name` mention parsing

use regex::Regex;
use std::sync::LazyLock;

static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([\w-]+)").expect("mention pattern compiles"));

/// First participant mentioned in `text` who is not its `author`.
///
/// Matching is case-insensitive; the roster spelling is returned.
pub fn parse_mention(text: &str, participants: &[String], author: &str) -> Option<String> {
    MENTION
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .find_map(|token| {
            participants
                .iter()
                .find(|p| p.eq_ignore_ascii_case(token.as_str()))
                .filter(|p| !p.eq_ignore_ascii_case(author))
                .cloned()
        })
}
