//! Small text helpers shared by the scrapers and the CSV export.
use std::sync::OnceLock;

use regex::Regex;

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("static regex"))
}

fn year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("static regex"))
}

/// Collapse every whitespace run to a single space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Strip markup and line breaks from store HTML and cap its length.
pub fn clean_for_export(html: &str, max_chars: usize) -> String {
    let without_tags = tag_re().replace_all(html, "");
    let collapsed = collapse_whitespace(&without_tags);
    truncate_chars(&collapsed, max_chars).to_string()
}

/// Lowercased name with punctuation removed, for search queries.
pub fn clean_for_search(name: &str) -> String {
    let kept: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    collapse_whitespace(&kept)
}

/// First plausible four-digit year (1900-2099) in a free-text date.
pub fn extract_year(date: &str) -> Option<i32> {
    year_re().find(date).and_then(|m| m.as_str().parse().ok())
}

/// Parse a review score that must be a whole number in 0..=100.
pub fn parse_score(text: &str) -> Option<u32> {
    let digits: String = text
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse::<u32>().ok().filter(|s| *s <= 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_cleaning_strips_tags_and_newlines() {
        let html = "<h2>About</h2>\r\n<p>Build   a <b>deck</b>,\nthen\tclimb.</p>";
        assert_eq!(clean_for_export(html, 500), "About Build a deck, then climb.");
    }

    #[test]
    fn export_cleaning_truncates_on_chars() {
        let long = "é".repeat(600);
        assert_eq!(clean_for_export(&long, 500).chars().count(), 500);
    }

    #[test]
    fn search_cleaning_drops_punctuation() {
        assert_eq!(clean_for_search("Slay the Spire: Downfall!"), "slay the spire downfall");
        assert_eq!(clean_for_search("  Inscryption  "), "inscryption");
    }

    #[test]
    fn year_extraction() {
        assert_eq!(extract_year("23 Jan, 2019"), Some(2019));
        assert_eq!(extract_year("Coming soon"), None);
        assert_eq!(extract_year("Q3 12019"), None);
    }

    #[test]
    fn score_parsing_bounds() {
        assert_eq!(parse_score(" 87 "), Some(87));
        assert_eq!(parse_score("100"), Some(100));
        assert_eq!(parse_score("101"), None);
        assert_eq!(parse_score("tbd"), None);
    }
}
