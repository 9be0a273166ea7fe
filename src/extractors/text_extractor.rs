//! Free-text fallbacks: visible page text, regex scans and the page title

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use super::css_extractor::collapse_whitespace;

static RATING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(?:[.,]\d+)?").unwrap());
static COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d\u{a0}\u{202f} .]*").unwrap());

/// All text nodes outside script/style, joined by single spaces
pub fn visible_text(document: &Html) -> String {
    let mut parts: Vec<&str> = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element())
            .is_some_and(|el| matches!(el.name(), "script" | "style" | "noscript" | "template"));
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }

    collapse_whitespace(&parts.join(" "))
}

pub fn page_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
}

/// Drop a trailing site-name suffix such as " - Cdiscount" (ASCII case-insensitive)
pub fn strip_title_suffixes(title: &str, suffixes: &[String]) -> String {
    let title = title.trim();
    for suffix in suffixes.iter().filter(|s| !s.trim().is_empty()) {
        if title.len() < suffix.len() {
            continue;
        }
        let cut = title.len() - suffix.len();
        if title.is_char_boundary(cut) && title[cut..].eq_ignore_ascii_case(suffix) {
            return title[..cut].trim().to_string();
        }
    }
    title.to_string()
}

/// Every full match of `pattern` in `text`, in order
pub fn pattern_matches(text: &str, pattern: &Regex) -> Vec<String> {
    pattern
        .find_iter(text)
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

/// "4,5/5" -> 4.5; only values on a five-star scale are kept
pub fn parse_rating(text: &str) -> Option<f32> {
    let number = RATING.find(text)?.as_str().replace(',', ".");
    number
        .parse::<f32>()
        .ok()
        .filter(|r| (0.0..=5.0).contains(r))
}

/// "(1 234 avis)" -> 1234
pub fn parse_review_count(text: &str) -> Option<u32> {
    let digits: String = COUNT
        .find(text)?
        .as_str()
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
