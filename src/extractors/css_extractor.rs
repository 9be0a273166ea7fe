//! CSS selector-based extraction
//!
//! Uses the scraper crate to select elements by CSS selectors.

use scraper::{ElementRef, Html, Selector};

/// Text of every element matching `selector`, whitespace collapsed
pub fn extract_css_text(document: &Html, selector: &Selector) -> Vec<String> {
    document.select(selector).map(|el| element_text(&el)).collect()
}

/// Attribute value of every matching element that carries it
pub fn extract_css_attr(document: &Html, selector: &Selector, attr_name: &str) -> Vec<String> {
    document
        .select(selector)
        .filter_map(|el| el.value().attr(attr_name))
        .map(|v| v.trim().to_string())
        .collect()
}

pub fn element_text(element: &ElementRef) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
