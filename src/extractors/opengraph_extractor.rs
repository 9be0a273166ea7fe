//! OpenGraph and product meta tags
//!
//! Looks up `<meta property=..>` / `<meta name=..>` content such as
//! `og:title` or `product:price:amount`.

use scraper::{Html, Selector};

/// Content of every meta tag whose `property` or `name` equals `key`
pub fn extract_meta(document: &Html, key: &str) -> Vec<String> {
    let selector = match Selector::parse("meta[content]") {
        Ok(s) => s,
        Err(_) => return vec![],
    };

    document
        .select(&selector)
        .filter(|el| {
            let el = el.value();
            el.attr("property")
                .or_else(|| el.attr("name"))
                .is_some_and(|k| k.eq_ignore_ascii_case(key))
        })
        .filter_map(|el| el.value().attr("content"))
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .collect()
}
