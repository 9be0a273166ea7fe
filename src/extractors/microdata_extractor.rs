//! Microdata (schema.org HTML attributes) extraction
//!
//! Extracts microdata from itemscope/itemprop/itemtype attributes.
//! Reference: https://html.spec.whatwg.org/multipage/microdata.html

use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};

use super::jsonld_extractor::push_keyed;

/// Extract top-level microdata items from a parsed page, keyed by itemtype
pub fn extract_microdata(document: &Html) -> Value {
    let selector = match Selector::parse("[itemscope]") {
        Ok(s) => s,
        Err(_) => return Value::Object(Map::new()),
    };

    let mut result: Map<String, Value> = Map::new();

    for element in document.select(&selector) {
        // Nested scopes are handled as properties of their parent
        let is_nested = element
            .ancestors()
            .filter_map(|n| n.value().as_element())
            .any(|el| el.attr("itemscope").is_some());

        if is_nested {
            continue;
        }

        let item = extract_item(&element);
        let Some(type_name) = item.get("@type").and_then(|v| v.as_str()).map(String::from) else {
            continue;
        };

        push_keyed(&mut result, type_name, item);
    }

    Value::Object(result)
}

fn extract_item(element: &ElementRef) -> Value {
    let mut item: Map<String, Value> = Map::new();

    if let Some(itemtype) = element.value().attr("itemtype") {
        // "https://schema.org/Product" -> "Product"
        let type_name = itemtype.rsplit('/').next().unwrap_or(itemtype);
        item.insert("@type".to_string(), Value::String(type_name.to_string()));
    }

    let prop_selector = match Selector::parse("[itemprop]") {
        Ok(s) => s,
        Err(_) => return Value::Object(item),
    };

    for prop_element in element.select(&prop_selector) {
        if belongs_to_nested_scope(element, &prop_element) {
            continue;
        }

        let Some(prop_name) = prop_element.value().attr("itemprop") else {
            continue;
        };

        let prop_value = if prop_element.value().attr("itemscope").is_some() {
            extract_item(&prop_element)
        } else {
            Value::String(scalar_value(&prop_element))
        };

        push_keyed(&mut item, prop_name.to_string(), prop_value);
    }

    Value::Object(item)
}

// True when another itemscope sits between the property and `scope`
fn belongs_to_nested_scope(scope: &ElementRef, prop_element: &ElementRef) -> bool {
    let mut current = prop_element.parent();

    while let Some(parent_node) = current {
        if parent_node.id() == scope.id() {
            return false;
        }
        if let Some(parent_elem) = parent_node.value().as_element() {
            if parent_elem.attr("itemscope").is_some() {
                return true;
            }
        }
        current = parent_node.parent();
    }

    false
}

fn scalar_value(prop_element: &ElementRef) -> String {
    let el = prop_element.value();
    let value = match el.name() {
        "meta" => el.attr("content").unwrap_or("").to_string(),
        "link" | "a" | "area" => el.attr("href").unwrap_or("").to_string(),
        "img" | "audio" | "video" | "source" => el.attr("src").unwrap_or("").to_string(),
        "time" => el
            .attr("datetime")
            .map(String::from)
            .unwrap_or_else(|| prop_element.text().collect()),
        "data" | "meter" => el.attr("value").unwrap_or("").to_string(),
        // Shops often put the machine-readable price in `content` on a span
        _ => el
            .attr("content")
            .map(String::from)
            .unwrap_or_else(|| prop_element.text().collect()),
    };
    value.trim().to_string()
}
