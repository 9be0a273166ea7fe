//! JSON-LD extraction from HTML
//!
//! Extracts JSON-LD data from <script type="application/ld+json"> tags.
//! Supports @graph arrays and multiple JSON-LD blocks.

use scraper::{Html, Selector};
use serde_json::{Map, Value};

/// Extract JSON-LD data from a parsed page, keyed by @type
pub fn extract_jsonld(document: &Html) -> Value {
    let selector = match Selector::parse(r#"script[type="application/ld+json"]"#) {
        Ok(s) => s,
        Err(_) => return Value::Object(Map::new()),
    };

    let mut result: Map<String, Value> = Map::new();

    for element in document.select(&selector) {
        let content: String = element.text().collect();
        let trimmed = content.trim();

        if trimmed.is_empty() {
            continue;
        }

        // Broken blocks are common on shop pages; skip them
        if let Ok(json) = serde_json::from_str::<Value>(trimmed) {
            flatten_block(&json, &mut result);
        }
    }

    Value::Object(result)
}

fn flatten_block(value: &Value, result: &mut Map<String, Value>) {
    match value {
        Value::Array(arr) => {
            for item in arr {
                flatten_block(item, result);
            }
        }
        Value::Object(obj) => {
            if let Some(Value::Array(graph_items)) = obj.get("@graph") {
                for item in graph_items {
                    index_by_type(item, result);
                }
            } else {
                index_by_type(value, result);
            }
        }
        _ => {}
    }
}

fn index_by_type(value: &Value, result: &mut Map<String, Value>) {
    let Value::Object(obj) = value else {
        return;
    };

    let type_key = match obj.get("@type") {
        Some(Value::String(s)) => Some(s.clone()),
        // Use first type in array
        Some(Value::Array(arr)) => arr.first().and_then(|v| v.as_str()).map(String::from),
        _ => None,
    };

    let Some(type_name) = type_key else {
        return;
    };

    push_keyed(result, type_name, value.clone());
}

/// Insert under `key`; a repeated key turns the entry into an array
pub(crate) fn push_keyed(map: &mut Map<String, Value>, key: String, value: Value) {
    match map.get_mut(&key) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            map.insert(key, value);
        }
    }
}

/// Resolve a dot path such as `Product.offers.price` or `Product.offers[1].price`.
///
/// Arrays met along the way are searched element by element, so a path
/// written for a single offer also finds prices in an offer list. Returns
/// every scalar reached, in document order.
pub fn json_path_values(root: &Value, path: &str) -> Vec<String> {
    let mut current: Vec<&Value> = vec![root];

    for segment in path.split('.').filter(|s| !s.is_empty()) {
        let (key, index) = split_index(segment);
        let mut next = Vec::new();
        for value in current {
            collect_key(value, key, &mut next);
        }
        if let Some(index) = index {
            next = next.into_iter().filter_map(|v| v.get(index)).collect();
        }
        current = next;
    }

    let mut out = Vec::new();
    for value in current {
        collect_scalars(value, &mut out);
    }
    out
}

fn split_index(segment: &str) -> (&str, Option<usize>) {
    match (segment.find('['), segment.find(']')) {
        (Some(open), Some(close)) if close > open => {
            (&segment[..open], segment[open + 1..close].parse().ok())
        }
        _ => (segment, None),
    }
}

fn collect_key<'a>(value: &'a Value, key: &str, out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_key(item, key, out);
            }
        }
        Value::Object(map) => {
            if let Some(v) = map.get(key) {
                out.push(v);
            }
        }
        _ => {}
    }
}

fn collect_scalars(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.trim().to_string()),
        Value::Number(n) => out.push(n.to_string()),
        Value::Bool(b) => out.push(b.to_string()),
        Value::Array(items) => {
            for item in items {
                collect_scalars(item, out);
            }
        }
        Value::Object(_) | Value::Null => {}
    }
}
