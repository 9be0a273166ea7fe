//! Stock availability classification from free text

use serde::{Deserialize, Serialize};

/// Keyword phrases checked against lower-cased text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvailabilityKeywords {
    /// Checked first; any hit means unavailable
    pub negative: Vec<String>,
    pub positive: Vec<String>,
}

impl Default for AvailabilityKeywords {
    fn default() -> Self {
        let to_vec = |words: &[&str]| words.iter().map(|w| w.to_string()).collect();
        Self {
            negative: to_vec(&[
                "rupture",
                "indisponible",
                "non disponible",
                "out of stock",
                "épuisé",
                "sold out",
                "outofstock",
                "soldout",
            ]),
            positive: to_vec(&[
                "en stock",
                "disponible",
                "available",
                "livraison",
                "expedie",
                "expédié",
                "in stock",
                "instock",
            ]),
        }
    }
}

/// What decided a classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvailabilitySignal {
    Unavailable(String),
    Available(String),
    /// Nothing matched; pages are assumed in stock
    Default,
}

impl AvailabilitySignal {
    pub fn is_available(&self) -> bool {
        !matches!(self, AvailabilitySignal::Unavailable(_))
    }
}

#[derive(Debug, Clone)]
pub struct AvailabilityClassifier {
    negative: Vec<String>,
    positive: Vec<String>,
}

impl Default for AvailabilityClassifier {
    fn default() -> Self {
        Self::new(&AvailabilityKeywords::default())
    }
}

impl AvailabilityClassifier {
    pub fn new(keywords: &AvailabilityKeywords) -> Self {
        let lower = |words: &[String]| {
            words
                .iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect()
        };
        Self {
            negative: lower(&keywords.negative),
            positive: lower(&keywords.positive),
        }
    }

    pub fn classify(&self, text: &str) -> bool {
        self.signal(text).is_available()
    }

    pub fn signal(&self, text: &str) -> AvailabilitySignal {
        let text = text.to_lowercase();

        if let Some(word) = self.negative.iter().find(|w| text.contains(w.as_str())) {
            return AvailabilitySignal::Unavailable(word.clone());
        }
        if let Some(word) = self.positive.iter().find(|w| text.contains(w.as_str())) {
            return AvailabilitySignal::Available(word.clone());
        }
        AvailabilitySignal::Default
    }
}
