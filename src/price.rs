//! Price text normalization
//!
//! Accepts whatever a page puts next to a price ("1.234,56 €", "EUR 12.50",
//! "829,00") and produces a decimal, or nothing if the result is not a
//! plausible product price.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{ExtractionCandidate, StrategyKind};

/// Inclusive range a parsed price must fall in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBounds {
    pub min: Decimal,
    pub max: Decimal,
}

impl PriceBounds {
    pub fn new(min: Decimal, max: Decimal) -> Self {
        Self { min, max }
    }

    /// Bounds for prices read from a located page element
    pub fn page() -> Self {
        Self::new(Decimal::ONE, Decimal::from(10_000))
    }

    /// Narrower bounds for numbers found by scanning the whole page text
    pub fn text_scan() -> Self {
        Self::new(Decimal::from(100), Decimal::from(3_000))
    }

    pub fn contains(&self, value: Decimal) -> bool {
        value >= self.min && value <= self.max
    }

    pub(crate) fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        if self.min > self.max {
            return Err(ConfigError::InvalidBounds {
                name,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceNormalizer {
    page: PriceBounds,
    text_scan: PriceBounds,
}

impl Default for PriceNormalizer {
    fn default() -> Self {
        Self::new(PriceBounds::page(), PriceBounds::text_scan())
    }
}

impl PriceNormalizer {
    pub fn new(page: PriceBounds, text_scan: PriceBounds) -> Self {
        Self { page, text_scan }
    }

    /// Parse with the page bounds
    pub fn parse(&self, text: &str) -> Option<Decimal> {
        self.parse_within(text, self.page)
    }

    pub fn parse_within(&self, text: &str, bounds: PriceBounds) -> Option<Decimal> {
        parse_decimal(text).filter(|value| bounds.contains(*value))
    }

    pub fn bounds_for(&self, strategy: StrategyKind) -> PriceBounds {
        if strategy.is_free_text() {
            self.text_scan
        } else {
            self.page
        }
    }

    pub fn parse_candidate(&self, candidate: &ExtractionCandidate) -> Option<Decimal> {
        self.parse_within(&candidate.raw_text, self.bounds_for(candidate.strategy))
    }
}

/// Parse a price string without any range check.
///
/// Everything except digits, `,` and `.` is dropped. With both separators
/// present the period groups thousands and the comma marks decimals; a lone
/// comma is a decimal separator.
pub fn parse_decimal(text: &str) -> Option<Decimal> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();

    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let canonical = match (cleaned.contains(','), cleaned.contains('.')) {
        (true, true) => cleaned.replace('.', "").replace(',', "."),
        (true, false) => cleaned.replace(',', "."),
        _ => cleaned,
    };

    Decimal::from_str(&canonical).ok()
}
