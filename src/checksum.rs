//! Content checksums for change detection
//!
//! The digest covers only the commercially meaningful state of a product
//! (name, selling price, availability), so two collections of an unchanged
//! offer always hash the same.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::CanonicalRecord;

const SEPARATOR: char = '\u{1f}';

/// Hex-encoded SHA-256 digest, 64 characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentChecksum(String);

impl ContentChecksum {
    pub fn of(name: Option<&str>, price: Option<Decimal>, available: bool) -> Self {
        let canonical = canonical_string(name, price, available);
        Self(hex::encode(Sha256::digest(canonical.as_bytes())))
    }

    pub fn for_record(record: &CanonicalRecord) -> Self {
        Self::of(
            record.product_name.as_deref(),
            record.selling_price(),
            record.available,
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentChecksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// 829 and 829.00 are the same price
fn canonical_string(name: Option<&str>, price: Option<Decimal>, available: bool) -> String {
    let price = price
        .map(|p| p.normalize().to_string())
        .unwrap_or_default();
    format!(
        "{}{SEPARATOR}{}{SEPARATOR}{}",
        name.unwrap_or("").trim(),
        price,
        available
    )
}
