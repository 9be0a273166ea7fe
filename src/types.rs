//! Core data model shared by the fetch, extraction and collection stages

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::checksum::ContentChecksum;

/// Product fields the extractor knows how to look for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Price,
    /// Crossed-out reference price shown next to a discounted one
    RegularPrice,
    Availability,
    Rating,
    ReviewCount,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Name,
        Field::Price,
        Field::RegularPrice,
        Field::Availability,
        Field::Rating,
        Field::ReviewCount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Price => "price",
            Field::RegularPrice => "regular_price",
            Field::Availability => "availability",
            Field::Rating => "rating",
            Field::ReviewCount => "review_count",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One (site, product, URL) tuple to collect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub site: String,
    pub product_id: String,
    pub url: Url,
}

impl Target {
    pub fn new(site: impl Into<String>, product_id: impl Into<String>, url: Url) -> Self {
        Self {
            site: site.into(),
            product_id: product_id.into(),
            url,
        }
    }
}

/// Successful fetch result, consumed once by extraction
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub url: String,
    pub body: Vec<u8>,
    pub status: u16,
    pub latency: Duration,
    /// Attempts used, including the successful one
    pub attempts: u32,
    pub content_type: Option<String>,
}

impl RawDocument {
    /// Lower-cased `charset` parameter of the Content-Type header
    pub fn charset(&self) -> Option<String> {
        self.content_type
            .as_deref()?
            .split(';')
            .filter_map(|param| param.trim().split_once('='))
            .find(|(key, _)| key.trim().eq_ignore_ascii_case("charset"))
            .map(|(_, value)| value.trim().trim_matches('"').to_ascii_lowercase())
    }

    /// Body decoded with the declared charset. Without a declaration the body
    /// is read as UTF-8, falling back to Latin-1 when it is not valid UTF-8.
    pub fn text(&self) -> Cow<'_, str> {
        match self.charset().as_deref() {
            Some("iso-8859-1" | "iso-8859-15" | "latin1" | "latin-1" | "windows-1252" | "cp1252") => {
                Cow::Owned(decode_latin1(&self.body))
            }
            Some(_) => String::from_utf8_lossy(&self.body),
            None => match std::str::from_utf8(&self.body) {
                Ok(text) => Cow::Borrowed(text),
                Err(_) => Cow::Owned(decode_latin1(&self.body)),
            },
        }
    }
}

// Every Latin-1 byte is the code point of the same value
fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Which kind of strategy produced a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Jsonld,
    Microdata,
    Meta,
    Css,
    TextPattern,
    PageText,
    PageTitle,
}

impl StrategyKind {
    /// Free-text strategies scan the whole page rather than a located element
    pub fn is_free_text(&self) -> bool {
        matches!(
            self,
            StrategyKind::TextPattern | StrategyKind::PageText | StrategyKind::PageTitle
        )
    }
}

/// Winning raw value for one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionCandidate {
    pub field: Field,
    pub raw_text: String,
    pub strategy: StrategyKind,
    /// Position in the field's strategy list; 0 is the highest priority
    pub rank: usize,
}

impl ExtractionCandidate {
    pub fn provenance(&self) -> Provenance {
        Provenance {
            field: self.field,
            strategy: self.strategy,
            rank: self.rank,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub field: Field,
    pub strategy: StrategyKind,
    pub rank: usize,
}

/// Normalized outcome of collecting one target, handed to the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub target: Target,
    pub product_name: Option<String>,
    pub price: Option<Decimal>,
    pub promo_price: Option<Decimal>,
    pub on_promotion: bool,
    pub available: bool,
    pub rating: Option<f32>,
    pub review_count: Option<u32>,
    pub stock_text: Option<String>,
    pub collected_at: DateTime<Utc>,
    pub checksum: ContentChecksum,
    pub provenance: Vec<Provenance>,
    /// Leading slice of the page, kept for debugging selector drift
    pub raw_sample: String,
}

impl CanonicalRecord {
    /// Price a customer pays today: the promotional price when there is one
    pub fn selling_price(&self) -> Option<Decimal> {
        self.promo_price.or(self.price)
    }
}
