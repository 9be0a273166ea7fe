//! Competitor price collection
//!
//! Fetches configured product pages with bounded retries, extracts product
//! fields through ranked fallback strategies, and writes normalized records
//! with per-site run statistics:
//! - JSON-LD (with @graph support) and microdata (schema.org)
//! - meta tags and CSS selectors
//! - visible-text patterns and the page title as last resorts
//!
//! [`Collector::run_collection`] is the entry point.

pub mod availability;
pub mod checksum;
pub mod collector;
pub mod config;
pub mod error;
pub mod extractors;
pub mod fetcher;
pub mod pacing;
pub mod price;
pub mod stats;
pub mod store;
pub mod types;

#[cfg(test)]
mod testing;

pub use availability::{AvailabilityClassifier, AvailabilityKeywords};
pub use checksum::ContentChecksum;
pub use collector::Collector;
pub use config::{CollectorConfig, PriceConfig, SiteConfig, TargetConfig};
pub use error::{CollectError, ConfigError, FetchErrorKind, FetchFailure, StoreError, TransportError};
pub use extractors::{Document, FieldExtractor, FieldSpec, SiteExtractor, Strategy};
pub use fetcher::{FetchConfig, Fetcher, RetryPolicy, Transport, UreqTransport};
pub use pacing::{Pacer, PacingConfig, Sleeper, ThreadSleeper};
pub use price::{PriceBounds, PriceNormalizer};
pub use stats::{RunOutcome, RunSummary, SiteRunStats, SiteStatus};
pub use store::{JsonLinesStore, MemoryStore, RecordStore};
pub use types::{CanonicalRecord, ExtractionCandidate, Field, Provenance, RawDocument, StrategyKind, Target};
