//! Run configuration
//!
//! Everything the engine needs is carried in one [`CollectorConfig`], loaded
//! from JSON and passed explicitly to the collector. Every section has
//! defaults, so a config only has to list sites and their targets.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::availability::AvailabilityKeywords;
use crate::error::ConfigError;
use crate::extractors::{FieldExtractor, FieldSpec, SiteExtractor, Strategy};
use crate::fetcher::FetchConfig;
use crate::pacing::PacingConfig;
use crate::price::{PriceBounds, PriceNormalizer};
use crate::types::{Field, Target};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub fetch: FetchConfig,
    pub pacing: PacingConfig,
    pub prices: PriceConfig,
    pub availability: AvailabilityKeywords,
    pub sites: Vec<SiteConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceConfig {
    pub page: PriceBounds,
    pub text_scan: PriceBounds,
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            page: PriceBounds::page(),
            text_scan: PriceBounds::text_scan(),
        }
    }
}

impl PriceConfig {
    pub fn normalizer(&self) -> PriceNormalizer {
        PriceNormalizer::new(self.page, self.text_scan)
    }
}

/// One competitor site and the product pages to collect from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Removed from page titles before they are used as product names.
    /// Derived from `id` and `name` when empty.
    #[serde(default)]
    pub title_suffixes: Vec<String>,
    /// Replaces the built-in strategy list for the given fields
    #[serde(default)]
    pub fields: BTreeMap<Field, Vec<Strategy>>,
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub product_id: String,
    pub url: Url,
}

impl SiteConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            title_suffixes: Vec::new(),
            fields: BTreeMap::new(),
            targets: Vec::new(),
        }
    }

    pub fn with_target(mut self, product_id: impl Into<String>, url: Url) -> Self {
        self.targets.push(TargetConfig {
            product_id: product_id.into(),
            url,
        });
        self
    }

    pub fn with_strategies(mut self, field: Field, strategies: Vec<Strategy>) -> Self {
        self.fields.insert(field, strategies);
        self
    }

    pub fn targets(&self) -> impl Iterator<Item = Target> + '_ {
        self.targets
            .iter()
            .map(|t| Target::new(self.id.as_str(), t.product_id.as_str(), t.url.clone()))
    }

    pub fn title_suffixes(&self) -> Vec<String> {
        if !self.title_suffixes.is_empty() {
            return self.title_suffixes.clone();
        }
        let mut labels = vec![self.id.as_str()];
        if let Some(name) = self.name.as_deref() {
            labels.push(name);
        }
        labels
            .into_iter()
            .flat_map(|label| [format!(" - {label}"), format!(" | {label}")])
            .collect()
    }

    /// Built-in specs with this site's overrides applied
    pub fn field_specs(&self) -> Vec<FieldSpec> {
        Field::ALL
            .iter()
            .map(|field| match self.fields.get(field) {
                Some(strategies) => FieldSpec::new(*field, strategies.clone()),
                None => FieldSpec::defaults(*field),
            })
            .collect()
    }

    pub fn extractor(&self, prices: PriceNormalizer) -> Result<SiteExtractor, ConfigError> {
        let fields = FieldExtractor::new(prices).with_title_suffixes(self.title_suffixes());
        SiteExtractor::new(fields, &self.field_specs())
    }
}

impl CollectorConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn site(&self, id: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|s| s.id == id)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if self.pacing.min_delay_ms > self.pacing.max_delay_ms {
            return Err(ConfigError::InvalidPacing {
                min_ms: self.pacing.min_delay_ms,
                max_ms: self.pacing.max_delay_ms,
            });
        }
        self.prices.page.validate("page price")?;
        self.prices.text_scan.validate("text-scan price")?;

        let mut seen = HashSet::new();
        for site in &self.sites {
            if !seen.insert(site.id.as_str()) {
                return Err(ConfigError::DuplicateSite(site.id.clone()));
            }
            site.extractor(self.prices.normalizer())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    const CONFIG: &str = r#"{
        "pacing": {"min_delay_ms": 1000, "max_delay_ms": 2000},
        "prices": {"page": {"min": "1", "max": "5000"}},
        "sites": [
            {
                "id": "cdiscount",
                "name": "Cdiscount",
                "targets": [
                    {"product_id": "iphone-15", "url": "https://www.cdiscount.com/f-1.html"}
                ]
            },
            {
                "id": "boulanger",
                "fields": {
                    "price": [{"source": "css", "selector": ".price__amount"}]
                },
                "targets": []
            }
        ]
    }"#;

    #[test]
    fn test_load_with_defaults() {
        let config = CollectorConfig::from_json_str(CONFIG).unwrap();

        assert_eq!(config.fetch.max_attempts, 3);
        assert_eq!(config.pacing.max_delay_ms, 2000);
        assert_eq!(config.prices.page.max, Decimal::from(5000));
        assert_eq!(config.prices.text_scan, PriceBounds::text_scan());

        let cdiscount = config.site("cdiscount").unwrap();
        let targets: Vec<Target> = cdiscount.targets().collect();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].site, "cdiscount");
        assert_eq!(targets[0].product_id, "iphone-15");
        assert!(cdiscount.title_suffixes().contains(&" - Cdiscount".to_string()));
    }

    #[test]
    fn test_field_override_replaces_defaults() {
        let config = CollectorConfig::from_json_str(CONFIG).unwrap();
        let specs = config.site("boulanger").unwrap().field_specs();

        let price = specs.iter().find(|s| s.field == Field::Price).unwrap();
        assert_eq!(price.strategies, vec![Strategy::css(".price__amount")]);
        let name = specs.iter().find(|s| s.field == Field::Name).unwrap();
        assert_eq!(name, &FieldSpec::defaults(Field::Name));
    }

    #[test]
    fn test_rejects_bad_config() {
        let duplicate = r#"{"sites": [{"id": "a"}, {"id": "a"}]}"#;
        assert!(matches!(
            CollectorConfig::from_json_str(duplicate),
            Err(ConfigError::DuplicateSite(_))
        ));

        let bad_pattern = r#"{"sites": [{"id": "a", "fields": {"price": [{"source": "text_pattern", "pattern": "("}]}}]}"#;
        assert!(matches!(
            CollectorConfig::from_json_str(bad_pattern),
            Err(ConfigError::InvalidPattern { .. })
        ));

        let inverted = r#"{"pacing": {"min_delay_ms": 5000, "max_delay_ms": 10}}"#;
        assert!(matches!(
            CollectorConfig::from_json_str(inverted),
            Err(ConfigError::InvalidPacing { .. })
        ));

        let bad_url = r#"{"sites": [{"id": "a", "targets": [{"product_id": "x", "url": "not a url"}]}]}"#;
        assert!(matches!(
            CollectorConfig::from_json_str(bad_url),
            Err(ConfigError::Json(_))
        ));
    }
}
