//! Collection passes over the configured sites
//!
//! Sites run in configuration order and targets within a site run one after
//! another, with a randomized pause between consecutive targets. A target
//! that cannot be fetched or stored is counted as an error and the pass moves
//! on; only an invalid site filter or configuration aborts the run.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::availability::AvailabilityClassifier;
use crate::checksum::ContentChecksum;
use crate::config::{CollectorConfig, SiteConfig};
use crate::error::{CollectError, ConfigError, FetchFailure};
use crate::extractors::{parse_rating, parse_review_count, truncate_chars, Document, SiteExtractor};
use crate::fetcher::{Fetcher, RetryPolicy, Transport};
use crate::pacing::{Pacer, Sleeper, ThreadSleeper};
use crate::price::PriceNormalizer;
use crate::stats::{RunSummary, SitePass, SiteRunStats};
use crate::store::RecordStore;
use crate::types::{CanonicalRecord, ExtractionCandidate, Field, RawDocument, Target};

pub const RAW_SAMPLE_CHARS: usize = 500;
pub const STOCK_TEXT_CHARS: usize = 120;

pub struct Collector<T, S, Z = ThreadSleeper> {
    config: CollectorConfig,
    fetcher: Fetcher<T, Z>,
    store: S,
    pacer: Pacer,
    prices: PriceNormalizer,
    availability: AvailabilityClassifier,
}

impl<T: Transport, S: RecordStore, Z: Sleeper> Collector<T, S, Z> {
    pub fn new(config: CollectorConfig, transport: T, store: S, sleeper: Z) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            fetcher: Fetcher::with_sleeper(transport, RetryPolicy::from(&config.fetch), sleeper),
            store,
            pacer: Pacer::new(&config.pacing),
            prices: config.prices.normalizer(),
            availability: AvailabilityClassifier::new(&config.availability),
            config,
        })
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &Fetcher<T, Z> {
        &self.fetcher
    }

    /// Run one pass per selected site; `None` selects every configured site
    pub fn run_collection(&self, site_filter: Option<&[String]>) -> Result<RunSummary, CollectError> {
        let started_at = Utc::now();
        let started = Instant::now();

        let sites = self
            .select_sites(site_filter)?
            .into_iter()
            .map(|site| site.extractor(self.prices).map(|extractor| (site, extractor)))
            .collect::<Result<Vec<_>, _>>()?;

        info!(sites = sites.len(), "starting collection run");

        let mut stats = Vec::with_capacity(sites.len());
        for (site, extractor) in &sites {
            stats.push(self.run_site(site, extractor));
        }

        let summary = RunSummary::new(started_at, started.elapsed(), stats);
        info!(
            attempted = summary.attempted(),
            succeeded = summary.succeeded(),
            errors = summary.errors(),
            duration_ms = summary.duration.as_millis() as u64,
            "collection run finished"
        );
        Ok(summary)
    }

    fn select_sites(&self, filter: Option<&[String]>) -> Result<Vec<&SiteConfig>, CollectError> {
        let Some(filter) = filter else {
            return Ok(self.config.sites.iter().collect());
        };
        if filter.is_empty() {
            return Err(CollectError::EmptySiteFilter);
        }
        if let Some(unknown) = filter.iter().find(|id| self.config.site(id).is_none()) {
            return Err(CollectError::UnknownSite(unknown.clone()));
        }
        Ok(self
            .config
            .sites
            .iter()
            .filter(|site| filter.contains(&site.id))
            .collect())
    }

    fn run_site(&self, site: &SiteConfig, extractor: &SiteExtractor) -> SiteRunStats {
        info!(site = %site.id, targets = site.targets.len(), "starting site pass");
        let mut pass = SitePass::start(&site.id);

        for (index, target) in site.targets().enumerate() {
            if index > 0 {
                self.pacer.pause(self.fetcher.sleeper());
            }

            let record = match self.collect_target(&target, extractor) {
                Ok(record) => record,
                Err(failure) => {
                    warn!(
                        site = %target.site,
                        product = %target.product_id,
                        attempts = failure.attempts,
                        error = %failure.last,
                        "target failed"
                    );
                    pass.record_error();
                    continue;
                }
            };

            match self.store.save_record(&record) {
                Ok(()) => {
                    debug!(
                        site = %target.site,
                        product = %target.product_id,
                        price = ?record.price,
                        available = record.available,
                        "record saved"
                    );
                    pass.record_success();
                }
                Err(e) => {
                    warn!(site = %target.site, product = %target.product_id, error = %e, "failed to save record");
                    pass.record_error();
                }
            }
        }

        let stats = pass.finish();
        info!(
            site = %stats.site,
            attempted = stats.attempted,
            succeeded = stats.succeeded,
            errors = stats.errors,
            status = ?stats.status,
            "site pass finished"
        );
        if let Err(e) = self.store.save_site_run_stats(&stats) {
            warn!(site = %stats.site, error = %e, "failed to save site run stats");
        }
        stats
    }

    fn collect_target(&self, target: &Target, extractor: &SiteExtractor) -> Result<CanonicalRecord, FetchFailure> {
        let raw = self.fetcher.fetch(target.url.as_str())?;
        let document = Document::from_raw(&raw);
        let candidates = extractor.extract_all(&document);
        Ok(self.build_record(target, &raw, &candidates))
    }

    fn build_record(
        &self,
        target: &Target,
        raw: &RawDocument,
        candidates: &BTreeMap<Field, ExtractionCandidate>,
    ) -> CanonicalRecord {
        let candidate = |field: Field| candidates.get(&field);

        let current = candidate(Field::Price).and_then(|c| self.prices.parse_candidate(c));
        let regular = candidate(Field::RegularPrice).and_then(|c| self.prices.parse_candidate(c));
        let (price, promo_price) = match (current, regular) {
            (Some(current), Some(regular)) if regular > current => (Some(regular), Some(current)),
            (current, _) => (current, None),
        };

        let availability = candidate(Field::Availability);
        let available = availability
            .map(|c| self.availability.classify(&c.raw_text))
            .unwrap_or(true);
        let stock_text = availability
            .filter(|c| !c.strategy.is_free_text())
            .map(|c| truncate_chars(&c.raw_text, STOCK_TEXT_CHARS));

        let product_name = candidate(Field::Name).map(|c| c.raw_text.clone());
        let checksum = ContentChecksum::of(product_name.as_deref(), promo_price.or(price), available);

        CanonicalRecord {
            target: target.clone(),
            product_name,
            price,
            promo_price,
            on_promotion: promo_price.is_some(),
            available,
            rating: candidate(Field::Rating).and_then(|c| parse_rating(&c.raw_text)),
            review_count: candidate(Field::ReviewCount).and_then(|c| parse_review_count(&c.raw_text)),
            stock_text,
            collected_at: Utc::now(),
            checksum,
            provenance: candidates.values().map(ExtractionCandidate::provenance).collect(),
            raw_sample: truncate_chars(&raw.text(), RAW_SAMPLE_CHARS),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::time::Duration;

    use rust_decimal::Decimal;
    use url::Url;

    use super::*;
    use crate::pacing::PacingConfig;
    use crate::stats::{RunOutcome, SiteStatus};
    use crate::store::MemoryStore;
    use crate::testing::{RecordingSleeper, ScriptedTransport};
    use crate::types::StrategyKind;

    const URL_A: &str = "https://www.cdiscount.com/iphone-15.html";
    const URL_B: &str = "https://www.cdiscount.com/galaxy-s24.html";
    const URL_C: &str = "https://www.cdiscount.com/pixel-8.html";
    const URL_D: &str = "https://www.boulanger.com/ref/1190123";

    const PAGE_A: &str = r#"<html><head><title>Apple iPhone 15 128 Go Noir - Cdiscount</title></head>
        <body>
            <h1 class="fpHdrDsc">Apple iPhone 15 128 Go Noir</h1>
            <div class="fpPrice"><span class="price">799,00 €</span></div>
            <span class="fpStriked">829,00 €</span>
            <div class="fpStock">En stock</div>
        </body></html>"#;

    const PAGE_C: &str = r#"<html><head><title>Google Pixel 8 - Cdiscount</title></head>
        <body>
            <h1>Google Pixel 8 128 Go</h1>
            <p>Prix bientôt disponible</p>
        </body></html>"#;

    const PAGE_D: &str = r#"<html><head>
        <script type="application/ld+json">
        {"@type": "Product", "name": "Dyson V15 Detect Absolute",
         "offers": {"price": "649.00", "availability": "https://schema.org/OutOfStock"}}
        </script></head><body><h1>Dyson V15</h1></body></html>"#;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn config() -> CollectorConfig {
        CollectorConfig {
            pacing: PacingConfig {
                min_delay_ms: 1_000,
                max_delay_ms: 1_000,
            },
            sites: vec![
                SiteConfig::new("cdiscount")
                    .with_target("iphone-15", url(URL_A))
                    .with_target("galaxy-s24", url(URL_B))
                    .with_target("pixel-8", url(URL_C)),
                SiteConfig::new("boulanger").with_target("dyson-v15", url(URL_D)),
            ],
            ..CollectorConfig::default()
        }
    }

    fn transport() -> ScriptedTransport {
        ScriptedTransport::default()
            .script(URL_A, vec![ScriptedTransport::page(PAGE_A)])
            .script(
                URL_B,
                vec![
                    ScriptedTransport::status(500),
                    ScriptedTransport::status(503),
                    ScriptedTransport::status(500),
                ],
            )
            .script(URL_C, vec![ScriptedTransport::page(PAGE_C)])
            .script(URL_D, vec![ScriptedTransport::page(PAGE_D)])
    }

    #[test]
    fn test_failures_are_counted_per_site() {
        let store = MemoryStore::new();
        let sleeper = RecordingSleeper::default();
        let collector = Collector::new(config(), transport(), &store, sleeper.clone()).unwrap();

        let summary = collector.run_collection(None).unwrap();

        let cdiscount = summary.site("cdiscount").unwrap();
        assert_eq!(cdiscount.attempted, 3);
        assert_eq!(cdiscount.succeeded, 2);
        assert_eq!(cdiscount.errors, 1);
        assert_eq!(cdiscount.status, SiteStatus::Warning);

        let boulanger = summary.site("boulanger").unwrap();
        assert_eq!(boulanger.succeeded, 1);
        assert_eq!(summary.attempted(), 4);
        assert_eq!(summary.succeeded(), 3);
        assert_eq!(summary.outcome(), RunOutcome::PartialSuccess { errors: 1 });
        assert_eq!(summary.success_rate(), Some(0.75));

        assert_eq!(collector.fetcher().transport().calls(URL_B), 3);
        assert_eq!(store.site_runs().len(), 2);

        // pause before B, two retry waits for B, pause before C
        assert_eq!(
            sleeper.sleeps(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(2),
                Duration::from_secs(1),
            ]
        );
    }

    #[test]
    fn test_records_are_normalized() {
        let store = MemoryStore::new();
        let collector = Collector::new(config(), transport(), &store, RecordingSleeper::default()).unwrap();
        collector.run_collection(None).unwrap();

        let records = store.records();
        assert_eq!(records.len(), 3);

        let iphone = &records[0];
        assert_eq!(iphone.target.product_id, "iphone-15");
        assert_eq!(iphone.product_name.as_deref(), Some("Apple iPhone 15 128 Go Noir"));
        assert_eq!(iphone.price, Some(Decimal::from_str("829.00").unwrap()));
        assert_eq!(iphone.promo_price, Some(Decimal::from_str("799.00").unwrap()));
        assert!(iphone.on_promotion);
        assert!(iphone.available);
        assert_eq!(iphone.stock_text.as_deref(), Some("En stock"));
        assert_eq!(iphone.checksum, ContentChecksum::for_record(iphone));
        assert!(iphone
            .provenance
            .iter()
            .any(|p| p.field == Field::Price && p.strategy == StrategyKind::Css));

        let pixel = &records[1];
        assert_eq!(pixel.target.product_id, "pixel-8");
        assert_eq!(pixel.price, None);
        assert!(!pixel.on_promotion);
        assert_eq!(pixel.stock_text, None);
        assert!(pixel.available);

        let dyson = &records[2];
        assert_eq!(dyson.product_name.as_deref(), Some("Dyson V15 Detect Absolute"));
        assert_eq!(dyson.price, Some(Decimal::from(649)));
        assert!(!dyson.available);
        assert!(dyson.raw_sample.chars().count() <= RAW_SAMPLE_CHARS);
    }

    #[test]
    fn test_site_filter() {
        let store = MemoryStore::new();
        let collector = Collector::new(config(), transport(), &store, RecordingSleeper::default()).unwrap();

        let filter = vec!["boulanger".to_string()];
        let summary = collector.run_collection(Some(filter.as_slice())).unwrap();
        assert_eq!(summary.sites.len(), 1);
        assert_eq!(summary.outcome(), RunOutcome::Success);
        assert_eq!(collector.fetcher().transport().calls(URL_A), 0);
    }

    #[test]
    fn test_invalid_filter_fails_before_fetching() {
        let store = MemoryStore::new();
        let collector = Collector::new(config(), transport(), &store, RecordingSleeper::default()).unwrap();

        let filter = vec!["boulanger".to_string(), "fnac".to_string()];
        let unknown = collector.run_collection(Some(filter.as_slice()));
        assert!(matches!(unknown, Err(CollectError::UnknownSite(site)) if site == "fnac"));
        assert!(matches!(
            collector.run_collection(Some(Vec::new().as_slice())),
            Err(CollectError::EmptySiteFilter)
        ));
        assert_eq!(collector.fetcher().transport().calls(URL_D), 0);
        assert!(store.site_runs().is_empty());
    }

    #[test]
    fn test_store_error_counts_as_target_error() {
        let store = MemoryStore::new().rejecting("dyson-v15");
        let collector = Collector::new(config(), transport(), &store, RecordingSleeper::default()).unwrap();

        let summary = collector.run_collection(None).unwrap();
        let boulanger = summary.site("boulanger").unwrap();
        assert_eq!(boulanger.errors, 1);
        assert_eq!(boulanger.status, SiteStatus::Error);
        assert_eq!(summary.errors(), 2);
    }

    #[test]
    fn test_all_targets_failing_is_total_failure() {
        let config = CollectorConfig {
            sites: vec![SiteConfig::new("cdiscount").with_target("galaxy-s24", url(URL_B))],
            ..CollectorConfig::default()
        };
        let store = MemoryStore::new();
        let collector = Collector::new(config, transport(), &store, RecordingSleeper::default()).unwrap();

        let summary = collector.run_collection(None).unwrap();
        assert_eq!(summary.outcome(), RunOutcome::TotalFailure);
        assert!(store.records().is_empty());
    }

    fn product_page(price: &str, striked: Option<&str>) -> String {
        let striked = striked
            .map(|p| format!(r#"<span class="fpStriked">{p}</span>"#))
            .unwrap_or_default();
        format!(
            r#"<html><body>
                <h1 class="fpHdrDsc">Apple iPhone 15 128 Go Noir</h1>
                <div class="fpPrice"><span class="price">{price}</span></div>
                {striked}
                <div class="fpStock">En stock</div>
            </body></html>"#
        )
    }

    #[test]
    fn test_price_drop_on_promotion_changes_checksum() {
        const MONDAY: &str = "https://www.cdiscount.com/iphone-15.html?d=1";
        const TUESDAY: &str = "https://www.cdiscount.com/iphone-15.html?d=2";
        let config = CollectorConfig {
            sites: vec![SiteConfig::new("cdiscount")
                .with_target("monday", url(MONDAY))
                .with_target("tuesday", url(TUESDAY))],
            ..CollectorConfig::default()
        };
        let transport = ScriptedTransport::default()
            .script(MONDAY, vec![ScriptedTransport::page(&product_page("829,00 €", None))])
            .script(
                TUESDAY,
                vec![ScriptedTransport::page(&product_page("699,00 €", Some("829,00 €")))],
            );
        let store = MemoryStore::new();
        let collector = Collector::new(config, transport, &store, RecordingSleeper::default()).unwrap();
        collector.run_collection(None).unwrap();

        let records = store.records();
        let (monday, tuesday) = (&records[0], &records[1]);
        assert_eq!(monday.promo_price, None);
        assert_eq!(tuesday.promo_price, Some(Decimal::from(699)));
        assert_eq!(tuesday.selling_price(), Some(Decimal::from(699)));
        assert_ne!(monday.checksum, tuesday.checksum);
        assert_eq!(
            tuesday.checksum,
            ContentChecksum::of(Some("Apple iPhone 15 128 Go Noir"), Some(Decimal::from(699)), true)
        );
    }

    #[test]
    fn test_stats_save_failure_is_not_counted() {
        let store = MemoryStore::new().rejecting_site_runs("cdiscount");
        let collector = Collector::new(config(), transport(), &store, RecordingSleeper::default()).unwrap();

        let summary = collector.run_collection(None).unwrap();

        let cdiscount = summary.site("cdiscount").unwrap();
        assert_eq!(cdiscount.attempted, 3);
        assert_eq!(cdiscount.succeeded, 2);
        assert_eq!(cdiscount.errors, 1);
        assert_eq!(summary.site("boulanger").unwrap().succeeded, 1);
        assert_eq!(collector.fetcher().transport().calls(URL_D), 1);

        let saved: Vec<String> = store.site_runs().into_iter().map(|s| s.site).collect();
        assert_eq!(saved, vec!["boulanger"]);
        assert_eq!(store.records().len(), 3);
    }

    #[test]
    fn test_latin1_page_is_classified() {
        let config = CollectorConfig {
            sites: vec![SiteConfig::new("cdiscount").with_target("iphone-15", url(URL_A))],
            ..CollectorConfig::default()
        };
        let page = product_page("799,00 EUR", None).replace("En stock", "Épuisé");
        let body: Vec<u8> = page.chars().map(|c| c as u32 as u8).collect();
        let transport = ScriptedTransport::default().script(
            URL_A,
            vec![ScriptedTransport::encoded_page(&body, "text/html; charset=ISO-8859-1")],
        );
        let store = MemoryStore::new();
        let collector = Collector::new(config, transport, &store, RecordingSleeper::default()).unwrap();
        collector.run_collection(None).unwrap();

        let record = &store.records()[0];
        assert!(!record.available);
        assert_eq!(record.stock_text.as_deref(), Some("Épuisé"));
        assert_eq!(record.price, Some(Decimal::from(799)));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = config();
        config.fetch.max_attempts = 0;
        let store = MemoryStore::new();
        assert!(matches!(
            Collector::new(config, transport(), &store, RecordingSleeper::default()),
            Err(ConfigError::ZeroAttempts)
        ));
    }
}
