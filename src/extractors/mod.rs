//! Field extraction with ranked fallback strategies
//!
//! Every field has an ordered list of [`Strategy`] values. Structured sources
//! (JSON-LD, microdata, meta tags, CSS selectors) come first, followed by
//! free-text scans of the page and finally the page title. The first strategy
//! producing a plausible value wins and the rest are skipped. A field with no
//! match is simply absent; other fields are unaffected.

mod css_extractor;
mod jsonld_extractor;
mod microdata_extractor;
mod opengraph_extractor;
mod text_extractor;

pub use css_extractor::*;
pub use jsonld_extractor::*;
pub use microdata_extractor::*;
pub use opengraph_extractor::*;
pub use text_extractor::*;

use std::cell::OnceCell;
use std::collections::BTreeMap;

use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::ConfigError;
use crate::price::PriceNormalizer;
use crate::types::{ExtractionCandidate, Field, RawDocument, StrategyKind};

/// Names longer than this are cut before storage
pub const MAX_NAME_CHARS: usize = 255;
const MIN_NAME_CHARS: usize = 3;

/// One way of locating a field's raw text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Strategy {
    /// Dot path into JSON-LD keyed by `@type`, e.g. `Product.offers.price`
    Jsonld { path: String },
    /// Dot path into microdata keyed by itemtype
    Microdata { path: String },
    /// `<meta property|name=..>` content
    Meta { property: String },
    /// Element text, or an attribute when `attr` is set
    Css {
        selector: String,
        #[serde(default)]
        attr: Option<String>,
    },
    /// Regex scanned over the visible page text
    TextPattern { pattern: String },
    /// The whole visible page text
    PageText,
    /// `<title>` with site-name suffixes removed
    PageTitle,
}

impl Strategy {
    pub fn jsonld(path: &str) -> Self {
        Strategy::Jsonld {
            path: path.to_string(),
        }
    }

    pub fn microdata(path: &str) -> Self {
        Strategy::Microdata {
            path: path.to_string(),
        }
    }

    pub fn meta(property: &str) -> Self {
        Strategy::Meta {
            property: property.to_string(),
        }
    }

    pub fn css(selector: &str) -> Self {
        Strategy::Css {
            selector: selector.to_string(),
            attr: None,
        }
    }

    pub fn css_attr(selector: &str, attr: &str) -> Self {
        Strategy::Css {
            selector: selector.to_string(),
            attr: Some(attr.to_string()),
        }
    }

    pub fn pattern(pattern: &str) -> Self {
        Strategy::TextPattern {
            pattern: pattern.to_string(),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::Jsonld { .. } => StrategyKind::Jsonld,
            Strategy::Microdata { .. } => StrategyKind::Microdata,
            Strategy::Meta { .. } => StrategyKind::Meta,
            Strategy::Css { .. } => StrategyKind::Css,
            Strategy::TextPattern { .. } => StrategyKind::TextPattern,
            Strategy::PageText => StrategyKind::PageText,
            Strategy::PageTitle => StrategyKind::PageTitle,
        }
    }

    fn compile(&self, field: Field) -> Result<Probe, ConfigError> {
        Ok(match self {
            Strategy::Jsonld { path } => Probe::Jsonld(path.clone()),
            Strategy::Microdata { path } => Probe::Microdata(path.clone()),
            Strategy::Meta { property } => Probe::Meta(property.clone()),
            Strategy::Css { selector, attr } => Probe::Css {
                selector: Selector::parse(selector).map_err(|_| ConfigError::InvalidSelector {
                    field,
                    selector: selector.clone(),
                })?,
                attr: attr.clone(),
            },
            Strategy::TextPattern { pattern } => Probe::TextPattern(Regex::new(pattern).map_err(
                |source| ConfigError::InvalidPattern {
                    field,
                    pattern: pattern.clone(),
                    source,
                },
            )?),
            Strategy::PageText => Probe::PageText,
            Strategy::PageTitle => Probe::PageTitle,
        })
    }
}

/// Ordered strategies for one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub field: Field,
    pub strategies: Vec<Strategy>,
}

impl FieldSpec {
    pub fn new(field: Field, strategies: Vec<Strategy>) -> Self {
        Self { field, strategies }
    }

    /// Built-in chain, covering schema.org markup and common French retail layouts
    pub fn defaults(field: Field) -> Self {
        let css = |selectors: &[&str]| selectors.iter().map(|s| Strategy::css(s)).collect::<Vec<_>>();

        let strategies = match field {
            Field::Name => {
                let mut s = vec![Strategy::jsonld("Product.name"), Strategy::microdata("Product.name")];
                s.extend(css(&[
                    r#"h1[data-product="name"]"#,
                    "h1.fpHdrDsc",
                    "h1.product-title",
                    ".fpHdr h1",
                    "h1.title",
                    "h1",
                    ".product-name h1",
                    r#"[data-testid="product-title"]"#,
                ]));
                s.push(Strategy::meta("og:title"));
                s.push(Strategy::PageTitle);
                s
            }
            Field::Price => {
                let mut s = vec![
                    Strategy::jsonld("Product.offers.price"),
                    Strategy::jsonld("Product.offers.lowPrice"),
                    Strategy::microdata("Product.offers.price"),
                    Strategy::meta("product:price:amount"),
                    Strategy::css(".fpPrice .price"),
                    Strategy::css(".price-current"),
                    Strategy::css(".product-price .price"),
                    Strategy::css_attr("[data-price]", "data-price"),
                ];
                s.extend(css(&["[data-price]", ".fpPrice", ".price", ".current-price", ".sale-price"]));
                // "1 299,00 €" groups thousands with a (narrow no-break) space
                s.extend([
                    Strategy::pattern(r"\b(?:\d{1,3}(?:[ \u{a0}\u{202f}]\d{3})+|\d{1,4})[,.]\d{2}\s*€"),
                    Strategy::pattern(r"\b(?:\d{1,3}(?:[ \u{a0}\u{202f}]\d{3})+|\d{1,4})\s*€"),
                    Strategy::pattern(r"EUR\s*\d{1,4}[,.]\d{2}"),
                ]);
                s
            }
            Field::RegularPrice => css(&[
                ".price-old",
                ".fpStriked",
                ".price-before",
                ".was-price",
                "del.price",
                "s.price",
            ]),
            Field::Availability => {
                let mut s = vec![
                    Strategy::jsonld("Product.offers.availability"),
                    Strategy::microdata("Product.offers.availability"),
                ];
                s.extend(css(&[".fpStock", ".availability", ".stock-status"]));
                s.push(Strategy::css_attr("[data-availability]", "data-availability"));
                s.push(Strategy::PageText);
                s
            }
            Field::Rating => vec![
                Strategy::jsonld("Product.aggregateRating.ratingValue"),
                Strategy::microdata("Product.aggregateRating.ratingValue"),
                Strategy::css(".rating-value"),
                Strategy::css_attr("[data-rating]", "data-rating"),
            ],
            Field::ReviewCount => vec![
                Strategy::jsonld("Product.aggregateRating.reviewCount"),
                Strategy::jsonld("Product.aggregateRating.ratingCount"),
                Strategy::microdata("Product.aggregateRating.reviewCount"),
                Strategy::css(".review-count"),
                Strategy::css(".reviews-count"),
            ],
        };

        Self::new(field, strategies)
    }

    pub fn compile(&self) -> Result<CompiledFieldSpec, ConfigError> {
        let probes = self
            .strategies
            .iter()
            .map(|s| s.compile(self.field))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CompiledFieldSpec {
            field: self.field,
            probes,
        })
    }
}

#[derive(Debug)]
enum Probe {
    Jsonld(String),
    Microdata(String),
    Meta(String),
    Css { selector: Selector, attr: Option<String> },
    TextPattern(Regex),
    PageText,
    PageTitle,
}

impl Probe {
    fn kind(&self) -> StrategyKind {
        match self {
            Probe::Jsonld(_) => StrategyKind::Jsonld,
            Probe::Microdata(_) => StrategyKind::Microdata,
            Probe::Meta(_) => StrategyKind::Meta,
            Probe::Css { .. } => StrategyKind::Css,
            Probe::TextPattern(_) => StrategyKind::TextPattern,
            Probe::PageText => StrategyKind::PageText,
            Probe::PageTitle => StrategyKind::PageTitle,
        }
    }
}

/// Field spec with selectors and patterns parsed
#[derive(Debug)]
pub struct CompiledFieldSpec {
    field: Field,
    probes: Vec<Probe>,
}

/// A parsed page; structured data and text are derived once, on first use
pub struct Document {
    html: Html,
    text: OnceCell<String>,
    jsonld: OnceCell<Value>,
    microdata: OnceCell<Value>,
}

impl Document {
    pub fn parse(source: &str) -> Self {
        Self {
            html: Html::parse_document(source),
            text: OnceCell::new(),
            jsonld: OnceCell::new(),
            microdata: OnceCell::new(),
        }
    }

    pub fn from_raw(raw: &RawDocument) -> Self {
        Self::parse(&raw.text())
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    pub fn visible_text(&self) -> &str {
        self.text.get_or_init(|| visible_text(&self.html))
    }

    pub fn jsonld(&self) -> &Value {
        self.jsonld.get_or_init(|| extract_jsonld(&self.html))
    }

    pub fn microdata(&self) -> &Value {
        self.microdata.get_or_init(|| extract_microdata(&self.html))
    }

    pub fn title(&self) -> Option<String> {
        page_title(&self.html)
    }
}

/// Runs a field's strategies in order against a document
#[derive(Debug, Clone, Default)]
pub struct FieldExtractor {
    prices: PriceNormalizer,
    title_suffixes: Vec<String>,
}

impl FieldExtractor {
    pub fn new(prices: PriceNormalizer) -> Self {
        Self {
            prices,
            title_suffixes: Vec::new(),
        }
    }

    pub fn with_title_suffixes(mut self, suffixes: Vec<String>) -> Self {
        self.title_suffixes = suffixes;
        self
    }

    pub fn extract(&self, document: &Document, spec: &CompiledFieldSpec) -> Option<ExtractionCandidate> {
        for (rank, probe) in spec.probes.iter().enumerate() {
            if let Some(raw_text) = self.run_probe(document, spec.field, probe) {
                debug!(field = %spec.field, rank, strategy = ?probe.kind(), "field extracted");
                return Some(ExtractionCandidate {
                    field: spec.field,
                    raw_text: self.finish(spec.field, raw_text),
                    strategy: probe.kind(),
                    rank,
                });
            }
        }

        debug!(field = %spec.field, strategies = spec.probes.len(), "no strategy matched");
        None
    }

    fn run_probe(&self, document: &Document, field: Field, probe: &Probe) -> Option<String> {
        let kind = probe.kind();
        let values = match probe {
            Probe::Jsonld(path) => json_path_values(document.jsonld(), path),
            Probe::Microdata(path) => json_path_values(document.microdata(), path),
            Probe::Meta(property) => extract_meta(document.html(), property),
            Probe::Css {
                selector,
                attr: Some(attr),
            } => extract_css_attr(document.html(), selector, attr),
            Probe::Css { selector, attr: None } => extract_css_text(document.html(), selector),
            Probe::TextPattern(pattern) => pattern_matches(document.visible_text(), pattern),
            Probe::PageText => vec![document.visible_text().to_string()],
            Probe::PageTitle => document
                .title()
                .map(|title| strip_title_suffixes(&title, &self.title_suffixes))
                .into_iter()
                .collect(),
        };

        values
            .into_iter()
            .find(|value| self.accepts(field, kind, value))
    }

    fn accepts(&self, field: Field, kind: StrategyKind, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        match field {
            Field::Name => text.chars().count() > MIN_NAME_CHARS,
            Field::Price | Field::RegularPrice => self
                .prices
                .parse_within(text, self.prices.bounds_for(kind))
                .is_some(),
            Field::Availability => true,
            Field::Rating => parse_rating(text).is_some(),
            Field::ReviewCount => parse_review_count(text).is_some(),
        }
    }

    fn finish(&self, field: Field, text: String) -> String {
        let text = text.trim();
        match field {
            Field::Name => truncate_chars(text, MAX_NAME_CHARS),
            _ => text.to_string(),
        }
    }
}

/// Extractor plus compiled specs for every field of one site
#[derive(Debug)]
pub struct SiteExtractor {
    extractor: FieldExtractor,
    specs: BTreeMap<Field, CompiledFieldSpec>,
}

impl SiteExtractor {
    pub fn new(extractor: FieldExtractor, specs: &[FieldSpec]) -> Result<Self, ConfigError> {
        let specs = specs
            .iter()
            .map(|spec| spec.compile().map(|compiled| (spec.field, compiled)))
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(Self { extractor, specs })
    }

    /// Winning candidate per field; fields with no match are left out
    pub fn extract_all(&self, document: &Document) -> BTreeMap<Field, ExtractionCandidate> {
        self.specs
            .iter()
            .filter_map(|(field, spec)| {
                self.extractor
                    .extract(document, spec)
                    .map(|candidate| (*field, candidate))
            })
            .collect()
    }
}
