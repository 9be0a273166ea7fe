//! Storage boundary
//!
//! The engine never reads back what it saved; every write is independent.
//! [`JsonLinesStore`] appends one JSON object per line and reopens its file
//! for each write. [`MemoryStore`] keeps everything in memory for dry runs.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::StoreError;
use crate::stats::SiteRunStats;
use crate::types::CanonicalRecord;

pub trait RecordStore {
    fn save_record(&self, record: &CanonicalRecord) -> Result<(), StoreError>;

    fn save_site_run_stats(&self, stats: &SiteRunStats) -> Result<(), StoreError>;
}

impl<S: RecordStore + ?Sized> RecordStore for &S {
    fn save_record(&self, record: &CanonicalRecord) -> Result<(), StoreError> {
        (**self).save_record(record)
    }

    fn save_site_run_stats(&self, stats: &SiteRunStats) -> Result<(), StoreError> {
        (**self).save_site_run_stats(stats)
    }
}

pub struct JsonLinesStore {
    records_path: PathBuf,
    site_runs_path: PathBuf,
}

impl JsonLinesStore {
    pub const RECORDS_FILE: &'static str = "records.jsonl";
    pub const SITE_RUNS_FILE: &'static str = "site_runs.jsonl";

    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        Ok(Self {
            records_path: dir.join(Self::RECORDS_FILE),
            site_runs_path: dir.join(Self::SITE_RUNS_FILE),
        })
    }

    fn append(path: &Path, value: &impl Serialize) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(value)?;
        line.push('\n');
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

impl RecordStore for JsonLinesStore {
    fn save_record(&self, record: &CanonicalRecord) -> Result<(), StoreError> {
        Self::append(&self.records_path, record)
    }

    fn save_site_run_stats(&self, stats: &SiteRunStats) -> Result<(), StoreError> {
        Self::append(&self.site_runs_path, stats)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RefCell<Vec<CanonicalRecord>>,
    site_runs: RefCell<Vec<SiteRunStats>>,
    rejected_products: HashSet<String>,
    rejected_site_runs: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse records for this product id, as a failing database would
    pub fn rejecting(mut self, product_id: impl Into<String>) -> Self {
        self.rejected_products.insert(product_id.into());
        self
    }

    /// Refuse run statistics for this site
    pub fn rejecting_site_runs(mut self, site: impl Into<String>) -> Self {
        self.rejected_site_runs.insert(site.into());
        self
    }

    pub fn records(&self) -> Vec<CanonicalRecord> {
        self.records.borrow().clone()
    }

    pub fn site_runs(&self) -> Vec<SiteRunStats> {
        self.site_runs.borrow().clone()
    }
}

impl RecordStore for MemoryStore {
    fn save_record(&self, record: &CanonicalRecord) -> Result<(), StoreError> {
        if self.rejected_products.contains(&record.target.product_id) {
            return Err(StoreError::Rejected(format!(
                "product {} is not writable",
                record.target.product_id
            )));
        }
        self.records.borrow_mut().push(record.clone());
        Ok(())
    }

    fn save_site_run_stats(&self, stats: &SiteRunStats) -> Result<(), StoreError> {
        if self.rejected_site_runs.contains(&stats.site) {
            return Err(StoreError::Rejected(format!(
                "run stats for {} are not writable",
                stats.site
            )));
        }
        self.site_runs.borrow_mut().push(stats.clone());
        Ok(())
    }
}
