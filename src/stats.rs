//! Per-site and per-run counters

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteStatus {
    /// No errors
    Success,
    /// Some targets failed
    Warning,
    /// Targets were attempted and none succeeded
    Error,
}

impl SiteStatus {
    fn from_counts(succeeded: u32, errors: u32) -> Self {
        match (succeeded, errors) {
            (_, 0) => SiteStatus::Success,
            (0, _) => SiteStatus::Error,
            _ => SiteStatus::Warning,
        }
    }
}

/// Finalized counters for one site pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRunStats {
    pub site: String,
    pub attempted: u32,
    pub succeeded: u32,
    pub errors: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration: Duration,
    pub status: SiteStatus,
}

/// Counters for a pass in progress; only the collector mutates these
#[derive(Debug)]
pub(crate) struct SitePass {
    site: String,
    attempted: u32,
    succeeded: u32,
    errors: u32,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl SitePass {
    pub(crate) fn start(site: &str) -> Self {
        Self {
            site: site.to_string(),
            attempted: 0,
            succeeded: 0,
            errors: 0,
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    pub(crate) fn record_success(&mut self) {
        self.attempted += 1;
        self.succeeded += 1;
    }

    pub(crate) fn record_error(&mut self) {
        self.attempted += 1;
        self.errors += 1;
    }

    pub(crate) fn finish(self) -> SiteRunStats {
        SiteRunStats {
            status: SiteStatus::from_counts(self.succeeded, self.errors),
            site: self.site,
            attempted: self.attempted,
            succeeded: self.succeeded,
            errors: self.errors,
            started_at: self.started_at,
            finished_at: Utc::now(),
            duration: self.started.elapsed(),
        }
    }
}

/// What the scheduler branches on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    PartialSuccess { errors: u32 },
    TotalFailure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub sites: Vec<SiteRunStats>,
}

impl RunSummary {
    pub fn new(started_at: DateTime<Utc>, duration: Duration, sites: Vec<SiteRunStats>) -> Self {
        Self {
            started_at,
            duration,
            sites,
        }
    }

    pub fn attempted(&self) -> u32 {
        self.sites.iter().map(|s| s.attempted).sum()
    }

    pub fn succeeded(&self) -> u32 {
        self.sites.iter().map(|s| s.succeeded).sum()
    }

    pub fn errors(&self) -> u32 {
        self.sites.iter().map(|s| s.errors).sum()
    }

    /// Share of attempted targets that succeeded, if any were attempted
    pub fn success_rate(&self) -> Option<f64> {
        let attempted = self.attempted();
        (attempted > 0).then(|| f64::from(self.succeeded()) / f64::from(attempted))
    }

    pub fn site(&self, id: &str) -> Option<&SiteRunStats> {
        self.sites.iter().find(|s| s.site == id)
    }

    pub fn outcome(&self) -> RunOutcome {
        match (self.succeeded(), self.errors()) {
            (_, 0) => RunOutcome::Success,
            (0, _) => RunOutcome::TotalFailure,
            (_, errors) => RunOutcome::PartialSuccess { errors },
        }
    }
}
