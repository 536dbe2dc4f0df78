//! Core data types for the sync job system.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One of the three independent sync workloads.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum JobKind {
    /// Import coupons that exist remotely but not locally.
    Coupons,
    /// Full product catalog import.
    Catalog,
    /// Stock and price refresh for known products.
    Stock,
}

impl JobKind {
    pub const ALL: [Self; 3] = [Self::Coupons, Self::Catalog, Self::Stock];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Coupons => "coupons",
            Self::Catalog => "catalog",
            Self::Stock => "stock",
        }
    }

    /// Scheduler event identifier the job's handler is bound under.
    #[must_use]
    pub fn event_id(self) -> &'static str {
        match self {
            Self::Coupons => "sync.coupons",
            Self::Catalog => "sync.catalog",
            Self::Stock => "sync.stock",
        }
    }

    /// Build the option key for one logical field of this job.
    ///
    /// Every per-job key goes through here, so two kinds can never share a
    /// key.
    #[must_use]
    pub fn option_key(self, field: &str) -> String {
        format!("sync.{}.{field}", self.as_str())
    }

    #[must_use]
    pub fn enabled_key(self) -> String {
        self.option_key("enabled")
    }

    #[must_use]
    pub fn interval_key(self) -> String {
        self.option_key("interval")
    }

    #[must_use]
    pub fn last_result_key(self) -> String {
        self.option_key("last_result")
    }

    /// Transient key holding the run lock.
    #[must_use]
    pub fn lock_key(self) -> String {
        self.option_key("lock")
    }

    /// Intervals an operator may select for this job.
    #[must_use]
    pub fn allowed_intervals(self) -> &'static [IntervalKey] {
        match self {
            Self::Coupons => &[
                IntervalKey::Every5Minutes,
                IntervalKey::Every15Minutes,
                IntervalKey::Every30Minutes,
                IntervalKey::Hourly,
            ],
            Self::Catalog => &[
                IntervalKey::Hourly,
                IntervalKey::TwiceDaily,
                IntervalKey::Daily,
            ],
            Self::Stock => &[
                IntervalKey::Every5Minutes,
                IntervalKey::Every15Minutes,
                IntervalKey::Every30Minutes,
                IntervalKey::Hourly,
            ],
        }
    }

    /// Fallback when the stored interval is missing or not allowed.
    #[must_use]
    pub fn default_interval(self) -> IntervalKey {
        match self {
            Self::Coupons => IntervalKey::Every15Minutes,
            Self::Catalog => IntervalKey::Daily,
            Self::Stock => IntervalKey::Every30Minutes,
        }
    }

    /// First-fire offset so the three jobs never start on the same tick.
    #[must_use]
    pub fn stagger_offset_ms(self) -> u64 {
        match self {
            Self::Coupons => 60_000,
            Self::Catalog => 120_000,
            Self::Stock => 180_000,
        }
    }

    /// Run-lock lifetime. Must exceed any plausible run duration so an
    /// expired lock always means a dead or abandoned run.
    #[must_use]
    pub fn lock_ttl_ms(self) -> u64 {
        match self {
            Self::Coupons => 10 * 60_000,
            Self::Catalog => 30 * 60_000,
            Self::Stock => 15 * 60_000,
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "coupons" => Ok(Self::Coupons),
            "catalog" => Ok(Self::Catalog),
            "stock" => Ok(Self::Stock),
            other => Err(Error::unknown_job(other)),
        }
    }
}

/// Symbolic recurrence cadence. Persisted by its string form.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum IntervalKey {
    #[serde(rename = "every-5-minutes")]
    Every5Minutes,
    #[serde(rename = "every-15-minutes")]
    Every15Minutes,
    #[serde(rename = "every-30-minutes")]
    Every30Minutes,
    #[serde(rename = "hourly")]
    Hourly,
    #[serde(rename = "twice-daily")]
    TwiceDaily,
    #[serde(rename = "daily")]
    Daily,
}

impl IntervalKey {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Every5Minutes => "every-5-minutes",
            Self::Every15Minutes => "every-15-minutes",
            Self::Every30Minutes => "every-30-minutes",
            Self::Hourly => "hourly",
            Self::TwiceDaily => "twice-daily",
            Self::Daily => "daily",
        }
    }

    /// Recurrence period in milliseconds.
    #[must_use]
    pub fn every_ms(self) -> u64 {
        match self {
            Self::Every5Minutes => 5 * 60_000,
            Self::Every15Minutes => 15 * 60_000,
            Self::Every30Minutes => 30 * 60_000,
            Self::Hourly => 3_600_000,
            Self::TwiceDaily => 12 * 3_600_000,
            Self::Daily => 24 * 3_600_000,
        }
    }
}

impl std::fmt::Display for IntervalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IntervalKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "every-5-minutes" => Ok(Self::Every5Minutes),
            "every-15-minutes" => Ok(Self::Every15Minutes),
            "every-30-minutes" => Ok(Self::Every30Minutes),
            "hourly" => Ok(Self::Hourly),
            "twice-daily" => Ok(Self::TwiceDaily),
            "daily" => Ok(Self::Daily),
            other => Err(Error::unknown_interval(other)),
        }
    }
}

/// Outcome counters reported by the backend, tagged by job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "job", rename_all = "camelCase")]
pub enum JobCounters {
    #[serde(rename_all = "camelCase")]
    Coupons { created: u64, remote_total: u64 },
    #[serde(rename_all = "camelCase")]
    Catalog {
        created: u64,
        updated: u64,
        errors: u64,
        total: u64,
    },
    #[serde(rename_all = "camelCase")]
    Stock {
        updated: u64,
        skipped: u64,
        errors: u64,
        total: u64,
    },
}

impl JobCounters {
    /// Zeroed counters for a job, used while a run is in flight.
    #[must_use]
    pub fn zeroed(kind: JobKind) -> Self {
        match kind {
            JobKind::Coupons => Self::Coupons {
                created: 0,
                remote_total: 0,
            },
            JobKind::Catalog => Self::Catalog {
                created: 0,
                updated: 0,
                errors: 0,
                total: 0,
            },
            JobKind::Stock => Self::Stock {
                updated: 0,
                skipped: 0,
                errors: 0,
                total: 0,
            },
        }
    }

    #[must_use]
    pub fn kind(&self) -> JobKind {
        match self {
            Self::Coupons { .. } => JobKind::Coupons,
            Self::Catalog { .. } => JobKind::Catalog,
            Self::Stock { .. } => JobKind::Stock,
        }
    }
}

/// Snapshot of the most recent execution of a job.
///
/// Overwritten on every completed run; skipped runs leave it untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub started_at_ms: u64,
    pub finished_at_ms: u64,
    pub succeeded: bool,
    pub duration_ms: u64,
    pub peak_memory_kb: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub counters: JobCounters,
}

/// What a single runner invocation did.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Another run holds the lock; nothing was executed or persisted.
    Skipped,
    Completed(RunResult),
}

impl RunOutcome {
    #[must_use]
    pub fn result(&self) -> Option<&RunResult> {
        match self {
            Self::Skipped => None,
            Self::Completed(result) => Some(result),
        }
    }
}

/// Per-job view of schedule state and the last run, for operators.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub job: JobKind,
    pub enabled: bool,
    pub interval: IntervalKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_fire_at_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_result: Option<RunResult>,
}

/// Summary status of the sync engine.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub running: bool,
    pub jobs: Vec<JobStatus>,
}
