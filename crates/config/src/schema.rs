//! Config schema for the shopbridge daemon.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub jobs: JobsConfig,
    pub erp: ErpConfig,
    pub storage: StorageConfig,
}

/// Initial settings for the three sync jobs.
///
/// Applied to the option store on first start only; operator changes made
/// at runtime take precedence afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub coupons: JobConfig,
    pub catalog: JobConfig,
    pub stock: JobConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Whether the job is scheduled at all.
    pub enabled: bool,
    /// Interval key; the job's own default applies when unset.
    pub interval: Option<String>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: None,
        }
    }
}

/// ERP connector endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ErpConfig {
    pub base_url: String,
    /// API key sent with every connector request. Usually provided via
    /// `${SHOPBRIDGE_ERP_API_KEY}` substitution rather than inline.
    pub api_key: Option<String>,
    /// Per-request timeout; connector jobs can run for minutes.
    pub timeout_secs: u64,
}

impl Default for ErpConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8900".into(),
            api_key: None,
            timeout_secs: 300,
        }
    }
}

/// Which medium holds options, transients, and run snapshots.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Sqlite,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Data directory for the file backend; platform default when unset.
    pub data_dir: Option<PathBuf>,
    /// Connection string for the sqlite backend.
    pub database_url: Option<String>,
}
