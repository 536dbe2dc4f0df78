//! The external synchronization service boundary.

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
};

use crate::types::JobCounters;

/// Counters reported by the new-coupons import.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CouponImport {
    pub created: u64,
    pub remote_total: u64,
}

/// Counters reported by the full catalog import.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogImport {
    pub created: u64,
    pub updated: u64,
    pub errors: u64,
    pub total: u64,
}

/// Counters reported by the stock refresh.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StockUpdate {
    pub updated: u64,
    pub skipped: u64,
    pub errors: u64,
    pub total: u64,
}

impl From<CouponImport> for JobCounters {
    fn from(c: CouponImport) -> Self {
        Self::Coupons {
            created: c.created,
            remote_total: c.remote_total,
        }
    }
}

impl From<CatalogImport> for JobCounters {
    fn from(c: CatalogImport) -> Self {
        Self::Catalog {
            created: c.created,
            updated: c.updated,
            errors: c.errors,
            total: c.total,
        }
    }
}

impl From<StockUpdate> for JobCounters {
    fn from(c: StockUpdate) -> Self {
        Self::Stock {
            updated: c.updated,
            skipped: c.skipped,
            errors: c.errors,
            total: c.total,
        }
    }
}

/// One operation per job kind. Any failure is uniform: the runner records
/// the error text on the run snapshot and nothing propagates further.
#[async_trait]
pub trait SyncBackend: Send + Sync {
    /// Import coupons that exist remotely but not locally.
    async fn import_new_coupons(&self) -> anyhow::Result<CouponImport>;

    /// Import the full product catalog.
    async fn import_catalog(&self) -> anyhow::Result<CatalogImport>;

    /// Refresh stock and prices for known products.
    async fn update_stock(&self) -> anyhow::Result<StockUpdate>;
}
