//! Persistence boundaries: durable options and expiring transients.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    Result,
    types::{JobKind, RunResult},
};

/// Durable key-value settings storage. Single-key atomicity only; deleting
/// an absent key is a no-op.
#[async_trait]
pub trait OptionStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Expiring flag storage. Reads of expired entries return `None`.
#[async_trait]
pub trait TransientStore: Send + Sync {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl_ms: u64) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Typed accessors over the option store for the per-job fields.
///
/// All keys come from [`JobKind`]'s key builder; nothing else in the crate
/// touches raw option keys.
#[derive(Clone)]
pub struct SyncOptions {
    store: Arc<dyn OptionStore>,
}

impl SyncOptions {
    #[must_use]
    pub fn new(store: Arc<dyn OptionStore>) -> Self {
        Self { store }
    }

    pub async fn enabled(&self, kind: JobKind) -> Result<bool> {
        let raw = self.store.get(&kind.enabled_key()).await?;
        Ok(raw.as_deref().is_some_and(|v| matches!(v, "1" | "true")))
    }

    pub async fn set_enabled(&self, kind: JobKind, enabled: bool) -> Result<()> {
        self.store
            .set(&kind.enabled_key(), if enabled { "1" } else { "0" })
            .await
    }

    /// Whether any enabled/interval setting exists for `kind` yet.
    pub async fn has_settings(&self, kind: JobKind) -> Result<bool> {
        Ok(self.store.get(&kind.enabled_key()).await?.is_some())
    }

    pub async fn interval_raw(&self, kind: JobKind) -> Result<Option<String>> {
        self.store.get(&kind.interval_key()).await
    }

    pub async fn set_interval_raw(&self, kind: JobKind, value: &str) -> Result<()> {
        self.store.set(&kind.interval_key(), value).await
    }

    /// Last run snapshot, or `None` when no run completed yet.
    ///
    /// A corrupt snapshot reads as absent rather than failing the caller.
    pub async fn last_result(&self, kind: JobKind) -> Result<Option<RunResult>> {
        let raw = self.store.get(&kind.last_result_key()).await?;
        Ok(raw.and_then(|json| serde_json::from_str(&json).ok()))
    }

    pub async fn save_last_result(&self, kind: JobKind, result: &RunResult) -> Result<()> {
        let json = serde_json::to_string(result)?;
        self.store.set(&kind.last_result_key(), &json).await
    }

    pub async fn flag(&self, key: &str) -> Result<bool> {
        Ok(self.store.get(key).await?.is_some())
    }

    pub async fn set_flag(&self, key: &str) -> Result<()> {
        self.store.set(key, "1").await
    }
}
