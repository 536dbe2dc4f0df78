//! ERP connector client.
//!
//! The connector performs the actual reconciliation server-side; each job
//! endpoint blocks until the job finishes and returns its counters. The
//! client is therefore a thin transport with a generous timeout.

use std::time::Duration;

use {
    anyhow::{Context, Result, bail},
    async_trait::async_trait,
    reqwest::Client,
    secrecy::{ExposeSecret, Secret},
    serde::de::DeserializeOwned,
    tracing::debug,
};

use shopbridge_sync::backend::{CatalogImport, CouponImport, StockUpdate, SyncBackend};

/// Default per-request timeout. Connector jobs can run for minutes.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Header carrying the connector API key.
const API_KEY_HEADER: &str = "X-Api-Key";

/// Client for the ERP connector's job API.
#[derive(Clone)]
pub struct ErpClient {
    client: Client,
    base_url: String,
    api_key: Option<Secret<String>>,
}

impl std::fmt::Debug for ErpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErpClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl ErpClient {
    /// Create a new connector client.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<Secret<String>>,
        timeout_secs: Option<u64>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)))
            .build()
            .context("failed to build HTTP client")?;

        let base_url: String = base_url.into();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn post_job<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}/{path}", self.base_url);
        debug!(%url, "dispatching sync job");

        let mut request = self.client.post(&url);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key.expose_secret());
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("{url} returned {status}: {body}");
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("invalid response body from {url}"))
    }
}

#[async_trait]
impl SyncBackend for ErpClient {
    async fn import_new_coupons(&self) -> Result<CouponImport> {
        self.post_job("jobs/coupons/import-new").await
    }

    async fn import_catalog(&self) -> Result<CatalogImport> {
        self.post_job("jobs/catalog/import").await
    }

    async fn update_stock(&self) -> Result<StockUpdate> {
        self.post_job("jobs/stock/update").await
    }
}
