//! JSON file-backed store with atomic writes.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use {
    serde::{Deserialize, Serialize, de::DeserializeOwned},
    tokio::fs,
};

use crate::{
    Result,
    store::{OptionStore, TransientStore},
    time::now_ms,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredTransient {
    value: String,
    expires_at_ms: u64,
}

/// File-backed store. Options and transients each live in a single JSON
/// document; writes go through temp-file-then-rename with a `.bak` of the
/// previous version.
pub struct FileStore {
    options_path: PathBuf,
    transients_path: PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            options_path: data_dir.join("options.json"),
            transients_path: data_dir.join("transients.json"),
        }
    }

    async fn load_map<T: DeserializeOwned>(path: &Path) -> Result<HashMap<String, T>> {
        if !fs::try_exists(path).await.unwrap_or(false) {
            return Ok(HashMap::new());
        }
        let data = fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Atomic write: write to temp, rename over target, keep `.bak`.
    async fn atomic_write<T: Serialize>(path: &Path, map: &HashMap<String, T>) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(map)?;
        let tmp = path.with_extension("json.tmp");

        fs::write(&tmp, json.as_bytes()).await?;

        if fs::try_exists(path).await.unwrap_or(false) {
            let bak = path.with_extension("json.bak");
            let _ = fs::rename(path, &bak).await;
        }

        fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl OptionStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let options: HashMap<String, String> = Self::load_map(&self.options_path).await?;
        Ok(options.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut options: HashMap<String, String> = Self::load_map(&self.options_path).await?;
        options.insert(key.to_string(), value.to_string());
        Self::atomic_write(&self.options_path, &options).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut options: HashMap<String, String> = Self::load_map(&self.options_path).await?;
        if options.remove(key).is_none() {
            return Ok(());
        }
        Self::atomic_write(&self.options_path, &options).await
    }
}

#[async_trait::async_trait]
impl TransientStore for FileStore {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl_ms: u64) -> Result<()> {
        let mut transients: HashMap<String, StoredTransient> =
            Self::load_map(&self.transients_path).await?;
        // Purge anything already expired while we hold the document anyway.
        let now = now_ms();
        transients.retain(|_, entry| entry.expires_at_ms > now);
        transients.insert(key.to_string(), StoredTransient {
            value: value.to_string(),
            expires_at_ms: now.saturating_add(ttl_ms),
        });
        Self::atomic_write(&self.transients_path, &transients).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let transients: HashMap<String, StoredTransient> =
            Self::load_map(&self.transients_path).await?;
        Ok(transients
            .get(key)
            .filter(|entry| entry.expires_at_ms > now_ms())
            .map(|entry| entry.value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut transients: HashMap<String, StoredTransient> =
            Self::load_map(&self.transients_path).await?;
        if transients.remove(key).is_none() {
            return Ok(());
        }
        Self::atomic_write(&self.transients_path, &transients).await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, tempfile::TempDir};

    #[tokio::test]
    async fn option_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path());

        OptionStore::set(&store, "sync.coupons.enabled", "1")
            .await
            .unwrap();
        assert_eq!(
            OptionStore::get(&store, "sync.coupons.enabled")
                .await
                .unwrap(),
            Some("1".into())
        );

        OptionStore::delete(&store, "sync.coupons.enabled")
            .await
            .unwrap();
        assert_eq!(
            OptionStore::get(&store, "sync.coupons.enabled")
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn get_from_missing_file_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path());
        assert!(OptionStore::get(&store, "anything").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn backup_created_on_second_write() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path());

        OptionStore::set(&store, "a", "1").await.unwrap();
        OptionStore::set(&store, "b", "2").await.unwrap();

        assert!(tmp.path().join("options.json.bak").exists());
    }

    #[tokio::test]
    async fn delete_absent_option_does_not_touch_file() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path());
        OptionStore::delete(&store, "missing").await.unwrap();
        assert!(!tmp.path().join("options.json").exists());
    }

    #[tokio::test]
    async fn transient_roundtrip_and_expiry() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path());

        TransientStore::set_with_ttl(&store, "sync.stock.lock", "123", 60_000)
            .await
            .unwrap();
        assert_eq!(
            TransientStore::get(&store, "sync.stock.lock").await.unwrap(),
            Some("123".into())
        );

        // Zero TTL is immediately expired.
        TransientStore::set_with_ttl(&store, "sync.stock.lock", "123", 0)
            .await
            .unwrap();
        assert!(
            TransientStore::get(&store, "sync.stock.lock")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn expired_transients_purged_on_write() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path());

        TransientStore::set_with_ttl(&store, "old", "1", 0).await.unwrap();
        TransientStore::set_with_ttl(&store, "new", "2", 60_000)
            .await
            .unwrap();

        let raw = fs::read_to_string(tmp.path().join("transients.json"))
            .await
            .unwrap();
        assert!(!raw.contains("\"old\""));
        assert!(raw.contains("\"new\""));
    }

    #[tokio::test]
    async fn options_and_transients_are_separate_documents() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path());

        OptionStore::set(&store, "k", "option").await.unwrap();
        TransientStore::set_with_ttl(&store, "k", "transient", 60_000)
            .await
            .unwrap();

        assert_eq!(
            OptionStore::get(&store, "k").await.unwrap(),
            Some("option".into())
        );
        assert_eq!(
            TransientStore::get(&store, "k").await.unwrap(),
            Some("transient".into())
        );
    }
}
