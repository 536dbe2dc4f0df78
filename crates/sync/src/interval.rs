//! Interval key resolution: allow-lists, defaults, legacy key migration.

use tracing::info;

use crate::{
    Result,
    store::SyncOptions,
    types::{IntervalKey, JobKind},
};

/// Interval values written by the 1.x plugin generation carry this prefix.
pub const LEGACY_PREFIX: &str = "wcsync_";

/// Option key marking the one-time legacy rewrite as done.
pub(crate) const MIGRATION_FLAG: &str = "sync.interval_keys_migrated";

/// Map a legacy-prefixed value to its current key, if it has one.
#[must_use]
pub fn rewrite_legacy(raw: &str) -> Option<IntervalKey> {
    let rest = raw.strip_prefix(LEGACY_PREFIX)?;
    match rest {
        "every_5_minutes" => Some(IntervalKey::Every5Minutes),
        "every_15_minutes" => Some(IntervalKey::Every15Minutes),
        "every_30_minutes" => Some(IntervalKey::Every30Minutes),
        "hourly" => Some(IntervalKey::Hourly),
        "twicedaily" => Some(IntervalKey::TwiceDaily),
        "daily" => Some(IntervalKey::Daily),
        _ => None,
    }
}

/// Coerce a stored raw value to a key in `kind`'s allow-list.
///
/// Pure. Legacy-prefixed values go through the rewrite table first; unknown
/// or disallowed values (including empty) fall back to the kind's default.
#[must_use]
pub fn coerce(kind: JobKind, raw: &str) -> IntervalKey {
    let parsed = if raw.starts_with(LEGACY_PREFIX) {
        rewrite_legacy(raw)
    } else {
        raw.parse().ok()
    };

    match parsed {
        Some(key) if kind.allowed_intervals().contains(&key) => key,
        _ => kind.default_interval(),
    }
}

/// One-time rewrite of stored legacy interval values, guarded by a flag.
///
/// Runs before the scheduler is armed; after the flag is set this is a
/// single read and no writes.
pub async fn migrate_legacy_keys(options: &SyncOptions) -> Result<()> {
    if options.flag(MIGRATION_FLAG).await? {
        return Ok(());
    }

    for kind in JobKind::ALL {
        let Some(raw) = options.interval_raw(kind).await? else {
            continue;
        };
        if !raw.starts_with(LEGACY_PREFIX) {
            continue;
        }
        if let Some(key) = rewrite_legacy(&raw) {
            options.set_interval_raw(kind, key.as_str()).await?;
            info!(
                job = kind.as_str(),
                from = %raw,
                to = key.as_str(),
                "rewrote legacy interval key"
            );
        }
    }

    options.set_flag(MIGRATION_FLAG).await?;
    Ok(())
}

/// Resolve the effective interval for `kind`.
///
/// Ensures the legacy migration has happened, then reads the stored value
/// and coerces it into the allow-list.
pub async fn resolve(options: &SyncOptions, kind: JobKind) -> Result<IntervalKey> {
    migrate_legacy_keys(options).await?;
    let raw = options.interval_raw(kind).await?.unwrap_or_default();
    Ok(coerce(kind, &raw))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rstest::rstest;

    use {super::*, crate::store_memory::MemoryStore};

    #[rstest]
    #[case(JobKind::Coupons, "hourly", IntervalKey::Hourly)]
    #[case(JobKind::Catalog, "daily", IntervalKey::Daily)]
    #[case(JobKind::Stock, "every-5-minutes", IntervalKey::Every5Minutes)]
    fn coerce_keeps_allowed_values(
        #[case] kind: JobKind,
        #[case] raw: &str,
        #[case] expected: IntervalKey,
    ) {
        assert_eq!(coerce(kind, raw), expected);
    }

    #[rstest]
    #[case(JobKind::Coupons, "")]
    #[case(JobKind::Coupons, "fortnightly")]
    #[case(JobKind::Catalog, "every-5-minutes")] // valid key, not allowed for catalog
    #[case(JobKind::Stock, "twice-daily")]
    fn coerce_falls_back_to_default(#[case] kind: JobKind, #[case] raw: &str) {
        assert_eq!(coerce(kind, raw), kind.default_interval());
    }

    #[rstest]
    #[case("wcsync_every_5_minutes", Some(IntervalKey::Every5Minutes))]
    #[case("wcsync_twicedaily", Some(IntervalKey::TwiceDaily))]
    #[case("wcsync_hourly", Some(IntervalKey::Hourly))]
    #[case("wcsync_weekly", None)]
    #[case("hourly", None)] // no prefix, no rewrite
    fn legacy_rewrite_table(#[case] raw: &str, #[case] expected: Option<IntervalKey>) {
        assert_eq!(rewrite_legacy(raw), expected);
    }

    #[test]
    fn coerce_maps_legacy_values() {
        assert_eq!(
            coerce(JobKind::Coupons, "wcsync_every_5_minutes"),
            IntervalKey::Every5Minutes
        );
        // Legacy value that maps to a key the job does not allow.
        assert_eq!(
            coerce(JobKind::Catalog, "wcsync_every_5_minutes"),
            JobKind::Catalog.default_interval()
        );
    }

    #[tokio::test]
    async fn migration_rewrites_once_and_sets_flag() {
        let store = Arc::new(MemoryStore::new());
        let options = SyncOptions::new(store.clone());

        options
            .set_interval_raw(JobKind::Coupons, "wcsync_every_5_minutes")
            .await
            .unwrap();
        options
            .set_interval_raw(JobKind::Catalog, "daily")
            .await
            .unwrap();

        let resolved = resolve(&options, JobKind::Coupons).await.unwrap();
        assert_eq!(resolved, IntervalKey::Every5Minutes);
        assert_eq!(
            options.interval_raw(JobKind::Coupons).await.unwrap(),
            Some("every-5-minutes".into())
        );
        assert!(options.flag(MIGRATION_FLAG).await.unwrap());

        // Second resolve is a pure read: no further option writes.
        let writes_after_migration = store.option_writes();
        let resolved = resolve(&options, JobKind::Coupons).await.unwrap();
        assert_eq!(resolved, IntervalKey::Every5Minutes);
        assert_eq!(store.option_writes(), writes_after_migration);
    }

    #[tokio::test]
    async fn migration_skips_unmappable_legacy_values() {
        let store = Arc::new(MemoryStore::new());
        let options = SyncOptions::new(store);

        options
            .set_interval_raw(JobKind::Stock, "wcsync_weekly")
            .await
            .unwrap();

        migrate_legacy_keys(&options).await.unwrap();

        // Stored value untouched; resolution falls back to the default.
        assert_eq!(
            options.interval_raw(JobKind::Stock).await.unwrap(),
            Some("wcsync_weekly".into())
        );
        assert_eq!(
            resolve(&options, JobKind::Stock).await.unwrap(),
            JobKind::Stock.default_interval()
        );
    }

    #[tokio::test]
    async fn resolve_without_stored_value_uses_default() {
        let options = SyncOptions::new(Arc::new(MemoryStore::new()));
        for kind in JobKind::ALL {
            assert_eq!(
                resolve(&options, kind).await.unwrap(),
                kind.default_interval()
            );
        }
    }
}
