//! Root sync service: wires stores, scheduler, lock, and runner, and keeps
//! the scheduler's registrations aligned with stored settings.

use std::sync::Arc;

use tracing::info;

use crate::{
    Error, Result,
    backend::SyncBackend,
    interval,
    lock::RunLock,
    runner::JobRunner,
    scheduler::{JobHandlerFn, JobScheduler},
    store::{OptionStore, SyncOptions, TransientStore},
    time::now_ms,
    types::{IntervalKey, JobKind, JobStatus, RunOutcome, RunResult, SyncStatus},
};

/// The sync engine.
///
/// One instance owns all three jobs; per-job state lives entirely in the
/// injected stores, so several processes sharing a store see the same
/// settings and snapshots.
pub struct SyncService {
    options: SyncOptions,
    runner: Arc<JobRunner>,
    scheduler: Arc<dyn JobScheduler>,
}

impl SyncService {
    pub fn new(
        options: Arc<dyn OptionStore>,
        transients: Arc<dyn TransientStore>,
        backend: Arc<dyn SyncBackend>,
        scheduler: Arc<dyn JobScheduler>,
    ) -> Arc<Self> {
        let options = SyncOptions::new(options);
        let lock = RunLock::new(transients);
        let runner = Arc::new(JobRunner::new(backend, options.clone(), lock));
        Arc::new(Self {
            options,
            runner,
            scheduler,
        })
    }

    /// Rewrite legacy settings, bind one handler per job, and align the
    /// scheduler's registrations with stored settings.
    ///
    /// Call before arming the scheduler's timer.
    pub async fn start(&self) -> Result<()> {
        interval::migrate_legacy_keys(&self.options).await?;

        for kind in JobKind::ALL {
            let runner = Arc::clone(&self.runner);
            let handler: JobHandlerFn = Arc::new(move || {
                let runner = Arc::clone(&runner);
                Box::pin(async move {
                    // Outcomes are persisted by the runner; the scheduler
                    // consumes nothing.
                    let _ = runner.run(kind).await;
                })
            });
            self.scheduler.bind(kind.event_id(), handler).await;
            self.reconcile(kind, false).await?;
        }
        Ok(())
    }

    /// Align the scheduler's registration for `kind` with stored settings.
    ///
    /// Idempotent for `force = false`: when the job is enabled and already
    /// registered, nothing is written.
    pub async fn reconcile(&self, kind: JobKind, force: bool) -> Result<()> {
        let enabled = self.options.enabled(kind).await?;
        let interval = interval::resolve(&self.options, kind).await?;
        let registered = self.scheduler.next_fire(kind.event_id()).await?.is_some();

        if enabled {
            if !registered || force {
                self.scheduler.clear(kind.event_id()).await?;
                let first_fire_at_ms = now_ms() + kind.stagger_offset_ms();
                self.scheduler
                    .register(kind.event_id(), first_fire_at_ms, interval.every_ms())
                    .await?;
                info!(
                    job = kind.as_str(),
                    interval = interval.as_str(),
                    "sync job scheduled"
                );
            }
        } else if registered {
            self.scheduler.clear(kind.event_id()).await?;
            info!(
                job = kind.as_str(),
                interval = interval.as_str(),
                "sync job unscheduled"
            );
        }
        Ok(())
    }

    /// Execute `kind` immediately, outside its schedule.
    pub async fn run_now(&self, kind: JobKind) -> RunOutcome {
        self.runner.run(kind).await
    }

    /// Enable or disable a job and reschedule it accordingly.
    pub async fn set_enabled(&self, kind: JobKind, enabled: bool) -> Result<()> {
        self.options.set_enabled(kind, enabled).await?;
        self.reconcile(kind, true).await
    }

    /// Change a job's recurrence interval and reschedule it.
    pub async fn set_interval(&self, kind: JobKind, key: IntervalKey) -> Result<()> {
        if !kind.allowed_intervals().contains(&key) {
            return Err(Error::interval_not_allowed(kind.as_str(), key.as_str()));
        }
        self.options.set_interval_raw(kind, key.as_str()).await?;
        self.reconcile(kind, true).await
    }

    /// Write initial settings for a job, only for fields not stored yet.
    ///
    /// Used to apply config-file defaults on first start; afterwards the
    /// option store is authoritative.
    pub async fn seed_job(
        &self,
        kind: JobKind,
        enabled: bool,
        interval: Option<IntervalKey>,
    ) -> Result<()> {
        if !self.options.has_settings(kind).await? {
            self.options.set_enabled(kind, enabled).await?;
        }
        if let Some(key) = interval
            && self.options.interval_raw(kind).await?.is_none()
        {
            self.options.set_interval_raw(kind, key.as_str()).await?;
        }
        Ok(())
    }

    /// Last run snapshot for `kind`, if any run completed yet.
    pub async fn last_result(&self, kind: JobKind) -> Result<Option<RunResult>> {
        self.options.last_result(kind).await
    }

    /// Per-job schedule state plus the engine's running flag.
    pub async fn status(&self) -> Result<SyncStatus> {
        let mut jobs = Vec::with_capacity(JobKind::ALL.len());
        for kind in JobKind::ALL {
            jobs.push(JobStatus {
                job: kind,
                enabled: self.options.enabled(kind).await?,
                interval: interval::resolve(&self.options, kind).await?,
                next_fire_at_ms: self.scheduler.next_fire(kind.event_id()).await?,
                last_result: self.options.last_result(kind).await?,
            });
        }
        Ok(SyncStatus {
            running: self.scheduler.is_armed().await,
            jobs,
        })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use {
        anyhow::bail,
        async_trait::async_trait,
    };

    use {
        super::*,
        crate::{
            backend::{CatalogImport, CouponImport, StockUpdate},
            store_memory::MemoryStore,
        },
    };

    /// Scheduler stub recording registration traffic.
    #[derive(Default)]
    struct RecordingScheduler {
        entries: Mutex<HashMap<String, (u64, u64)>>,
        registers: AtomicUsize,
        clears: AtomicUsize,
    }

    impl RecordingScheduler {
        fn register_calls(&self) -> usize {
            self.registers.load(Ordering::SeqCst)
        }

        fn clear_calls(&self) -> usize {
            self.clears.load(Ordering::SeqCst)
        }

        fn entry(&self, event: &str) -> Option<(u64, u64)> {
            let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.get(event).copied()
        }
    }

    #[async_trait]
    impl JobScheduler for RecordingScheduler {
        async fn bind(&self, _event: &str, _handler: JobHandlerFn) {}

        async fn register(&self, event: &str, first_fire_at_ms: u64, every_ms: u64) -> Result<()> {
            self.registers.fetch_add(1, Ordering::SeqCst);
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.insert(event.to_string(), (first_fire_at_ms, every_ms));
            Ok(())
        }

        async fn clear(&self, event: &str) -> Result<()> {
            self.clears.fetch_add(1, Ordering::SeqCst);
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.remove(event);
            Ok(())
        }

        async fn next_fire(&self, event: &str) -> Result<Option<u64>> {
            Ok(self.entry(event).map(|(next, _)| next))
        }

        async fn is_armed(&self) -> bool {
            false
        }
    }

    struct NoopBackend;

    #[async_trait]
    impl SyncBackend for NoopBackend {
        async fn import_new_coupons(&self) -> anyhow::Result<CouponImport> {
            Ok(CouponImport::default())
        }

        async fn import_catalog(&self) -> anyhow::Result<CatalogImport> {
            bail!("catalog backend not stubbed");
        }

        async fn update_stock(&self) -> anyhow::Result<StockUpdate> {
            Ok(StockUpdate::default())
        }
    }

    fn make_service() -> (Arc<MemoryStore>, Arc<RecordingScheduler>, Arc<SyncService>) {
        let store = Arc::new(MemoryStore::new());
        let scheduler = Arc::new(RecordingScheduler::default());
        let service = SyncService::new(
            store.clone(),
            store.clone(),
            Arc::new(NoopBackend),
            scheduler.clone(),
        );
        (store, scheduler, service)
    }

    #[tokio::test]
    async fn reconcile_enabled_registers_once() {
        let (_store, scheduler, service) = make_service();
        service.set_enabled(JobKind::Coupons, true).await.unwrap();
        let after_enable = scheduler.register_calls();

        service.reconcile(JobKind::Coupons, false).await.unwrap();
        service.reconcile(JobKind::Coupons, false).await.unwrap();
        assert_eq!(scheduler.register_calls(), after_enable);
    }

    #[tokio::test]
    async fn reconcile_disabled_twice_makes_no_scheduler_calls() {
        let (_store, scheduler, service) = make_service();
        for kind in JobKind::ALL {
            service.reconcile(kind, false).await.unwrap();
            service.reconcile(kind, false).await.unwrap();
        }
        assert_eq!(scheduler.register_calls(), 0);
        assert_eq!(scheduler.clear_calls(), 0);
    }

    #[tokio::test]
    async fn disabling_clears_the_registration() {
        let (_store, scheduler, service) = make_service();
        service.set_enabled(JobKind::Stock, true).await.unwrap();
        assert!(scheduler.entry(JobKind::Stock.event_id()).is_some());

        service.set_enabled(JobKind::Stock, false).await.unwrap();
        assert!(scheduler.entry(JobKind::Stock.event_id()).is_none());
    }

    #[tokio::test]
    async fn force_reconcile_rewrites_registration() {
        let (_store, scheduler, service) = make_service();
        service.set_enabled(JobKind::Coupons, true).await.unwrap();
        let before = scheduler.register_calls();

        service.reconcile(JobKind::Coupons, true).await.unwrap();
        assert_eq!(scheduler.register_calls(), before + 1);
    }

    #[tokio::test]
    async fn set_interval_rejects_disallowed_key() {
        let (_store, _scheduler, service) = make_service();
        let result = service
            .set_interval(JobKind::Catalog, IntervalKey::Every5Minutes)
            .await;
        assert!(matches!(result, Err(Error::IntervalNotAllowed { .. })));
    }

    #[tokio::test]
    async fn set_interval_reregisters_with_new_period() {
        let (_store, scheduler, service) = make_service();
        service.set_enabled(JobKind::Catalog, true).await.unwrap();

        service
            .set_interval(JobKind::Catalog, IntervalKey::Hourly)
            .await
            .unwrap();

        let (_, every_ms) = scheduler.entry(JobKind::Catalog.event_id()).unwrap();
        assert_eq!(every_ms, IntervalKey::Hourly.every_ms());
    }

    #[tokio::test]
    async fn start_registers_enabled_jobs_with_staggered_first_fires() {
        let (_store, scheduler, service) = make_service();
        for kind in JobKind::ALL {
            service.set_enabled(kind, true).await.unwrap();
        }

        service.start().await.unwrap();

        let (coupons_first, _) = scheduler.entry(JobKind::Coupons.event_id()).unwrap();
        let (catalog_first, _) = scheduler.entry(JobKind::Catalog.event_id()).unwrap();
        let (stock_first, _) = scheduler.entry(JobKind::Stock.event_id()).unwrap();
        assert!(coupons_first < catalog_first);
        assert!(catalog_first < stock_first);
    }

    #[tokio::test]
    async fn start_leaves_disabled_jobs_unregistered() {
        let (_store, scheduler, service) = make_service();
        service.set_enabled(JobKind::Coupons, true).await.unwrap();

        service.start().await.unwrap();

        assert!(scheduler.entry(JobKind::Coupons.event_id()).is_some());
        assert!(scheduler.entry(JobKind::Catalog.event_id()).is_none());
        assert!(scheduler.entry(JobKind::Stock.event_id()).is_none());
    }

    #[tokio::test]
    async fn seed_job_only_writes_absent_fields() {
        let (_store, _scheduler, service) = make_service();

        service
            .seed_job(JobKind::Coupons, true, Some(IntervalKey::Hourly))
            .await
            .unwrap();
        let status = service.status().await.unwrap();
        let coupons = &status.jobs[0];
        assert!(coupons.enabled);
        assert_eq!(coupons.interval, IntervalKey::Hourly);

        // Operator disables the job; a later seed must not flip it back.
        service.set_enabled(JobKind::Coupons, false).await.unwrap();
        service
            .seed_job(JobKind::Coupons, true, Some(IntervalKey::Every5Minutes))
            .await
            .unwrap();
        let status = service.status().await.unwrap();
        assert!(!status.jobs[0].enabled);
        assert_eq!(status.jobs[0].interval, IntervalKey::Hourly);
    }

    #[tokio::test]
    async fn status_reports_all_jobs() {
        let (_store, _scheduler, service) = make_service();
        service.set_enabled(JobKind::Stock, true).await.unwrap();

        let status = service.status().await.unwrap();
        assert!(!status.running);
        assert_eq!(status.jobs.len(), 3);
        let stock = status.jobs.iter().find(|j| j.job == JobKind::Stock).unwrap();
        assert!(stock.enabled);
        assert!(stock.last_result.is_none());
    }

    #[tokio::test]
    async fn run_now_records_snapshot_visible_in_status() {
        let (_store, _scheduler, service) = make_service();

        let outcome = service.run_now(JobKind::Coupons).await;
        assert!(outcome.result().is_some());

        let last = service.last_result(JobKind::Coupons).await.unwrap();
        assert!(last.is_some_and(|r| r.succeeded));
    }

    #[tokio::test]
    async fn run_now_failure_reaches_snapshot() {
        let (_store, _scheduler, service) = make_service();

        let outcome = service.run_now(JobKind::Catalog).await;
        let result = outcome.result().expect("run should complete").clone();
        assert!(!result.succeeded);
        assert_eq!(result.error.as_deref(), Some("catalog backend not stubbed"));
    }
}
