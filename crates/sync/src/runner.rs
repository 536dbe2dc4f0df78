//! End-to-end execution of one job invocation.

use std::sync::Arc;

use tracing::{error, info, warn};

#[cfg(feature = "metrics")]
use metrics::{counter, histogram};

use crate::{
    backend::SyncBackend,
    interval,
    lock::RunLock,
    store::SyncOptions,
    time::now_ms,
    types::{JobCounters, JobKind, RunOutcome, RunResult},
};

#[cfg(feature = "metrics")]
const RUNS_TOTAL: &str = "shopbridge_sync_runs_total";
#[cfg(feature = "metrics")]
const SKIPS_TOTAL: &str = "shopbridge_sync_skips_total";
#[cfg(feature = "metrics")]
const ERRORS_TOTAL: &str = "shopbridge_sync_errors_total";
#[cfg(feature = "metrics")]
const RUN_DURATION_SECONDS: &str = "shopbridge_sync_run_duration_seconds";

/// Current resident set size of this process in kilobytes.
///
/// Returns 0 when the probe fails; sampling must never fail a run.
fn current_rss_kb() -> u64 {
    use sysinfo::{ProcessesToUpdate, System};

    let Ok(pid) = sysinfo::get_current_pid() else {
        return 0;
    };
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    system.process(pid).map(|p| p.memory() / 1024).unwrap_or(0)
}

/// Runs one job invocation: lock, delegate, finalize, release.
pub struct JobRunner {
    backend: Arc<dyn SyncBackend>,
    options: SyncOptions,
    lock: RunLock,
}

impl JobRunner {
    #[must_use]
    pub fn new(backend: Arc<dyn SyncBackend>, options: SyncOptions, lock: RunLock) -> Self {
        Self {
            backend,
            options,
            lock,
        }
    }

    /// Execute `kind` once.
    ///
    /// Delegate failures never propagate; every path past lock acquisition
    /// persists a snapshot and releases the lock.
    pub async fn run(&self, kind: JobKind) -> RunOutcome {
        match self.lock.try_acquire(kind).await {
            Ok(true) => {},
            Ok(false) => {
                info!(
                    job = kind.as_str(),
                    "sync run skipped, previous run still holds the lock"
                );
                #[cfg(feature = "metrics")]
                counter!(SKIPS_TOTAL, "job" => kind.as_str()).increment(1);
                return RunOutcome::Skipped;
            },
            Err(e) => {
                warn!(
                    job = kind.as_str(),
                    error = %e,
                    "sync run skipped, lock state unreadable"
                );
                return RunOutcome::Skipped;
            },
        }

        let started_at_ms = now_ms();
        let start_rss_kb = current_rss_kb();
        let interval = interval::resolve(&self.options, kind).await.ok();
        info!(
            job = kind.as_str(),
            interval = interval.map(|i| i.as_str()).unwrap_or("unknown"),
            rss_kb = start_rss_kb,
            "sync run started"
        );
        #[cfg(feature = "metrics")]
        counter!(RUNS_TOTAL, "job" => kind.as_str()).increment(1);

        let delegate: anyhow::Result<JobCounters> = match kind {
            JobKind::Coupons => self.backend.import_new_coupons().await.map(Into::into),
            JobKind::Catalog => self.backend.import_catalog().await.map(Into::into),
            JobKind::Stock => self.backend.update_stock().await.map(Into::into),
        };

        // Finalization. Everything from here to the lock release runs on
        // both outcomes of the delegate call.
        let finished_at_ms = now_ms();
        let duration_ms = finished_at_ms.saturating_sub(started_at_ms);
        let peak_memory_kb = start_rss_kb.max(current_rss_kb());

        let (succeeded, counters, error_text) = match delegate {
            Ok(counters) => (true, counters, None),
            Err(e) => (false, JobCounters::zeroed(kind), Some(e.to_string())),
        };

        let result = RunResult {
            started_at_ms,
            finished_at_ms,
            succeeded,
            duration_ms,
            peak_memory_kb,
            error: error_text,
            counters,
        };

        if let Err(e) = self.options.save_last_result(kind, &result).await {
            warn!(job = kind.as_str(), error = %e, "failed to persist run snapshot");
        }

        match &result.error {
            None => info!(
                job = kind.as_str(),
                duration_ms,
                peak_memory_kb,
                counters = ?result.counters,
                "sync run finished"
            ),
            Some(err) => {
                error!(
                    job = kind.as_str(),
                    duration_ms,
                    error = %err,
                    "sync run failed"
                );
                #[cfg(feature = "metrics")]
                counter!(ERRORS_TOTAL, "job" => kind.as_str()).increment(1);
            },
        }
        #[cfg(feature = "metrics")]
        histogram!(RUN_DURATION_SECONDS).record(duration_ms as f64 / 1000.0);

        if let Err(e) = self.lock.release(kind).await {
            warn!(
                job = kind.as_str(),
                error = %e,
                "failed to release run lock; it will expire on its own"
            );
        }

        RunOutcome::Completed(result)
    }
}
