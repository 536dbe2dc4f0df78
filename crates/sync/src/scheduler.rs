//! Recurring trigger registration and the in-process timer loop.

use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    tokio::{
        sync::{Mutex, Notify, RwLock},
        task::JoinHandle,
    },
    tracing::{debug, info},
};

use crate::{Error, Result, time::now_ms};

/// Handler bound to a scheduled event. Takes no arguments and returns
/// nothing; outcomes are recorded by the handler itself.
pub type JobHandlerFn = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Recurring-trigger registry.
///
/// Registering an event replaces any prior registration for it; clearing an
/// unknown event is a no-op.
#[async_trait]
pub trait JobScheduler: Send + Sync {
    /// Bind `handler` to `event`. Rebinding replaces the previous handler.
    async fn bind(&self, event: &str, handler: JobHandlerFn);

    /// Register a recurring trigger: first fire at `first_fire_at_ms`, then
    /// every `every_ms` thereafter.
    async fn register(&self, event: &str, first_fire_at_ms: u64, every_ms: u64) -> Result<()>;

    /// Remove the trigger for `event`, if any.
    async fn clear(&self, event: &str) -> Result<()>;

    /// Next fire time of `event`, or `None` when not registered.
    async fn next_fire(&self, event: &str) -> Result<Option<u64>>;

    /// Whether the scheduler's timer is currently running.
    async fn is_armed(&self) -> bool;
}

/// Wake cadence when nothing is registered.
const IDLE_POLL_MS: u64 = 60_000;

#[derive(Debug, Clone)]
struct ScheduleEntry {
    event: String,
    next_at_ms: u64,
    every_ms: u64,
}

/// Tokio-backed scheduler: one timer task sleeps until the earliest
/// registered fire time and spawns the bound handler for each due event.
pub struct TimerScheduler {
    entries: RwLock<Vec<ScheduleEntry>>,
    handlers: RwLock<HashMap<String, JobHandlerFn>>,
    wake: Arc<Notify>,
    running: RwLock<bool>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl TimerScheduler {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: RwLock::new(Vec::new()),
            handlers: RwLock::new(HashMap::new()),
            wake: Arc::new(Notify::new()),
            running: RwLock::new(false),
            timer: Mutex::new(None),
        })
    }

    /// Start the timer loop.
    pub async fn start(self: &Arc<Self>) {
        *self.running.write().await = true;

        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            scheduler.timer_loop().await;
        });

        *self.timer.lock().await = Some(handle);
        info!("timer scheduler started");
    }

    /// Stop the timer loop.
    pub async fn stop(&self) {
        *self.running.write().await = false;
        self.wake.notify_one();

        let mut timer = self.timer.lock().await;
        if let Some(handle) = timer.take() {
            handle.abort();
        }
        info!("timer scheduler stopped");
    }

    async fn timer_loop(self: &Arc<Self>) {
        loop {
            if !*self.running.read().await {
                break;
            }

            let sleep_ms = self.ms_until_next_wake().await;

            if sleep_ms > 0 {
                let wake = Arc::clone(&self.wake);
                tokio::select! {
                    () = tokio::time::sleep(Duration::from_millis(sleep_ms)) => {},
                    () = wake.notified() => {
                        debug!("timer loop woken early");
                        continue;
                    },
                }
            }

            if !*self.running.read().await {
                break;
            }

            self.fire_due().await;
        }
    }

    async fn ms_until_next_wake(&self) -> u64 {
        let entries = self.entries.read().await;
        let now = now_ms();
        entries
            .iter()
            .map(|e| e.next_at_ms.saturating_sub(now))
            .min()
            .unwrap_or(IDLE_POLL_MS)
    }

    async fn fire_due(self: &Arc<Self>) {
        let now = now_ms();
        let due: Vec<String> = {
            let mut entries = self.entries.write().await;
            let mut due = Vec::new();
            for entry in entries.iter_mut() {
                if entry.next_at_ms <= now {
                    // Advance past now so a long tick cannot double-fire.
                    while entry.next_at_ms <= now {
                        entry.next_at_ms += entry.every_ms;
                    }
                    due.push(entry.event.clone());
                }
            }
            due
        };

        for event in due {
            let handler = self.handlers.read().await.get(&event).cloned();
            match handler {
                Some(handler) => {
                    debug!(%event, "firing scheduled event");
                    tokio::spawn(handler());
                },
                None => debug!(%event, "scheduled event has no bound handler"),
            }
        }
    }
}

#[async_trait]
impl JobScheduler for TimerScheduler {
    async fn bind(&self, event: &str, handler: JobHandlerFn) {
        self.handlers.write().await.insert(event.to_string(), handler);
    }

    async fn register(&self, event: &str, first_fire_at_ms: u64, every_ms: u64) -> Result<()> {
        if every_ms == 0 {
            return Err(Error::message("every_ms must be > 0"));
        }

        let mut entries = self.entries.write().await;
        entries.retain(|e| e.event != event);
        entries.push(ScheduleEntry {
            event: event.to_string(),
            next_at_ms: first_fire_at_ms,
            every_ms,
        });
        drop(entries);

        self.wake.notify_one();
        Ok(())
    }

    async fn clear(&self, event: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.retain(|e| e.event != event);
        drop(entries);

        self.wake.notify_one();
        Ok(())
    }

    async fn next_fire(&self, event: &str) -> Result<Option<u64>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .find(|e| e.event == event)
            .map(|e| e.next_at_ms))
    }

    async fn is_armed(&self) -> bool {
        *self.running.read().await
    }
}
