use std::{path::PathBuf, sync::Arc};

use {
    clap::{Parser, Subcommand},
    secrecy::Secret,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    shopbridge_config::{AppConfig, StorageBackend},
    shopbridge_erp::ErpClient,
    shopbridge_sync::{
        scheduler::{JobScheduler, TimerScheduler},
        service::SyncService,
        store::{OptionStore, TransientStore},
        store_file::FileStore,
        store_sqlite::SqliteStore,
        types::{IntervalKey, JobKind, JobStatus, RunOutcome},
    },
};

#[derive(Parser)]
#[command(name = "shopbridge", about = "Shopbridge — store/ERP synchronization daemon")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Custom config directory (overrides the default lookup).
    #[arg(long, global = true, env = "SHOPBRIDGE_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Custom data directory for the file storage backend.
    #[arg(long, global = true, env = "SHOPBRIDGE_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sync daemon (default when no subcommand is provided).
    Daemon,
    /// Execute one job immediately and print the outcome.
    Run {
        /// Job name: coupons, catalog, or stock.
        job: String,
    },
    /// Show per-job schedule state and last run results.
    Status,
    /// Enable a job and reschedule it.
    Enable { job: String },
    /// Disable a job and clear its schedule.
    Disable { job: String },
    /// Change a job's recurrence interval.
    SetInterval { job: String, interval: String },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

fn default_data_dir() -> anyhow::Result<PathBuf> {
    directories::ProjectDirs::from("", "", "shopbridge")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| anyhow::anyhow!("cannot determine data directory"))
}

async fn build_stores(
    config: &AppConfig,
    data_dir_override: Option<PathBuf>,
) -> anyhow::Result<(Arc<dyn OptionStore>, Arc<dyn TransientStore>)> {
    match config.storage.backend {
        StorageBackend::File => {
            let dir = match data_dir_override.or_else(|| config.storage.data_dir.clone()) {
                Some(dir) => dir,
                None => default_data_dir()?,
            };
            let store = Arc::new(FileStore::new(&dir));
            Ok((store.clone() as Arc<dyn OptionStore>, store))
        },
        StorageBackend::Sqlite => {
            let url = config
                .storage
                .database_url
                .clone()
                .unwrap_or_else(|| "sqlite://shopbridge.db".into());
            let store = Arc::new(SqliteStore::new(&url).await?);
            Ok((store.clone() as Arc<dyn OptionStore>, store))
        },
    }
}

/// Apply config-file job settings to the option store, first start only.
async fn seed_from_config(service: &SyncService, config: &AppConfig) -> anyhow::Result<()> {
    let jobs = [
        (JobKind::Coupons, &config.jobs.coupons),
        (JobKind::Catalog, &config.jobs.catalog),
        (JobKind::Stock, &config.jobs.stock),
    ];
    for (kind, job_config) in jobs {
        let interval = job_config
            .interval
            .as_deref()
            .and_then(|raw| raw.parse::<IntervalKey>().ok());
        service.seed_job(kind, job_config.enabled, interval).await?;
    }
    Ok(())
}

fn format_timestamp(ms: u64) -> String {
    chrono::DateTime::from_timestamp_millis(ms as i64)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ms.to_string())
}

fn print_job_status(job: &JobStatus) {
    let next = job
        .next_fire_at_ms
        .map(format_timestamp)
        .unwrap_or_else(|| "unscheduled".into());
    println!(
        "{:<8} enabled={:<5} interval={:<16} next={next}",
        job.job.to_string(),
        job.enabled,
        job.interval.to_string(),
    );
    match &job.last_result {
        Some(last) => {
            let state = if last.succeeded { "ok" } else { "failed" };
            let error = last
                .error
                .as_deref()
                .map(|e| format!(" error={e}"))
                .unwrap_or_default();
            println!(
                "         last run: {state} at {} ({} ms, peak {} KiB){error}",
                format_timestamp(last.started_at_ms),
                last.duration_ms,
                last.peak_memory_kb,
            );
        },
        None => println!("         last run: never"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "shopbridge starting");

    let config = shopbridge_config::discover_and_load(cli.config_dir.as_deref());
    let (options, transients) = build_stores(&config, cli.data_dir.clone()).await?;

    let backend = Arc::new(ErpClient::new(
        &config.erp.base_url,
        config.erp.api_key.clone().map(Secret::new),
        Some(config.erp.timeout_secs),
    )?);
    let scheduler = TimerScheduler::new();
    let service = SyncService::new(
        options,
        transients,
        backend,
        scheduler.clone() as Arc<dyn JobScheduler>,
    );

    match cli.command {
        None | Some(Commands::Daemon) => {
            seed_from_config(&service, &config).await?;
            service.start().await?;
            scheduler.start().await;
            info!("sync daemon running; press ctrl-c to stop");
            tokio::signal::ctrl_c().await?;
            scheduler.stop().await;
            info!("sync daemon stopped");
            Ok(())
        },
        Some(Commands::Run { job }) => {
            let kind: JobKind = job.parse()?;
            match service.run_now(kind).await {
                RunOutcome::Skipped => {
                    println!("{kind}: skipped, a previous run still holds the lock");
                },
                RunOutcome::Completed(result) => {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                },
            }
            Ok(())
        },
        Some(Commands::Status) => {
            let status = service.status().await?;
            for job in &status.jobs {
                print_job_status(job);
            }
            Ok(())
        },
        Some(Commands::Enable { job }) => {
            let kind: JobKind = job.parse()?;
            service.set_enabled(kind, true).await?;
            println!("{kind}: enabled");
            Ok(())
        },
        Some(Commands::Disable { job }) => {
            let kind: JobKind = job.parse()?;
            service.set_enabled(kind, false).await?;
            println!("{kind}: disabled");
            Ok(())
        },
        Some(Commands::SetInterval { job, interval }) => {
            let kind: JobKind = job.parse()?;
            let key: IntervalKey = interval.parse()?;
            service.set_interval(kind, key).await?;
            println!("{kind}: interval set to {key}");
            Ok(())
        },
    }
}
