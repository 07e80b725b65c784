use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use callwatchd::{
    config::{self, DaemonConfig},
    query::QueryService,
    rest,
    scraper::PortalScraper,
    storage::Storage,
    tasks::TaskManager,
    AppContext,
};

#[derive(Parser)]
#[command(
    name = "callwatchd",
    about = "CallWatch — call-center agent report scrape daemon",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// REST API port
    #[arg(long, env = "CALLWATCH_PORT")]
    port: Option<u16>,

    /// Data directory for config and the SQLite database
    #[arg(long, env = "CALLWATCH_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "CALLWATCH_LOG")]
    log: Option<String>,

    /// Bind address for the REST server (default: 127.0.0.1; use 0.0.0.0 for LAN access)
    #[arg(long, env = "CALLWATCH_BIND")]
    bind_address: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "CALLWATCH_LOG_FILE")]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the daemon server (default when no subcommand given).
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    match args.command {
        None | Some(Command::Serve) => run_serve(args).await,
    }
}

async fn run_serve(args: Args) -> Result<()> {
    let data_dir = args
        .data_dir
        .clone()
        .unwrap_or_else(config::default_data_dir);

    let mut config = DaemonConfig::load(&data_dir);
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(bind) = args.bind_address {
        config.bind_address = bind;
    }
    if let Some(level) = args.log {
        config.log_level = level;
    }

    let _log_guard = setup_logging(&config.log_level, args.log_file.as_deref(), &config.log_format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %config.data_dir.display(),
        "callwatchd starting"
    );
    if config.portal.base_url.is_empty() {
        tracing::warn!("portal.base_url is not configured — scrape tasks will fail until it is set");
    }

    let storage = Storage::new(&config.data_dir).await?;
    let scraper = Arc::new(PortalScraper::new(
        config.portal.clone(),
        config.scrape.clone(),
    ));
    let tasks = Arc::new(TaskManager::new(
        scraper,
        storage.clone(),
        config.scrape.max_concurrent,
    ));
    let queries = Arc::new(QueryService::new(storage.clone()));

    let ctx = Arc::new(AppContext {
        config: Arc::new(config),
        storage,
        tasks,
        queries,
        started_at: std::time::Instant::now(),
    });

    rest::start_rest_server(ctx).await
}

/// Initialize the tracing subscriber.
///
/// Returns a `WorkerGuard` that must stay alive for the process lifetime
/// when file logging is enabled.
///
/// `log_format` may be `"pretty"` (default, human-readable compact format)
/// or `"json"` (structured JSON for log aggregators).
///
/// If the log directory cannot be created, falls back to stdout-only logging
/// with a warning — never panics.
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = log_format == "json";

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("callwatchd.log"));

        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "warn: could not create log directory '{}': {e} — falling back to stdout",
                dir.display()
            );
            if use_json {
                tracing_subscriber::fmt().json().with_env_filter(log_level).init();
            } else {
                tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
            }
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json())
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact())
                .with(fmt::layer().with_writer(non_blocking))
                .init();
        }

        Some(guard)
    } else if use_json {
        tracing_subscriber::fmt().json().with_env_filter(log_level).init();
        None
    } else {
        tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
        None
    }
}
