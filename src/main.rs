use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use print_agent::acquisition::HttpFileFetcher;
use print_agent::config::{
    AppConfig, CliConfig, FileConfig, DEFAULT_DOWNLOAD_TIMEOUT_SECS, DEFAULT_PORT,
    DEFAULT_RECONCILE_INTERVAL_SECS, DEFAULT_SUBMIT_TIMEOUT_SECS,
};
use print_agent::metrics;
use print_agent::print_queue::{JobStore, PrintPipeline, Reconciler};
use print_agent::printer::{default_backend, SystemViewer};
use print_agent::server::{run_server, ConnectionManager, ServerConfig, ServerState};
use print_agent::RequestsLoggingLevel;

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(path_buf))
}

#[derive(Parser, Debug)]
#[command(version, about = "Local print agent")]
struct CliArgs {
    /// Path to a TOML config file. Its values override the flags below.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding jobs.json and the stored job files. Defaults to ~/.print-agent.
    #[clap(long, value_parser = parse_path)]
    pub storage_dir: Option<PathBuf>,

    /// The port to listen on (127.0.0.1 only).
    #[clap(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Seconds between spooler reconciliation passes.
    #[clap(long, default_value_t = DEFAULT_RECONCILE_INTERVAL_SECS)]
    pub reconcile_interval_secs: u64,

    /// Seconds a single print submission may take.
    #[clap(long, default_value_t = DEFAULT_SUBMIT_TIMEOUT_SECS)]
    pub submit_timeout_secs: u64,

    /// Seconds a source download may take.
    #[clap(long, default_value_t = DEFAULT_DOWNLOAD_TIMEOUT_SECS)]
    pub download_timeout_secs: u64,

    /// SumatraPDF executable for silent printing on Windows.
    #[clap(long, value_parser = parse_path)]
    pub sumatra_path: Option<PathBuf>,
}

impl From<&CliArgs> for CliConfig {
    fn from(args: &CliArgs) -> Self {
        CliConfig {
            storage_dir: args.storage_dir.clone(),
            port: args.port,
            logging_level: args.logging_level.clone(),
            reconcile_interval_secs: args.reconcile_interval_secs,
            submit_timeout_secs: args.submit_timeout_secs,
            download_timeout_secs: args.download_timeout_secs,
            sumatra_path: args.sumatra_path.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&CliConfig::from(&cli_args), file_config)?;
    config.ensure_storage_dirs()?;
    info!("Using storage directory {:?}", config.storage_dir);

    // Claim the port before touching jobs.json or print_jobs/.
    let listener = match tokio::net::TcpListener::bind(("127.0.0.1", config.port)).await {
        Ok(listener) => listener,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            warn!(
                "Port {} is already in use, another print agent is probably running",
                config.port
            );
            return Ok(());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to bind port {}", config.port));
        }
    };

    metrics::init_metrics();

    let backend = Arc::new(default_backend(
        config.submit_timeout,
        config.sumatra_path.clone(),
    ));
    let store = Arc::new(JobStore::new(
        config.jobs_file_path(),
        config.job_files_dir(),
        backend,
    ));

    let report = store.recover();
    info!(
        "Loaded {} job(s) from {:?}",
        report.loaded,
        config.jobs_file_path()
    );

    let connection_manager = Arc::new(ConnectionManager::new());
    store.set_notifier(connection_manager.clone());

    let fetcher = Arc::new(HttpFileFetcher::new(config.download_timeout)?);
    let pipeline = PrintPipeline::new(store.clone(), fetcher, Arc::new(SystemViewer));

    let shutdown = CancellationToken::new();

    let reconciler = Reconciler::new(store.clone(), config.reconcile_interval);
    let reconciler_shutdown = shutdown.clone();
    let reconciler_handle = tokio::spawn(async move { reconciler.run(reconciler_shutdown).await });

    let ctrl_c_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        info!("Shutting down");
        ctrl_c_shutdown.cancel();
    });

    let state = ServerState::new(
        ServerConfig::from(&config),
        pipeline,
        connection_manager,
    );
    let result = run_server(listener, state, shutdown.clone()).await;

    shutdown.cancel();
    if let Err(e) = reconciler_handle.await {
        error!("Reconciler task failed: {}", e);
    }
    result
}
