//! Test server lifecycle management
//!
//! Each test gets an isolated agent with its own storage directory, a
//! scripted printer backend and a recording viewer.

use super::constants::*;
use super::fake_printer::{FakePrinter, RecordingViewer};
use axum::{http::StatusCode, routing::get, Router};
use print_agent::acquisition::HttpFileFetcher;
use print_agent::print_queue::{JobStore, PrintPipeline, Reconciler, TickOutcome};
use print_agent::server::{
    make_app, metrics, ConnectionManager, RequestsLoggingLevel, ServerConfig, ServerState,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Agent instance bound to a random local port.
///
/// When dropped, the server shuts down and the storage directory is removed.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,
    pub store: Arc<JobStore>,
    pub printer: Arc<FakePrinter>,
    pub viewer: Arc<RecordingViewer>,

    storage: Option<TempDir>,
    shutdown: CancellationToken,
}

#[allow(dead_code)]
impl TestServer {
    pub async fn spawn() -> Self {
        let storage = TempDir::new().expect("Failed to create storage dir");
        Self::spawn_in(storage).await
    }

    /// Spawns an agent over an existing storage directory, running startup
    /// recovery first the way the binary does.
    pub async fn spawn_in(storage: TempDir) -> Self {
        metrics::init_metrics();
        let files_dir = storage.path().join("print_jobs");
        std::fs::create_dir_all(&files_dir).expect("Failed to create job files dir");

        let printer = Arc::new(FakePrinter::new());
        let viewer = Arc::new(RecordingViewer::default());
        let store = Arc::new(JobStore::new(
            storage.path().join("jobs.json"),
            files_dir,
            printer.clone(),
        ));
        store.recover();

        let connection_manager = Arc::new(ConnectionManager::new());
        store.set_notifier(connection_manager.clone());

        let fetcher = Arc::new(
            HttpFileFetcher::new(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .expect("Failed to build fetcher"),
        );
        let pipeline = PrintPipeline::new(store.clone(), fetcher, viewer.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
        };
        let app = make_app(ServerState::new(config, pipeline, connection_manager));

        let shutdown = CancellationToken::new();
        let server_shutdown = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url: format!("http://127.0.0.1:{}", port),
            store,
            printer,
            viewer,
            storage: Some(storage),
            shutdown,
        };
        server.wait_for_ready().await;
        server
    }

    pub fn ws_url(&self) -> String {
        self.base_url.replace("http://", "ws://") + "/ws"
    }

    pub fn storage_dir(&self) -> &Path {
        self.storage
            .as_ref()
            .expect("Storage already handed back")
            .path()
    }

    pub fn jobs_file(&self) -> PathBuf {
        self.storage_dir().join("jobs.json")
    }

    pub fn job_files_dir(&self) -> PathBuf {
        self.storage_dir().join("print_jobs")
    }

    /// Runs a single reconciliation pass against the fake spooler.
    pub async fn reconcile(&self) -> TickOutcome {
        Reconciler::new(self.store.clone(), Duration::from_secs(1))
            .tick()
            .await
    }

    /// Stops serving and hands back the storage directory, for restart tests.
    pub fn stop(mut self) -> TempDir {
        self.shutdown.cancel();
        self.storage.take().expect("Storage already handed back")
    }

    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/status", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Serves `PDF_BYTES` at `/doc.pdf` and 404 everywhere else.
pub struct FileHost {
    pub base_url: String,
    shutdown: CancellationToken,
}

#[allow(dead_code)]
impl FileHost {
    pub async fn spawn() -> Self {
        let app = Router::new()
            .route("/doc.pdf", get(|| async { PDF_BYTES }))
            .fallback(|| async { StatusCode::NOT_FOUND });

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind file host");
        let port = listener.local_addr().expect("No local address").port();

        let shutdown = CancellationToken::new();
        let host_shutdown = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { host_shutdown.cancelled().await })
                .await
                .expect("File host failed");
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            shutdown,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for FileHost {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
