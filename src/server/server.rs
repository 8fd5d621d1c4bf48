use anyhow::Result;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use super::metrics::metrics_handler;
use super::state::{GuardedJobStore, ServerState};
use super::websocket::ws_handler;
use super::log_requests;
use crate::acquisition::FileSource;
use crate::print_queue::{PipelineError, PrintPipeline, PrintRequest};

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct PrintBody {
    file_url: Option<String>,
    base64: Option<String>,
    html: Option<String>,
    printer: Option<String>,
    // Accepted for compatibility; the spooler prints one copy.
    #[allow(dead_code)]
    copies: Option<u32>,
    preview: Option<bool>,
    hospital_no: Option<String>,
    user_name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrintAccepted {
    status: &'static str,
    message: &'static str,
    job_id: String,
}

#[derive(Serialize)]
struct StatusBody {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
}

impl StatusBody {
    fn success() -> Json<Self> {
        Json(Self {
            status: "success",
            message: None,
        })
    }

    fn success_with(message: &'static str) -> Json<Self> {
        Json(Self {
            status: "success",
            message: Some(message),
        })
    }
}

#[derive(Serialize)]
struct AgentStatus {
    status: &'static str,
    version: &'static str,
}

#[derive(Deserialize, Debug, Default)]
struct JobIdQuery {
    #[serde(default)]
    id: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl PrintBody {
    /// Picks the job source. Inline data wins over a URL.
    fn source(&self) -> Result<FileSource, &'static str> {
        let file_url = non_empty(self.file_url.clone());
        let base64 = non_empty(self.base64.clone());
        let html = non_empty(self.html.clone());

        if file_url.is_none() && base64.is_none() && html.is_none() {
            return Err("fileUrl, base64, or html is required");
        }
        if html.is_some() {
            return Err("HTML printing is not supported by this agent");
        }
        match (base64, file_url) {
            (Some(data), _) => Ok(FileSource::Base64(data)),
            (None, Some(url)) => Ok(FileSource::Url(url)),
            (None, None) => Err("fileUrl, base64, or html is required"),
        }
    }
}

fn pipeline_error_response(err: PipelineError) -> Response {
    let (status, message) = match &err {
        PipelineError::NotFound(_) => (StatusCode::NOT_FOUND, "Job not found".to_string()),
        PipelineError::MissingFile(_) => {
            (StatusCode::NOT_FOUND, "Job or file not found".to_string())
        }
        PipelineError::NotRetryable { .. } => (StatusCode::CONFLICT, err.to_string()),
        PipelineError::Viewer(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to view: {}", e),
        ),
    };
    (status, message).into_response()
}

async fn print(State(pipeline): State<PrintPipeline>, body: Bytes) -> Response {
    let body: PrintBody = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(e) => {
            warn!("Rejected print request: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid request body").into_response();
        }
    };
    let source = match body.source() {
        Ok(source) => source,
        Err(reason) => return (StatusCode::BAD_REQUEST, reason).into_response(),
    };

    let (job, _worker) = pipeline.submit(PrintRequest {
        source,
        printer: body.printer.unwrap_or_default(),
        preview: body.preview.unwrap_or(false),
        hospital_no: body.hospital_no.unwrap_or_default(),
        user_name: body.user_name.unwrap_or_default(),
    });

    Json(PrintAccepted {
        status: "success",
        message: "Job received and added to queue",
        job_id: job.id,
    })
    .into_response()
}

async fn get_printers(State(store): State<GuardedJobStore>) -> Response {
    match store.backend().list_printers().await {
        Ok(printers) => Json(printers).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to list printers: {}", e),
        )
            .into_response(),
    }
}

async fn get_status() -> Json<AgentStatus> {
    Json(AgentStatus {
        status: "running",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn get_queue(State(store): State<GuardedJobStore>) -> Response {
    Json(store.list()).into_response()
}

async fn clear_queue(State(store): State<GuardedJobStore>) -> Response {
    store.clear_all().await;
    StatusBody::success().into_response()
}

async fn retry_job(
    State(pipeline): State<PrintPipeline>,
    Query(query): Query<JobIdQuery>,
) -> Response {
    match pipeline.retry(&query.id) {
        Ok(_worker) => StatusBody::success_with("Retry started").into_response(),
        Err(e) => pipeline_error_response(e),
    }
}

async fn view_job(
    State(pipeline): State<PrintPipeline>,
    Query(query): Query<JobIdQuery>,
) -> Response {
    match pipeline.view(&query.id) {
        Ok(()) => StatusBody::success().into_response(),
        Err(e) => pipeline_error_response(e),
    }
}

async fn delete_job(
    State(store): State<GuardedJobStore>,
    Query(query): Query<JobIdQuery>,
) -> Response {
    if query.id.is_empty() {
        info!("Delete without id, clearing the whole queue");
        store.clear_all().await;
        return StatusBody::success_with("All jobs and files deleted").into_response();
    }
    store.remove(&query.id).await;
    StatusBody::success().into_response()
}

pub fn make_app(state: ServerState) -> Router {
    let queue_routes: Router = Router::new()
        .route("/", get(get_queue))
        // Queue actions also answer GET for browser dashboards.
        .route("/clear", get(clear_queue).post(clear_queue))
        .route("/retry", get(retry_job).post(retry_job))
        .route("/view", get(view_job).post(view_job))
        .route(
            "/delete",
            get(delete_job).post(delete_job).delete(delete_job),
        )
        .with_state(state.clone());

    let app: Router = Router::new()
        .route("/print", post(print))
        .route("/printers", get(get_printers))
        .route("/status", get(get_status))
        .route("/metrics", get(metrics_handler))
        .route("/ws", get(ws_handler))
        .with_state(state.clone())
        .nest("/queue", queue_routes);

    app.layer(middleware::from_fn_with_state(state, log_requests))
        .layer(CorsLayer::permissive())
}

/// Serve the agent API on an already bound listener until `shutdown` fires.
pub async fn run_server(
    listener: TcpListener,
    state: ServerState,
    shutdown: CancellationToken,
) -> Result<()> {
    let app = make_app(state);
    if let Ok(addr) = listener.local_addr() {
        info!("Print agent listening on {}", addr);
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
