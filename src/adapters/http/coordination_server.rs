//! Coordination protocol endpoint.
//!
//! Loopback HTTP server the renderer host talks to: fetch chart inputs,
//! submit finished images, report errors, signal the end of the batch.
//! The wire format is form-encoded base64 for images and plain form
//! fields elsewhere, so any host environment with an HTTP client can
//! participate.

use axum::{
    extract::{Form, Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::adapters::transform::strip_animation;
use crate::application::scheduler::BatchScheduler;
use crate::domain::error::CoordinationError;
use crate::domain::models::{BatchManifest, EndSummary, JobId};

/// Configuration for the coordination endpoint.
#[derive(Debug, Clone)]
pub struct CoordinationServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on; 0 picks a random free port.
    pub port: u16,
}

impl Default for CoordinationServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
        }
    }
}

/// Form body of an image submission.
#[derive(Debug, Deserialize)]
pub struct SubmitImageRequest {
    /// Base64-encoded image bytes.
    pub image: String,
}

/// Response to a successful image submission.
#[derive(Debug, Serialize)]
pub struct SubmitImageResponse {
    /// Path the image was written to.
    pub output: String,
}

/// Form body of an error report.
#[derive(Debug, Deserialize)]
pub struct ReportErrorRequest {
    /// Job the error is reported against.
    pub id: JobId,
    /// Error message.
    pub error: String,
    /// True when the host has abandoned the job.
    #[serde(default)]
    pub fatal: bool,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable message.
    pub error: String,
    /// Stable machine-readable code.
    pub code: String,
}

/// Shared state for the coordination endpoint.
struct AppState {
    scheduler: Arc<BatchScheduler>,
    manifest: BatchManifest,
    strip_animation: bool,
    end_signal: Arc<Notify>,
}

/// Coordination endpoint server, not yet bound.
pub struct CoordinationServer {
    config: CoordinationServerConfig,
    scheduler: Arc<BatchScheduler>,
    manifest: BatchManifest,
    strip_animation: bool,
    end_signal: Arc<Notify>,
}

impl CoordinationServer {
    /// Create a server over the scheduler.
    ///
    /// `end_signal` is notified when the host requests `/end` on a drained
    /// batch; the caller uses it to drive graceful shutdown.
    pub fn new(
        scheduler: Arc<BatchScheduler>,
        manifest: BatchManifest,
        config: CoordinationServerConfig,
        strip_animation: bool,
        end_signal: Arc<Notify>,
    ) -> Self {
        Self {
            config,
            scheduler,
            manifest,
            strip_animation,
            end_signal,
        }
    }

    /// Build the router.
    fn build_router(self) -> Router {
        let state = Arc::new(AppState {
            scheduler: self.scheduler,
            manifest: self.manifest,
            strip_animation: self.strip_animation,
            end_signal: self.end_signal,
        });

        Router::new()
            // Batch discovery
            .route("/", get(serve_manifest))
            // Chart input and image submission
            .route("/chart/{id}", get(fetch_chart))
            .route("/chart/{id}", post(submit_image))
            // Error reporting and batch end
            .route("/error", post(report_error))
            .route("/end", get(end_batch))
            // Health check
            .route("/health", get(health_check))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the listener so the actual address (and random port) is known
    /// before the renderer host is launched.
    pub async fn bind(
        self,
    ) -> Result<BoundCoordinationServer, Box<dyn std::error::Error + Send + Sync>> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port).parse()?;
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        info!("Coordination endpoint listening on {}", local_addr);

        Ok(BoundCoordinationServer {
            listener,
            router: self.build_router(),
            local_addr,
        })
    }
}

/// A bound coordination endpoint ready to serve.
pub struct BoundCoordinationServer {
    listener: TcpListener,
    router: Router,
    local_addr: SocketAddr,
}

impl BoundCoordinationServer {
    /// Address the listener actually bound.
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Base URL handed to the renderer host, trailing slash included.
    pub fn url(&self) -> String {
        format!("http://{}/", self.local_addr)
    }

    /// Serve until the shutdown future resolves; in-flight responses
    /// (the `/end` reply in particular) complete first.
    pub async fn serve_with_shutdown<F>(
        self,
        shutdown: F,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

// Handler functions

async fn health_check() -> &'static str {
    "OK"
}

async fn serve_manifest(State(state): State<Arc<AppState>>) -> Json<BatchManifest> {
    Json(state.manifest.clone())
}

async fn fetch_chart(
    State(state): State<Arc<AppState>>,
    Path(id): Path<JobId>,
) -> Result<Vec<u8>, (StatusCode, Json<ErrorResponse>)> {
    let input = state
        .scheduler
        .input_fetched(id)
        .await
        .map_err(|e| error_response(&e))?;

    let bytes = tokio::fs::read(&input).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Failed to read {}: {}", input.display(), e),
                code: "READ_ERROR".to_string(),
            }),
        )
    })?;

    if state.strip_animation {
        Ok(strip_animation(&bytes))
    } else {
        Ok(bytes)
    }
}

async fn submit_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<JobId>,
    Form(req): Form<SubmitImageRequest>,
) -> Result<Json<SubmitImageResponse>, (StatusCode, Json<ErrorResponse>)> {
    // Hosts may wrap base64 output in whitespace or newlines.
    let compact: String = req.image.split_whitespace().collect();
    let image = STANDARD.decode(compact.as_bytes()).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("Image payload is not valid base64: {e}"),
                code: "INVALID_IMAGE".to_string(),
            }),
        )
    })?;

    let output = state
        .scheduler
        .complete_job(id, &image)
        .await
        .map_err(|e| error_response(&e))?;

    Ok(Json(SubmitImageResponse {
        output: output.display().to_string(),
    }))
}

async fn report_error(
    State(state): State<Arc<AppState>>,
    Form(req): Form<ReportErrorRequest>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    state
        .scheduler
        .report_error(req.id, &req.error, req.fatal)
        .await
        .map_err(|e| error_response(&e))?;
    Ok(StatusCode::OK)
}

async fn end_batch(
    State(state): State<Arc<AppState>>,
) -> Result<Json<EndSummary>, (StatusCode, Json<ErrorResponse>)> {
    if !state.scheduler.all_terminal().await {
        return Err((
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "Batch still has unfinished jobs".to_string(),
                code: "BATCH_ACTIVE".to_string(),
            }),
        ));
    }

    let summary = EndSummary {
        exit_status: state.scheduler.exit_status().await,
        error_events: state.scheduler.ledger().count().await,
    };
    info!(exit_status = summary.exit_status, "end of batch requested");
    state.end_signal.notify_one();
    Ok(Json(summary))
}

/// Map a coordination error onto the protocol's status codes.
fn error_response(err: &CoordinationError) -> (StatusCode, Json<ErrorResponse>) {
    let (status, code) = match err {
        CoordinationError::UnknownJob(_) => (StatusCode::NOT_FOUND, "UNKNOWN_JOB"),
        CoordinationError::InvalidTransition { .. } => {
            (StatusCode::CONFLICT, "INVALID_TRANSITION")
        }
        CoordinationError::SubmitFailed { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "SUBMIT_FAILED")
        }
        CoordinationError::HostUnreachable(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "HOST_UNREACHABLE")
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            code: code.to_string(),
        }),
    )
}
