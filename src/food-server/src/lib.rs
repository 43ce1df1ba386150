//! HTTP front door for the food classifier.
//!
//! Uploaded images are run through [`Classifier`] and answered with a
//! `{"result": ...}` envelope.

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use food_serve::{Classifier, Error, ErrorKind, GatewayConfig, ResultEnvelope, StructuredError};
use log::{debug, info, warn};

/// Uploads larger than this are refused unless configured otherwise.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// How failures are reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorContract {
    /// Always answer 200 with `{"result": "error ocused: ..."}`. Existing
    /// clients depend on this.
    Legacy,

    /// Answer with a status code per error kind and a
    /// `{"error": {"kind", "message"}}` body.
    Structured,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub gateway: GatewayConfig,
    pub contract: ErrorContract,
    pub max_upload_bytes: usize,
}

#[derive(Clone)]
pub struct AppState {
    pub classifier: Classifier,
    pub contract: ErrorContract,
}

impl AppState {
    pub fn new(gateway: GatewayConfig, contract: ErrorContract) -> food_serve::Result<Self> {
        Ok(AppState {
            classifier: Classifier::new(gateway)?,
            contract,
        })
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Connectivity => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Inference | ErrorKind::ContractViolation => StatusCode::BAD_GATEWAY,
        ErrorKind::Format | ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorKind::Io | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(default))
        .route("/ping/", get(ping))
        .route("/analyse/", post(food_analysis))
        .route("/analyse", post(food_analysis))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

pub async fn serve(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::new(config.gateway.clone(), config.contract)?;
    let app = router(state, config.max_upload_bytes);

    info!("Server starting on http://{}", config.bind);
    info!("Model server: {}", config.gateway.endpoint);
    info!("API endpoints:");
    info!("  GET  /          - Default");
    info!("  GET  /ping/     - Liveness check");
    info!("  POST /analyse/  - Multipart image upload (field 'file')");

    hyper::Server::bind(&config.bind)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("could not listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn default() -> StatusCode {
    StatusCode::OK
}

async fn ping() -> StatusCode {
    StatusCode::OK
}

async fn food_analysis(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let upload = match multipart {
        Ok(multipart) => read_upload(multipart).await,
        Err(rejection) => Err(Error::InvalidRequest(rejection.body_text())),
    };

    let data = match upload {
        Ok(data) => data,
        Err(err) => return reject(state.contract, err),
    };

    debug!("Received file: {} bytes", data.len());

    match state.classifier.classify_from_raw(data).await {
        Ok(percentages) => Json(ResultEnvelope::Success(percentages)).into_response(),
        Err(err) => {
            warn!("classification failed ({}): {}", err.kind(), err);
            match state.contract {
                ErrorContract::Legacy => Json(ResultEnvelope::failure(&err)).into_response(),
                ErrorContract::Structured => {
                    (status_for(err.kind()), Json(StructuredError::from(&err))).into_response()
                }
            }
        }
    }
}

/// Pull the `file` field out of the form.
async fn read_upload(mut multipart: Multipart) -> food_serve::Result<Vec<u8>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidRequest(format!("failed to read multipart field: {}", e)))?
    {
        if field.name() == Some("file") {
            let data = field
                .bytes()
                .await
                .map_err(|e| Error::InvalidRequest(format!("failed to read file data: {}", e)))?;
            return Ok(data.to_vec());
        }

        debug!("Ignoring field: {:?}", field.name());
    }

    Err(Error::InvalidRequest("missing form field 'file'".into()))
}

/// Malformed requests never reached the pipeline, so even the legacy
/// contract reports them with a client error status.
fn reject(contract: ErrorContract, err: Error) -> Response {
    warn!("rejected request: {}", err);
    match contract {
        ErrorContract::Legacy => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ResultEnvelope::failure(&err)),
        )
            .into_response(),
        ErrorContract::Structured => {
            (StatusCode::BAD_REQUEST, Json(StructuredError::from(&err))).into_response()
        }
    }
}

async fn log_request<B>(req: Request<B>, next: Next<B>) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    let response = next.run(req).await;

    info!(
        "{} {} - {} - {} ms",
        method,
        uri,
        response.status(),
        start.elapsed().as_millis()
    );

    response
}
