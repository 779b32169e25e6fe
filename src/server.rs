use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    config::{AppConfig, InputLayout},
    error::ServiceError,
    model::{ModelMetadata, ModelRegistry},
    prediction::PredictionResult,
    preprocess::INPUT_SIZE,
};

pub const SERVICE_MESSAGE: &str = "SAUS Campus Scene Classification API";

const FILE_FIELD: &str = "file";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub registry: ModelRegistry,
}

#[derive(Debug, Serialize)]
struct HomeResponse {
    message: &'static str,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    model_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct MetadataResponse {
    labels: Vec<String>,
    input_size: [u32; 2],
    input_layout: InputLayout,
    model: Option<ModelMetadata>,
    last_load_error: Option<String>,
}

pub fn build_router(config: Arc<AppConfig>, registry: ModelRegistry) -> Router {
    let body_limit = config.max_upload_bytes;
    let state = AppState { config, registry };

    Router::new()
        .route("/", get(home))
        .route("/predict", post(predict))
        .route("/health", get(health))
        .route("/metadata", get(metadata))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn home() -> Json<HomeResponse> {
    Json(HomeResponse {
        message: SERVICE_MESSAGE,
        status: "running",
    })
}

async fn predict(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResult>, ServiceError> {
    // A body that is not multipart at all carries no file.
    let multipart =
        multipart.map_err(|_| ServiceError::MissingInput("No file uploaded".into()))?;
    let (file_name, image) = read_upload(multipart, state.config.max_upload_bytes).await?;

    info!(file = %file_name, bytes = image.len(), "classifying upload");

    let result = state
        .registry
        .classify(image, state.config.class_labels.clone())
        .await?;
    Ok(Json(result))
}

/// Pulls the first `file` part that has a filename out of the form.
async fn read_upload(
    mut multipart: Multipart,
    limit: usize,
) -> Result<(String, Vec<u8>), ServiceError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| upload_error(e, limit))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        // Parts without a filename are plain form values, not uploads.
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        if file_name.is_empty() {
            return Err(ServiceError::MissingInput("No file selected".into()));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| upload_error(e, limit))?;
        if bytes.is_empty() {
            return Err(ServiceError::MissingInput("Uploaded file is empty".into()));
        }
        return Ok((file_name, bytes.to_vec()));
    }

    Err(ServiceError::MissingInput("No file uploaded".into()))
}

fn upload_error(err: MultipartError, limit: usize) -> ServiceError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServiceError::PayloadTooLarge(limit)
    } else {
        ServiceError::BadRequest(err.body_text())
    }
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.registry.load().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                model_loaded: true,
                error: None,
            }),
        ),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(HealthResponse {
                status: "unhealthy",
                model_loaded: false,
                error: Some(err.to_string()),
            }),
        ),
    }
}

async fn metadata(State(state): State<AppState>) -> Json<MetadataResponse> {
    Json(MetadataResponse {
        labels: state.config.class_labels.to_vec(),
        input_size: [INPUT_SIZE, INPUT_SIZE],
        input_layout: state.config.input_layout,
        model: state.registry.metadata(),
        last_load_error: state.registry.last_error(),
    })
}
