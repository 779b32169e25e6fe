use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),
    #[error("{0}")]
    MissingInput(String),
    #[error("invalid request: {0}")]
    BadRequest(String),
    #[error("upload exceeds the {0} byte limit")]
    PayloadTooLarge(usize),
    #[error("Prediction failed: cannot decode image: {0}")]
    Decode(String),
    #[error("Prediction failed: {0}")]
    Inference(String),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::MissingInput(_) | ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServiceError::ModelLoad(_)
            | ServiceError::Decode(_)
            | ServiceError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(%status, error = %message, "request failed");
        } else {
            tracing::warn!(%status, error = %message, "request rejected");
        }

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
