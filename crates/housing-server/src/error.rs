use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use housing_shared::ValidationError;
use housing_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Registration is closed")]
    RegistrationClosed,

    #[error("Too many requests, try again later")]
    RateLimited,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            ServerError::RegistrationClosed => {
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
            ServerError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            ServerError::Store(StoreError::DuplicateNationalId(_)) => {
                (StatusCode::CONFLICT, self.to_string())
            }
            ServerError::Store(e) => {
                tracing::error!(error = %e, "store operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Storage unavailable, nothing was changed".to_string(),
                )
            }
        };

        let mut body = serde_json::json!({
            "error": message,
        });
        if let ServerError::Validation(err) = &self {
            body["issues"] = serde_json::json!(err.issues);
        }

        (status, axum::Json(body)).into_response()
    }
}
