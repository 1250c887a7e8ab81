use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Tenant not found")]
    MissingTenant,

    #[error("Tenant name contains invalid characters")]
    InvalidTenantName,

    #[error("Cannot remove the default tenant")]
    ProtectedTenant,

    #[error("Failed to persist tenant list")]
    TenantStore,

    #[error("Database error")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::MissingTenant
            | AppError::InvalidTenantName
            | AppError::ProtectedTenant => StatusCode::BAD_REQUEST,
            AppError::TenantStore => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Database(ref e) => {
                error!("Database error: {e}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
