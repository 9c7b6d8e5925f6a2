use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Failures of the booking core. `SlotConflict` is expected and recoverable;
/// the dialog engine catches it to drive the "slot just taken" branch. The
/// rest surface to the client as a generic failure.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("slot conflict: requested interval overlaps an existing appointment")]
    SlotConflict,

    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("booking error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("messaging error: {0}")]
    Messaging(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Ledger(LedgerError::SlotConflict) => StatusCode::CONFLICT,
            AppError::Ledger(LedgerError::InvalidTransition { .. }) => StatusCode::CONFLICT,
            AppError::Ledger(LedgerError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Ledger(LedgerError::Validation(_)) => StatusCode::BAD_REQUEST,
            AppError::Ledger(LedgerError::Storage(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Messaging(_) => StatusCode::BAD_GATEWAY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
        };

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
