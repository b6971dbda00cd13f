pub mod simulate;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::engine::DispatchError;

// ─── Unified error type ──────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl IntoResponse for AppError {
    /// Every failure surfaces as a plain-text 500 carrying the error text.
    fn into_response(self) -> Response {
        let message = self.to_string();
        tracing::error!("request failed: {message}");
        (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
    }
}
