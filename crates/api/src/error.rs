//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::ShopError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// No usable principal on the request.
    Unauthorized(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Domain logic error.
    Shop(ShopError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Shop(err) => shop_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn shop_error_to_response(err: ShopError) -> (StatusCode, String) {
    let status = match &err {
        ShopError::ProductUnavailable { .. }
        | ShopError::ItemNotFound { .. }
        | ShopError::OrderNotFound { .. } => StatusCode::NOT_FOUND,

        ShopError::InsufficientStock { .. }
        | ShopError::EmptyOrder
        | ShopError::InvalidQuantity { .. }
        | ShopError::UnknownStatus { .. } => StatusCode::BAD_REQUEST,

        ShopError::InvalidTransition { .. }
        | ShopError::AlreadyCancelled { .. }
        | ShopError::ConcurrencyConflict { .. } => StatusCode::CONFLICT,

        ShopError::AccessDenied => StatusCode::FORBIDDEN,

        ShopError::Store(inner) => {
            tracing::error!(error = %inner, "store error");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    (status, err.to_string())
}

impl From<ShopError> for ApiError {
    fn from(err: ShopError) -> Self {
        ApiError::Shop(err)
    }
}
