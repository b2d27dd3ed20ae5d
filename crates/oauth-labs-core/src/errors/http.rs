// ABOUTME: axum response conversions for AppError and OAuthError
// ABOUTME: OAuth errors render as 400 JSON bodies; infrastructure errors hide their details

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;

use super::{AppError, ErrorResponse, OAuthError};

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(self)).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}
