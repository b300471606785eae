use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{error, warn};

use crate::usecases::errors::BillingError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub error: String,
    pub message: String,
}

impl IntoResponse for BillingError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            BillingError::Internal(err) => {
                error!(error = ?err, "http: internal error");
                // Don't leak internal error detail to client
                "Internal server error".to_string()
            }
            BillingError::ProviderError { message, raw } => {
                warn!(provider_payload = %raw, "http: payment provider error");
                format!("payment provider error: {message}")
            }
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            code: self.code(),
            error: status
                .canonical_reason()
                .unwrap_or("Unknown Error")
                .to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Rejection body for malformed path or query parameters, same shape as `BillingError`.
pub fn bad_request(message: impl Into<String>) -> Response {
    let body = Json(ErrorResponse {
        code: "INVALID_INPUT",
        error: "Bad Request".to_string(),
        message: message.into(),
    });
    (StatusCode::BAD_REQUEST, body).into_response()
}
