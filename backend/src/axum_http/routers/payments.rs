use axum::{
    Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use crates::domain::value_objects::payments::{
    InitiatePaymentResponse, PaymentDto, PaymentStatusResponse, RefundPaymentRequest,
    RetryPaymentRequest,
};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{AdminUser, AuthUser},
    axum_http::app_state::BillingState,
};

pub const CALLBACK_SIGNATURE_HEADER: &str = "x-callback-signature";

pub fn routes(state: BillingState) -> Router {
    Router::new()
        .route("/payments/:payment_id", get(poll_payment_status))
        .route("/payments/:payment_id/retry", post(retry_payment))
        .route("/payments/:payment_id/refund", post(refund_payment))
        .route("/callbacks/:provider", post(provider_callback))
        .with_state(state)
}

pub async fn poll_payment_status(
    State(state): State<BillingState>,
    auth: AuthUser,
    Path(payment_id): Path<Uuid>,
) -> Response {
    match state
        .payments
        .poll_payment_status(auth.user_id, payment_id)
        .await
    {
        Ok(info) => Json(PaymentStatusResponse {
            payment: PaymentDto::from(info.payment),
            subscription_status: info.subscription_status,
            provider_status: info.provider_status,
            outcome: info.outcome,
        })
        .into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn retry_payment(
    State(state): State<BillingState>,
    auth: AuthUser,
    Path(payment_id): Path<Uuid>,
    Json(request): Json<RetryPaymentRequest>,
) -> Response {
    match state
        .payments
        .retry_payment(
            auth.user_id,
            payment_id,
            &request.phone_number,
            request.external_reference,
        )
        .await
    {
        Ok(initiated) => Json(InitiatePaymentResponse {
            payment: PaymentDto::from(initiated.payment),
            reference: initiated.reference,
            replayed: initiated.replayed,
        })
        .into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn refund_payment(
    State(state): State<BillingState>,
    AdminUser(admin): AdminUser,
    Path(payment_id): Path<Uuid>,
    request: Option<Json<RefundPaymentRequest>>,
) -> Response {
    let reason = request.and_then(|Json(request)| request.reason);
    match state
        .payments
        .refund_payment(admin.user_id, payment_id, reason)
        .await
    {
        Ok(payment) => Json(PaymentDto::from(payment)).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Unauthenticated: trust comes from the provider signature over the raw body.
pub async fn provider_callback(
    State(state): State<BillingState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(CALLBACK_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    info!(
        provider = %provider,
        body_len = body.len(),
        signed = signature.is_some(),
        "payments router: provider callback received"
    );

    match state
        .payments
        .handle_provider_callback(&provider, &body, signature)
        .await
    {
        Ok(outcome) => Json(json!({ "outcome": outcome })).into_response(),
        Err(err) => err.into_response(),
    }
}
