use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use crates::domain::{
    entities::subscriptions::SubscriptionEntity,
    value_objects::{
        payments::{InitiatePaymentRequest, InitiatePaymentResponse, PaymentDto},
        subscriptions::{
            CancelSubscriptionRequest, CreateSubscriptionRequest, SubscriptionDto,
            UpgradeSubscriptionRequest,
        },
    },
};
use uuid::Uuid;

use crate::{auth::AuthUser, axum_http::app_state::BillingState};

pub fn routes(state: BillingState) -> Router {
    Router::new()
        .route(
            "/subscriptions",
            get(list_subscriptions).post(create_subscription),
        )
        .route("/subscriptions/:subscription_id", get(get_subscription))
        .route(
            "/subscriptions/:subscription_id/upgrade",
            post(upgrade_subscription),
        )
        .route(
            "/subscriptions/:subscription_id/renew",
            post(renew_subscription),
        )
        .route(
            "/subscriptions/:subscription_id/cancel",
            post(cancel_subscription),
        )
        .route(
            "/subscriptions/:subscription_id/payments",
            get(list_payments).post(initiate_payment),
        )
        .with_state(state)
}

fn subscription_response(
    status: StatusCode,
    subscription: SubscriptionEntity,
) -> Response {
    (
        status,
        Json(SubscriptionDto::from_entity(subscription, Utc::now())),
    )
        .into_response()
}

pub async fn list_subscriptions(State(state): State<BillingState>, auth: AuthUser) -> Response {
    match state.subscriptions.list_subscriptions(auth.user_id).await {
        Ok(subscriptions) => {
            let now = Utc::now();
            let subscriptions: Vec<SubscriptionDto> = subscriptions
                .into_iter()
                .map(|subscription| SubscriptionDto::from_entity(subscription, now))
                .collect();
            Json(subscriptions).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub async fn create_subscription(
    State(state): State<BillingState>,
    auth: AuthUser,
    Json(request): Json<CreateSubscriptionRequest>,
) -> Response {
    match state
        .subscriptions
        .create_subscription(auth.user_id, request)
        .await
    {
        Ok(subscription) => subscription_response(StatusCode::CREATED, subscription),
        Err(err) => err.into_response(),
    }
}

pub async fn get_subscription(
    State(state): State<BillingState>,
    auth: AuthUser,
    Path(subscription_id): Path<Uuid>,
) -> Response {
    match state
        .subscriptions
        .get_subscription(auth.user_id, subscription_id)
        .await
    {
        Ok(subscription) => subscription_response(StatusCode::OK, subscription),
        Err(err) => err.into_response(),
    }
}

pub async fn upgrade_subscription(
    State(state): State<BillingState>,
    auth: AuthUser,
    Path(subscription_id): Path<Uuid>,
    Json(request): Json<UpgradeSubscriptionRequest>,
) -> Response {
    match state
        .subscriptions
        .upgrade_subscription(auth.user_id, subscription_id, request)
        .await
    {
        Ok(subscription) => subscription_response(StatusCode::OK, subscription),
        Err(err) => err.into_response(),
    }
}

pub async fn renew_subscription(
    State(state): State<BillingState>,
    auth: AuthUser,
    Path(subscription_id): Path<Uuid>,
) -> Response {
    match state
        .subscriptions
        .renew_subscription(auth.user_id, subscription_id)
        .await
    {
        Ok(subscription) => subscription_response(StatusCode::CREATED, subscription),
        Err(err) => err.into_response(),
    }
}

pub async fn cancel_subscription(
    State(state): State<BillingState>,
    auth: AuthUser,
    Path(subscription_id): Path<Uuid>,
    request: Option<Json<CancelSubscriptionRequest>>,
) -> Response {
    let reason = request.and_then(|Json(request)| request.reason);
    match state
        .subscriptions
        .cancel_subscription(auth.user_id, subscription_id, reason)
        .await
    {
        Ok(subscription) => subscription_response(StatusCode::OK, subscription),
        Err(err) => err.into_response(),
    }
}

pub async fn initiate_payment(
    State(state): State<BillingState>,
    auth: AuthUser,
    Path(subscription_id): Path<Uuid>,
    Json(request): Json<InitiatePaymentRequest>,
) -> Response {
    match state
        .payments
        .initiate_payment(
            auth.user_id,
            subscription_id,
            &request.phone_number,
            &request.external_reference,
        )
        .await
    {
        Ok(initiated) => {
            let status = if initiated.replayed {
                StatusCode::OK
            } else {
                StatusCode::ACCEPTED
            };
            let body = InitiatePaymentResponse {
                payment: PaymentDto::from(initiated.payment),
                reference: initiated.reference,
                replayed: initiated.replayed,
            };
            (status, Json(body)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub async fn list_payments(
    State(state): State<BillingState>,
    auth: AuthUser,
    Path(subscription_id): Path<Uuid>,
) -> Response {
    match state
        .payments
        .list_payments(auth.user_id, subscription_id)
        .await
    {
        Ok(payments) => {
            let payments: Vec<PaymentDto> = payments.into_iter().map(PaymentDto::from).collect();
            Json(payments).into_response()
        }
        Err(err) => err.into_response(),
    }
}
