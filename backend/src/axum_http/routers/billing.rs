use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::QueryRejection},
    response::{IntoResponse, Response},
    routing::{get, patch},
};
use crates::domain::value_objects::{
    plans::{PlanDto, PlanUpdateModel},
    quota::{LimitsQuery, QuotaCheckQuery},
    subscriptions::PriceQuery,
};
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{AdminUser, AuthUser},
    axum_http::{app_state::BillingState, error_responses::bad_request},
};

pub fn routes(state: BillingState) -> Router {
    Router::new()
        .route("/plans", get(list_plans))
        .route("/plans/:plan_id", patch(update_plan))
        .route("/price", get(calculate_price))
        .route("/limits", get(check_plan_limits))
        .route("/limits/check", get(check_quota))
        .with_state(state)
}

pub async fn list_plans(State(state): State<BillingState>) -> Response {
    match state.plan_catalog.list_plans().await {
        Ok(plans) => {
            let plans: Vec<PlanDto> = plans.into_iter().map(PlanDto::from).collect();
            Json(plans).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub async fn update_plan(
    State(state): State<BillingState>,
    AdminUser(admin): AdminUser,
    Path(plan_id): Path<Uuid>,
    Json(update_model): Json<PlanUpdateModel>,
) -> Response {
    info!(admin_id = %admin.user_id, %plan_id, "billing router: plan update requested");
    match state.plan_catalog.update_plan(plan_id, update_model).await {
        Ok(plan) => Json(PlanDto::from(plan)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn calculate_price(
    State(state): State<BillingState>,
    query: Result<Query<PriceQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return bad_request(rejection.body_text()),
    };

    match state
        .subscriptions
        .calculate_price(&query.plan_type, query.guest_count)
        .await
    {
        Ok(pricing) => Json(pricing).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn check_plan_limits(
    State(state): State<BillingState>,
    auth: AuthUser,
    Query(query): Query<LimitsQuery>,
) -> Response {
    match state
        .quota
        .check_plan_limits(auth.user_id, query.event_id)
        .await
    {
        Ok(report) => Json(report).into_response(),
        Err(err) => err.into_response(),
    }
}

/// 200 with the decision when allowed, 403 `QUOTA_EXCEEDED` otherwise.
pub async fn check_quota(
    State(state): State<BillingState>,
    auth: AuthUser,
    query: Result<Query<QuotaCheckQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return bad_request(rejection.body_text()),
    };

    match state
        .quota
        .ensure_can_add(auth.user_id, query.event_id, query.resource)
        .await
    {
        Ok(decision) => Json(decision).into_response(),
        Err(err) => err.into_response(),
    }
}
