use axum::http::StatusCode;
use crates::{
    domain::value_objects::{
        enums::{
            payment_statuses::PaymentStatus, resource_kinds::ResourceKind,
            subscription_statuses::SubscriptionStatus,
        },
        pricing::PricingError,
    },
    payments::gateway::GatewayError,
};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("plan not found: {0}")]
    PlanNotFound(String),
    #[error("subscription not found")]
    SubscriptionNotFound,
    #[error("payment not found")]
    PaymentNotFound,
    #[error("an active subscription already exists for this scope")]
    DuplicateActiveSubscription,
    #[error("unsupported payment provider: {0}")]
    UnsupportedProvider(String),
    #[error("payment provider error: {message}")]
    ProviderError { message: String, raw: Value },
    #[error("subscription in status {0} cannot be cancelled")]
    NotCancellable(SubscriptionStatus),
    #[error("payment in status {0} cannot be refunded")]
    NotRefundable(PaymentStatus),
    #[error("payment in status {0} cannot be retried")]
    NotRetryable(PaymentStatus),
    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),
    #[error("subscription was modified concurrently, reload and try again")]
    StaleWrite,
    #[error("quota exceeded for {resource}: {current} of {limit} used")]
    QuotaExceeded {
        resource: ResourceKind,
        limit: i64,
        current: i64,
    },
    #[error("invalid callback signature")]
    InvalidSignature,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl BillingError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            BillingError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            BillingError::PlanNotFound(_)
            | BillingError::SubscriptionNotFound
            | BillingError::PaymentNotFound => StatusCode::NOT_FOUND,
            BillingError::DuplicateActiveSubscription
            | BillingError::NotCancellable(_)
            | BillingError::NotRefundable(_)
            | BillingError::NotRetryable(_)
            | BillingError::InvalidStateTransition(_)
            | BillingError::StaleWrite => StatusCode::CONFLICT,
            BillingError::UnsupportedProvider(_) => StatusCode::UNPROCESSABLE_ENTITY,
            BillingError::ProviderError { .. } => StatusCode::BAD_GATEWAY,
            BillingError::QuotaExceeded { .. } => StatusCode::FORBIDDEN,
            BillingError::InvalidSignature => StatusCode::UNAUTHORIZED,
            BillingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            BillingError::InvalidInput(_) => "INVALID_INPUT",
            BillingError::PlanNotFound(_) => "PLAN_NOT_FOUND",
            BillingError::SubscriptionNotFound => "SUBSCRIPTION_NOT_FOUND",
            BillingError::PaymentNotFound => "PAYMENT_NOT_FOUND",
            BillingError::DuplicateActiveSubscription => "DUPLICATE_ACTIVE_SUBSCRIPTION",
            BillingError::UnsupportedProvider(_) => "UNSUPPORTED_PROVIDER",
            BillingError::ProviderError { .. } => "PROVIDER_ERROR",
            BillingError::NotCancellable(_) => "NOT_CANCELLABLE",
            BillingError::NotRefundable(_) => "NOT_REFUNDABLE",
            BillingError::NotRetryable(_) => "NOT_RETRYABLE",
            BillingError::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            BillingError::StaleWrite => "STALE_WRITE",
            BillingError::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            BillingError::InvalidSignature => "INVALID_SIGNATURE",
            BillingError::Internal(_) => "INTERNAL",
        }
    }
}

impl From<PricingError> for BillingError {
    fn from(err: PricingError) -> Self {
        BillingError::InvalidInput(err.to_string())
    }
}

impl From<GatewayError> for BillingError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::InvalidSignature => BillingError::InvalidSignature,
            GatewayError::MalformedPayload(message) => BillingError::InvalidInput(message),
            other => BillingError::ProviderError {
                message: other.to_string(),
                raw: other.raw_payload(),
            },
        }
    }
}

pub type BillingResult<T> = std::result::Result<T, BillingError>;
