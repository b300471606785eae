use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::{
    entities::payments::PaymentEntity,
    value_objects::enums::{
        payment_methods::PaymentMethod, payment_statuses::PaymentStatus,
        subscription_statuses::SubscriptionStatus,
    },
};

/// Provider-reported outcome, normalized across operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProviderStatus {
    Successful,
    Failed { reason: Option<String> },
    Pending,
    /// Anything the adapter could not map. Never guessed into success or failure.
    Unknown { raw_status: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderStatusReport {
    pub status: ProviderStatus,
    pub raw: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Payment completed and the subscription is now paid.
    Completed,
    /// Payment completed but the subscription still owes a balance.
    BalanceOutstanding,
    /// Payment failed and the subscription is retryable.
    Failed,
    StillPending,
    /// Replay of an outcome that was already applied.
    AlreadyApplied,
    /// Money arrived for a subscription another payment already settled.
    Superseded,
    /// Outcome contradicts a terminal state; kept in metadata only.
    Ignored,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentDto {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub external_reference: String,
    pub transaction_reference: Option<String>,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PaymentEntity> for PaymentDto {
    fn from(value: PaymentEntity) -> Self {
        Self {
            id: value.id,
            subscription_id: value.subscription_id,
            amount_minor: value.amount_minor,
            currency: value.currency,
            payment_method: value.payment_method,
            external_reference: value.external_reference,
            transaction_reference: value.transaction_reference,
            status: value.status,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InitiatePaymentResponse {
    pub payment: PaymentDto,
    pub reference: Option<String>,
    pub replayed: bool,
}

#[derive(Debug, Serialize)]
pub struct PaymentStatusResponse {
    pub payment: PaymentDto,
    pub subscription_status: SubscriptionStatus,
    pub provider_status: Option<ProviderStatus>,
    pub outcome: Option<ReconcileOutcome>,
}

#[derive(Debug, Deserialize)]
pub struct InitiatePaymentRequest {
    pub phone_number: String,
    pub external_reference: String,
}

#[derive(Debug, Deserialize)]
pub struct RetryPaymentRequest {
    pub phone_number: String,
    pub external_reference: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefundPaymentRequest {
    pub reason: Option<String>,
}
