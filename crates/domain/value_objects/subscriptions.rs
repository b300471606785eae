use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::subscriptions::SubscriptionEntity,
    value_objects::enums::{
        payment_methods::PaymentMethod, subscription_statuses::SubscriptionStatus,
    },
};

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionDto {
    pub id: Uuid,
    pub event_id: Option<Uuid>,
    pub plan_type: String,
    pub base_price_minor: i64,
    pub guest_count: i32,
    pub guest_price_per_unit_minor: i64,
    pub total_price_minor: i64,
    pub amount_paid_minor: i64,
    pub outstanding_minor: i64,
    pub payment_status: SubscriptionStatus,
    pub payment_method: Option<PaymentMethod>,
    pub payment_reference: Option<String>,
    pub renewal_of: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl SubscriptionDto {
    pub fn from_entity(value: SubscriptionEntity, now: DateTime<Utc>) -> Self {
        let is_active = value.is_active(now);
        let outstanding_minor = value.outstanding_minor();

        Self {
            id: value.id,
            event_id: value.event_id,
            plan_type: value.plan_type,
            base_price_minor: value.base_price_minor,
            guest_count: value.guest_count,
            guest_price_per_unit_minor: value.guest_price_per_unit_minor,
            total_price_minor: value.total_price_minor,
            amount_paid_minor: value.amount_paid_minor,
            outstanding_minor,
            payment_status: value.payment_status,
            payment_method: value.payment_method,
            payment_reference: value.payment_reference,
            renewal_of: value.renewal_of,
            expires_at: value.expires_at,
            is_active,
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub plan_type: String,
    pub guest_count: i64,
    pub event_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpgradeSubscriptionRequest {
    pub plan_type: String,
    pub guest_count: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelSubscriptionRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PriceQuery {
    pub plan_type: String,
    pub guest_count: i64,
}
