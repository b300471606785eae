use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::{
        payment_methods::PaymentMethod, subscription_statuses::SubscriptionStatus,
    },
    infra::db::postgres::schema::subscriptions,
};

/// A purchased or pending grant of a plan to an owner, optionally scoped to one
/// event. Prices are snapshotted at creation so catalog edits never reprice it.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionEntity {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub event_id: Option<Uuid>,
    pub plan_id: Uuid,
    pub plan_type: String,
    pub base_price_minor: i64,
    pub guest_count: i32,
    pub included_guests: i32,
    pub guest_price_per_unit_minor: i64,
    pub total_price_minor: i64,
    pub amount_paid_minor: i64,
    pub duration_days: i32,
    pub payment_status: SubscriptionStatus,
    pub payment_method: Option<PaymentMethod>,
    pub payment_reference: Option<String>,
    pub paid_by_payment_id: Option<Uuid>,
    pub renewal_of: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionEntity {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Paid and not expired. Recomputed on every read that gates access.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.payment_status == SubscriptionStatus::Paid && !self.is_expired(now)
    }

    /// Amount still to be collected (initial purchase or upgrade top-up).
    pub fn outstanding_minor(&self) -> i64 {
        (self.total_price_minor - self.amount_paid_minor).max(0)
    }
}

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = subscriptions)]
pub struct SubscriptionRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub event_id: Option<Uuid>,
    pub plan_id: Uuid,
    pub plan_type: String,
    pub base_price_minor: i64,
    pub guest_count: i32,
    pub included_guests: i32,
    pub guest_price_per_unit_minor: i64,
    pub total_price_minor: i64,
    pub amount_paid_minor: i64,
    pub duration_days: i32,
    pub payment_status: String,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    pub paid_by_payment_id: Option<Uuid>,
    pub renewal_of: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for SubscriptionEntity {
    type Error = anyhow::Error;

    fn try_from(value: SubscriptionRow) -> Result<Self> {
        let payment_status = SubscriptionStatus::from_str(&value.payment_status).ok_or_else(|| {
            anyhow!(
                "subscription {} has unknown payment_status {}",
                value.id,
                value.payment_status
            )
        })?;
        let payment_method = value
            .payment_method
            .as_deref()
            .map(|raw| {
                PaymentMethod::from_str(raw).ok_or_else(|| {
                    anyhow!("subscription {} has unknown payment_method {}", value.id, raw)
                })
            })
            .transpose()?;

        Ok(Self {
            id: value.id,
            owner_id: value.owner_id,
            event_id: value.event_id,
            plan_id: value.plan_id,
            plan_type: value.plan_type,
            base_price_minor: value.base_price_minor,
            guest_count: value.guest_count,
            included_guests: value.included_guests,
            guest_price_per_unit_minor: value.guest_price_per_unit_minor,
            total_price_minor: value.total_price_minor,
            amount_paid_minor: value.amount_paid_minor,
            duration_days: value.duration_days,
            payment_status,
            payment_method,
            payment_reference: value.payment_reference,
            paid_by_payment_id: value.paid_by_payment_id,
            renewal_of: value.renewal_of,
            expires_at: value.expires_at,
            cancelled_at: value.cancelled_at,
            cancel_reason: value.cancel_reason,
            version: value.version,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = subscriptions)]
pub struct InsertSubscriptionEntity {
    pub owner_id: Uuid,
    pub event_id: Option<Uuid>,
    pub plan_id: Uuid,
    pub plan_type: String,
    pub base_price_minor: i64,
    pub guest_count: i32,
    pub included_guests: i32,
    pub guest_price_per_unit_minor: i64,
    pub total_price_minor: i64,
    pub amount_paid_minor: i64,
    pub duration_days: i32,
    pub payment_status: String,
    pub renewal_of: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Full-row update applied under an optimistic version check.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = subscriptions, treat_none_as_null = true)]
pub struct SubscriptionChangeset {
    pub plan_id: Uuid,
    pub plan_type: String,
    pub base_price_minor: i64,
    pub guest_count: i32,
    pub included_guests: i32,
    pub guest_price_per_unit_minor: i64,
    pub total_price_minor: i64,
    pub amount_paid_minor: i64,
    pub duration_days: i32,
    pub payment_status: String,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    pub paid_by_payment_id: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub version: i32,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionChangeset {
    pub fn next_version(subscription: &SubscriptionEntity, updated_at: DateTime<Utc>) -> Self {
        Self {
            plan_id: subscription.plan_id,
            plan_type: subscription.plan_type.clone(),
            base_price_minor: subscription.base_price_minor,
            guest_count: subscription.guest_count,
            included_guests: subscription.included_guests,
            guest_price_per_unit_minor: subscription.guest_price_per_unit_minor,
            total_price_minor: subscription.total_price_minor,
            amount_paid_minor: subscription.amount_paid_minor,
            duration_days: subscription.duration_days,
            payment_status: subscription.payment_status.to_string(),
            payment_method: subscription.payment_method.map(|m| m.to_string()),
            payment_reference: subscription.payment_reference.clone(),
            paid_by_payment_id: subscription.paid_by_payment_id,
            expires_at: subscription.expires_at,
            cancelled_at: subscription.cancelled_at,
            cancel_reason: subscription.cancel_reason.clone(),
            version: subscription.version + 1,
            updated_at,
        }
    }
}
