use chrono::{Duration, Utc};
use crates::domain::{
    entities::{payments::PaymentEntity, plans::PlanEntity, subscriptions::SubscriptionEntity},
    value_objects::{
        enums::{
            payment_methods::PaymentMethod, payment_statuses::PaymentStatus,
            subscription_statuses::SubscriptionStatus,
        },
        plans::{PlanFeatures, PlanLimits},
    },
};
use serde_json::Map;
use uuid::Uuid;

pub(crate) fn plan(
    slug: &str,
    price_minor: i64,
    included_guests: i32,
    guest_unit_price_minor: i64,
) -> PlanEntity {
    PlanEntity {
        id: Uuid::new_v4(),
        name: slug.to_uppercase(),
        slug: slug.to_string(),
        price_minor,
        included_guests,
        guest_unit_price_minor,
        duration_days: 30,
        is_trial: false,
        is_one_time_use: false,
        is_active: true,
        limits: PlanLimits {
            max_guests: Some(200),
            max_collaborators: Some(5),
            max_photos: Some(-1),
            events_per_period: Some(3),
        },
        features: PlanFeatures::default(),
        sort_order: if price_minor == 0 { 0 } else { 1 },
    }
}

/// Pending subscription priced from `plan` for `guest_count` guests.
pub(crate) fn subscription(plan: &PlanEntity, owner_id: Uuid, guest_count: i32) -> SubscriptionEntity {
    let now = Utc::now() - Duration::minutes(5);
    let extra = (i64::from(guest_count) - i64::from(plan.included_guests)).max(0);
    SubscriptionEntity {
        id: Uuid::new_v4(),
        owner_id,
        event_id: None,
        plan_id: plan.id,
        plan_type: plan.slug.clone(),
        base_price_minor: plan.price_minor,
        guest_count,
        included_guests: plan.included_guests,
        guest_price_per_unit_minor: plan.guest_unit_price_minor,
        total_price_minor: plan.price_minor + extra * plan.guest_unit_price_minor,
        amount_paid_minor: 0,
        duration_days: plan.duration_days,
        payment_status: SubscriptionStatus::Pending,
        payment_method: None,
        payment_reference: None,
        paid_by_payment_id: None,
        renewal_of: None,
        expires_at: None,
        cancelled_at: None,
        cancel_reason: None,
        version: 1,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn paid(mut subscription: SubscriptionEntity, payment_id: Uuid) -> SubscriptionEntity {
    subscription.payment_status = SubscriptionStatus::Paid;
    subscription.amount_paid_minor = subscription.total_price_minor;
    subscription.paid_by_payment_id = Some(payment_id);
    subscription.payment_method = Some(PaymentMethod::MtnMomo);
    subscription.expires_at =
        Some(Utc::now() + Duration::days(i64::from(subscription.duration_days)));
    subscription
}

pub(crate) fn payment(
    subscription: &SubscriptionEntity,
    status: PaymentStatus,
    external_reference: &str,
) -> PaymentEntity {
    let now = Utc::now();
    let id = Uuid::new_v4();
    PaymentEntity {
        id,
        subscription_id: subscription.id,
        owner_id: subscription.owner_id,
        amount_minor: subscription.outstanding_minor(),
        currency: "XAF".to_string(),
        payment_method: PaymentMethod::MtnMomo,
        phone_number: "237677123456".to_string(),
        external_reference: external_reference.to_string(),
        transaction_reference: Some(id.to_string()),
        status,
        metadata: Map::new(),
        created_at: now,
        updated_at: now,
    }
}
