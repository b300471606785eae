use chrono::{DateTime, Duration, Utc};
use crates::domain::{
    entities::{
        plans::PlanEntity,
        subscriptions::{InsertSubscriptionEntity, SubscriptionEntity},
    },
    repositories::subscriptions::SubscriptionRepository,
    value_objects::{
        enums::subscription_statuses::SubscriptionStatus,
        pricing::{PricingResult, calculate_price},
        subscriptions::{CreateSubscriptionRequest, UpgradeSubscriptionRequest},
    },
};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{
    errors::{BillingError, BillingResult},
    plan_catalog::PlanCatalog,
};

pub struct SubscriptionUseCase {
    plan_catalog: Arc<PlanCatalog>,
    subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
}

impl SubscriptionUseCase {
    pub fn new(
        plan_catalog: Arc<PlanCatalog>,
        subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
    ) -> Self {
        Self {
            plan_catalog,
            subscription_repo,
        }
    }

    pub async fn calculate_price(
        &self,
        plan_type: &str,
        guest_count: i64,
    ) -> BillingResult<PricingResult> {
        let plan = self.plan_catalog.find_active(plan_type).await?;
        Ok(calculate_price(&plan, guest_count)?)
    }

    pub async fn create_subscription(
        &self,
        owner_id: Uuid,
        request: CreateSubscriptionRequest,
    ) -> BillingResult<SubscriptionEntity> {
        let now = Utc::now();
        let plan = self.plan_catalog.find_active(&request.plan_type).await?;
        let pricing = calculate_price(&plan, request.guest_count)?;
        let guest_count = guest_count_column(request.guest_count)?;

        if plan.is_one_time_use {
            let used = self
                .subscription_repo
                .count_by_owner_and_plan(owner_id, plan.id)
                .await
                .map_err(|err| internal(owner_id, err, "subscriptions: failed to count plan usage"))?;
            if used > 0 {
                info!(%owner_id, plan_type = %plan.slug, "subscriptions: one-time plan already used");
                return Err(BillingError::InvalidInput(format!(
                    "plan {} can only be used once per account",
                    plan.slug
                )));
            }
        }

        if let Some(existing) = self
            .subscription_repo
            .find_active_for_scope(owner_id, request.event_id, now)
            .await
            .map_err(|err| internal(owner_id, err, "subscriptions: failed to load active subscription"))?
        {
            let existing_is_trial = self
                .plan_catalog
                .find_by_id(existing.plan_id)
                .await?
                .is_some_and(|existing_plan| existing_plan.is_trial);
            if !existing_is_trial {
                info!(
                    %owner_id,
                    event_id = ?request.event_id,
                    existing_subscription_id = %existing.id,
                    "subscriptions: active subscription already exists for scope"
                );
                return Err(BillingError::DuplicateActiveSubscription);
            }
        }

        // Nothing to collect: a free plan is live as soon as it is created.
        let (payment_status, expires_at) = if pricing.total_price == 0 {
            (SubscriptionStatus::Paid, expiry_from(now, plan.duration_days))
        } else {
            (SubscriptionStatus::Pending, None)
        };

        let subscription = self
            .subscription_repo
            .insert(insert_entity(
                owner_id,
                request.event_id,
                &plan,
                &pricing,
                guest_count,
                payment_status,
                None,
                expires_at,
            ))
            .await
            .map_err(|err| internal(owner_id, err, "subscriptions: failed to insert subscription"))?;

        info!(
            %owner_id,
            subscription_id = %subscription.id,
            plan_type = %subscription.plan_type,
            total_price_minor = subscription.total_price_minor,
            payment_status = %subscription.payment_status,
            "subscriptions: subscription created"
        );
        Ok(subscription)
    }

    pub async fn get_subscription(
        &self,
        owner_id: Uuid,
        subscription_id: Uuid,
    ) -> BillingResult<SubscriptionEntity> {
        let subscription = self
            .subscription_repo
            .find_by_id(subscription_id)
            .await
            .map_err(|err| internal(owner_id, err, "subscriptions: failed to load subscription"))?;

        match subscription {
            Some(subscription) if subscription.owner_id == owner_id => Ok(subscription),
            _ => Err(BillingError::SubscriptionNotFound),
        }
    }

    pub async fn list_subscriptions(&self, owner_id: Uuid) -> BillingResult<Vec<SubscriptionEntity>> {
        self.subscription_repo
            .list_by_owner(owner_id)
            .await
            .map_err(|err| internal(owner_id, err, "subscriptions: failed to list subscriptions"))
    }

    pub async fn upgrade_subscription(
        &self,
        owner_id: Uuid,
        subscription_id: Uuid,
        request: UpgradeSubscriptionRequest,
    ) -> BillingResult<SubscriptionEntity> {
        let current = self.get_subscription(owner_id, subscription_id).await?;
        if current.payment_status.is_closed() {
            return Err(BillingError::InvalidStateTransition(format!(
                "cannot upgrade a {} subscription",
                current.payment_status
            )));
        }

        let plan = self.plan_catalog.find_active(&request.plan_type).await?;
        let pricing = calculate_price(&plan, request.guest_count)?;

        let mut upgraded = current.clone();
        upgraded.plan_id = plan.id;
        upgraded.plan_type = plan.slug.clone();
        upgraded.base_price_minor = pricing.base_price;
        upgraded.guest_count = guest_count_column(request.guest_count)?;
        upgraded.included_guests = plan.included_guests;
        upgraded.guest_price_per_unit_minor = pricing.guest_unit_price;
        upgraded.total_price_minor = pricing.total_price;
        upgraded.duration_days = plan.duration_days;

        // Downgrades and same-price changes keep the status; no refund is issued.
        if pricing.total_price > current.amount_paid_minor {
            upgraded.payment_status = SubscriptionStatus::Pending;
        }

        let saved = self.save(upgraded).await?;
        info!(
            %owner_id,
            subscription_id = %saved.id,
            plan_type = %saved.plan_type,
            outstanding_minor = saved.outstanding_minor(),
            payment_status = %saved.payment_status,
            "subscriptions: subscription upgraded"
        );
        Ok(saved)
    }

    /// Opens a new pending period priced from today's catalog. The current row is
    /// left untouched; the new window starts where the old one ends once paid.
    pub async fn renew_subscription(
        &self,
        owner_id: Uuid,
        subscription_id: Uuid,
    ) -> BillingResult<SubscriptionEntity> {
        let current = self.get_subscription(owner_id, subscription_id).await?;
        if current.payment_status != SubscriptionStatus::Paid {
            return Err(BillingError::InvalidStateTransition(format!(
                "only paid subscriptions can be renewed (status {})",
                current.payment_status
            )));
        }

        let plan = self
            .plan_catalog
            .find_by_id(current.plan_id)
            .await?
            .filter(|plan| plan.is_active)
            .ok_or_else(|| BillingError::PlanNotFound(current.plan_type.clone()))?;
        if plan.is_trial {
            return Err(BillingError::InvalidStateTransition(
                "trial subscriptions cannot be renewed".to_string(),
            ));
        }

        let pricing = calculate_price(&plan, i64::from(current.guest_count))?;
        let renewal = self
            .subscription_repo
            .insert(insert_entity(
                owner_id,
                current.event_id,
                &plan,
                &pricing,
                current.guest_count,
                SubscriptionStatus::Pending,
                Some(current.id),
                None,
            ))
            .await
            .map_err(|err| internal(owner_id, err, "subscriptions: failed to insert renewal"))?;

        info!(
            %owner_id,
            subscription_id = %renewal.id,
            renewal_of = %current.id,
            total_price_minor = renewal.total_price_minor,
            "subscriptions: renewal created"
        );
        Ok(renewal)
    }

    pub async fn cancel_subscription(
        &self,
        owner_id: Uuid,
        subscription_id: Uuid,
        reason: Option<String>,
    ) -> BillingResult<SubscriptionEntity> {
        let current = self.get_subscription(owner_id, subscription_id).await?;
        if !current.payment_status.is_cancellable() {
            return Err(BillingError::NotCancellable(current.payment_status));
        }

        let now = Utc::now();
        let mut cancelled = current;
        cancelled.payment_status = SubscriptionStatus::Cancelled;
        cancelled.expires_at = Some(now);
        cancelled.cancelled_at = Some(now);
        cancelled.cancel_reason = reason
            .map(|reason| reason.trim().to_string())
            .filter(|reason| !reason.is_empty());

        let saved = self.save(cancelled).await?;
        info!(
            %owner_id,
            subscription_id = %saved.id,
            reason = ?saved.cancel_reason,
            "subscriptions: subscription cancelled"
        );
        Ok(saved)
    }

    async fn save(&self, subscription: SubscriptionEntity) -> BillingResult<SubscriptionEntity> {
        let owner_id = subscription.owner_id;
        let subscription_id = subscription.id;
        self.subscription_repo
            .update_versioned(subscription)
            .await
            .map_err(|err| internal(owner_id, err, "subscriptions: failed to update subscription"))?
            .ok_or_else(|| {
                warn!(%owner_id, %subscription_id, "subscriptions: stale subscription write");
                BillingError::StaleWrite
            })
    }
}

/// Expiry once a payment settles `subscription`. A renewal starts where the
/// previous period ends; an unexpired window (upgrade top-up) is kept as is.
pub fn expiry_after_payment(
    subscription: &SubscriptionEntity,
    previous: Option<&SubscriptionEntity>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if let Some(expires_at) = subscription.expires_at {
        if expires_at > now {
            return Some(expires_at);
        }
    }

    let start = previous
        .filter(|previous| previous.payment_status == SubscriptionStatus::Paid)
        .and_then(|previous| previous.expires_at)
        .map_or(now, |previous_end| previous_end.max(now));
    expiry_from(start, subscription.duration_days)
}

fn expiry_from(start: DateTime<Utc>, duration_days: i32) -> Option<DateTime<Utc>> {
    (duration_days > 0).then(|| start + Duration::days(i64::from(duration_days)))
}

fn guest_count_column(guest_count: i64) -> BillingResult<i32> {
    i32::try_from(guest_count)
        .map_err(|_| BillingError::InvalidInput(format!("guest_count {guest_count} is too large")))
}

#[allow(clippy::too_many_arguments)]
fn insert_entity(
    owner_id: Uuid,
    event_id: Option<Uuid>,
    plan: &PlanEntity,
    pricing: &PricingResult,
    guest_count: i32,
    payment_status: SubscriptionStatus,
    renewal_of: Option<Uuid>,
    expires_at: Option<DateTime<Utc>>,
) -> InsertSubscriptionEntity {
    InsertSubscriptionEntity {
        owner_id,
        event_id,
        plan_id: plan.id,
        plan_type: plan.slug.clone(),
        base_price_minor: pricing.base_price,
        guest_count,
        included_guests: plan.included_guests,
        guest_price_per_unit_minor: pricing.guest_unit_price,
        total_price_minor: pricing.total_price,
        amount_paid_minor: 0,
        duration_days: plan.duration_days,
        payment_status: payment_status.to_string(),
        renewal_of,
        expires_at,
    }
}

fn internal(owner_id: Uuid, err: anyhow::Error, message: &'static str) -> BillingError {
    error!(%owner_id, db_error = ?err, "{message}");
    BillingError::Internal(err)
}
