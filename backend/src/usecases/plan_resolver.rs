use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use crates::domain::{
    entities::subscriptions::SubscriptionEntity,
    repositories::subscriptions::SubscriptionRepository, value_objects::plans::PlanLimits,
};
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::{
    errors::{BillingError, BillingResult},
    plan_catalog::PlanCatalog,
};

/// Limits that apply to one owner/event scope right now.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPlan {
    pub subscription: Option<SubscriptionEntity>,
    pub plan_type: Option<String>,
    pub limits: PlanLimits,
    /// Start of the window `events_per_period` is counted over.
    pub period_start: DateTime<Utc>,
}

/// Resolves the governing subscription for a scope: event-scoped first, then
/// account-level, then the configured default tier.
pub struct PlanResolver {
    plan_catalog: Arc<PlanCatalog>,
    subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
    default_limits: PlanLimits,
}

impl PlanResolver {
    pub fn new(
        plan_catalog: Arc<PlanCatalog>,
        subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
        default_limits: PlanLimits,
    ) -> Self {
        Self {
            plan_catalog,
            subscription_repo,
            default_limits,
        }
    }

    pub async fn resolve_governing_subscription(
        &self,
        owner_id: Uuid,
        event_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> BillingResult<Option<SubscriptionEntity>> {
        if let Some(event_id) = event_id {
            if let Some(subscription) = self.find_active(owner_id, Some(event_id), now).await? {
                debug!(
                    %owner_id,
                    %event_id,
                    subscription_id = %subscription.id,
                    "plan_resolver: using event subscription"
                );
                return Ok(Some(subscription));
            }
        }

        let subscription = self.find_active(owner_id, None, now).await?;
        if let Some(subscription) = subscription.as_ref() {
            debug!(
                %owner_id,
                subscription_id = %subscription.id,
                "plan_resolver: using account subscription"
            );
        }
        Ok(subscription)
    }

    pub async fn resolve_effective_plan(
        &self,
        owner_id: Uuid,
        event_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> BillingResult<ResolvedPlan> {
        let Some(subscription) = self
            .resolve_governing_subscription(owner_id, event_id, now)
            .await?
        else {
            debug!(%owner_id, "plan_resolver: falling back to default tier");
            return Ok(ResolvedPlan {
                subscription: None,
                plan_type: None,
                limits: self.default_limits.clone(),
                period_start: month_start(now),
            });
        };

        let limits = match self.plan_catalog.find_by_id(subscription.plan_id).await? {
            Some(plan) => plan.limits,
            None => {
                warn!(
                    %owner_id,
                    subscription_id = %subscription.id,
                    plan_id = %subscription.plan_id,
                    "plan_resolver: subscription references a missing plan, using default tier"
                );
                self.default_limits.clone()
            }
        };

        Ok(ResolvedPlan {
            plan_type: Some(subscription.plan_type.clone()),
            limits,
            period_start: subscription_period_start(&subscription),
            subscription: Some(subscription),
        })
    }

    async fn find_active(
        &self,
        owner_id: Uuid,
        event_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> BillingResult<Option<SubscriptionEntity>> {
        self.subscription_repo
            .find_active_for_scope(owner_id, event_id, now)
            .await
            .map_err(|err| {
                error!(
                    %owner_id,
                    event_id = ?event_id,
                    db_error = ?err,
                    "plan_resolver: failed to load active subscription"
                );
                BillingError::Internal(err)
            })
    }
}

fn subscription_period_start(subscription: &SubscriptionEntity) -> DateTime<Utc> {
    match subscription.expires_at {
        Some(expires_at) if subscription.duration_days > 0 => {
            expires_at - Duration::days(i64::from(subscription.duration_days))
        }
        _ => subscription.created_at,
    }
}

fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}
