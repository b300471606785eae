use chrono::Utc;
use crates::domain::{
    repositories::resource_usage::ResourceUsageRepository,
    value_objects::{
        enums::resource_kinds::ResourceKind,
        quota::{PlanLimitsReport, QuotaDecision, evaluate_all, evaluate_quota},
    },
};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use super::{
    errors::{BillingError, BillingResult},
    plan_resolver::PlanResolver,
};

pub struct QuotaUseCase {
    plan_resolver: Arc<PlanResolver>,
    usage_repo: Arc<dyn ResourceUsageRepository + Send + Sync>,
}

impl QuotaUseCase {
    pub fn new(
        plan_resolver: Arc<PlanResolver>,
        usage_repo: Arc<dyn ResourceUsageRepository + Send + Sync>,
    ) -> Self {
        Self {
            plan_resolver,
            usage_repo,
        }
    }

    pub async fn check_plan_limits(
        &self,
        owner_id: Uuid,
        event_id: Option<Uuid>,
    ) -> BillingResult<PlanLimitsReport> {
        let now = Utc::now();
        let resolved = self
            .plan_resolver
            .resolve_effective_plan(owner_id, event_id, now)
            .await?;

        let usage = self
            .usage_repo
            .count_usage(owner_id, event_id, resolved.period_start)
            .await
            .map_err(|err| {
                error!(
                    %owner_id,
                    event_id = ?event_id,
                    db_error = ?err,
                    "quota: failed to count resource usage"
                );
                BillingError::Internal(err)
            })?;

        Ok(PlanLimitsReport {
            subscription_id: resolved.subscription.as_ref().map(|s| s.id),
            plan_type: resolved.plan_type,
            resources: evaluate_all(&resolved.limits, &usage),
        })
    }

    /// Gate used by collaborators before they create a metered resource.
    pub async fn ensure_can_add(
        &self,
        owner_id: Uuid,
        event_id: Option<Uuid>,
        resource: ResourceKind,
    ) -> BillingResult<QuotaDecision> {
        let report = self.check_plan_limits(owner_id, event_id).await?;
        let decision = report
            .resources
            .get(&resource)
            .copied()
            .unwrap_or_else(|| evaluate_quota(0, 0));

        if !decision.allowed {
            info!(
                %owner_id,
                event_id = ?event_id,
                %resource,
                limit = decision.limit,
                current = decision.current,
                "quota: resource limit reached"
            );
            return Err(BillingError::QuotaExceeded {
                resource,
                limit: decision.limit,
                current: decision.current,
            });
        }

        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::{
        plan_catalog::PlanCatalog,
        test_support::{paid, plan, subscription},
    };
    use crates::domain::{
        repositories::{
            plans::MockPlanRepository, resource_usage::MockResourceUsageRepository,
            subscriptions::MockSubscriptionRepository,
        },
        value_objects::{
            plans::PlanLimits,
            quota::{Remaining, ResourceUsage},
        },
    };

    fn quota_usecase(
        plan_repo: MockPlanRepository,
        subscription_repo: MockSubscriptionRepository,
        usage_repo: MockResourceUsageRepository,
    ) -> QuotaUseCase {
        let resolver = PlanResolver::new(
            Arc::new(PlanCatalog::new(Arc::new(plan_repo))),
            Arc::new(subscription_repo),
            PlanLimits {
                max_guests: Some(0),
                max_collaborators: Some(0),
                max_photos: Some(0),
                events_per_period: Some(1),
            },
        );
        QuotaUseCase::new(Arc::new(resolver), Arc::new(usage_repo))
    }

    #[tokio::test]
    async fn default_tier_with_zero_guests_blocks_the_first_guest() {
        let owner_id = Uuid::new_v4();

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_active_for_scope()
            .returning(|_, _, _| Ok(None));
        let mut usage_repo = MockResourceUsageRepository::new();
        usage_repo
            .expect_count_usage()
            .returning(|_, _, _| Ok(ResourceUsage::default()));

        let quota = quota_usecase(MockPlanRepository::new(), subscription_repo, usage_repo);

        let report = quota.check_plan_limits(owner_id, None).await.unwrap();
        let guests = report.resources[&ResourceKind::Guests];
        assert!(!guests.allowed);
        assert_eq!(guests.remaining, Remaining::Limited(0));
        assert!(report.subscription_id.is_none());

        let result = quota
            .ensure_can_add(owner_id, None, ResourceKind::Guests)
            .await;
        assert!(matches!(
            result,
            Err(BillingError::QuotaExceeded {
                resource: ResourceKind::Guests,
                limit: 0,
                current: 0
            })
        ));
    }

    #[tokio::test]
    async fn paid_plan_limits_apply_to_usage() {
        let owner_id = Uuid::new_v4();
        let basic = plan("basic", 10_000, 50, 30);
        let active = paid(subscription(&basic, owner_id, 50), Uuid::new_v4());

        let mut plan_repo = MockPlanRepository::new();
        let cached = basic.clone();
        plan_repo
            .expect_list_active_plans()
            .returning(move || Ok(vec![cached.clone()]));
        let mut subscription_repo = MockSubscriptionRepository::new();
        let governing = active.clone();
        subscription_repo
            .expect_find_active_for_scope()
            .returning(move |_, _, _| Ok(Some(governing.clone())));
        let mut usage_repo = MockResourceUsageRepository::new();
        usage_repo.expect_count_usage().returning(|_, _, _| {
            Ok(ResourceUsage {
                guests: 199,
                collaborators: 5,
                photos: 4_000,
                events_in_period: 1,
            })
        });

        let quota = quota_usecase(plan_repo, subscription_repo, usage_repo);
        let report = quota.check_plan_limits(owner_id, None).await.unwrap();

        assert_eq!(report.subscription_id, Some(active.id));
        assert_eq!(report.plan_type.as_deref(), Some("basic"));
        assert_eq!(
            report.resources[&ResourceKind::Guests].remaining,
            Remaining::Limited(1)
        );
        assert!(!report.resources[&ResourceKind::Collaborators].allowed);
        assert_eq!(
            report.resources[&ResourceKind::Photos].remaining,
            Remaining::Unlimited
        );

        let decision = quota
            .ensure_can_add(owner_id, None, ResourceKind::Guests)
            .await
            .unwrap();
        assert!(decision.allowed);
    }
}
