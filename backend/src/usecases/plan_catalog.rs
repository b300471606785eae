use std::{collections::HashMap, sync::Arc};

use crates::domain::{
    entities::plans::PlanEntity, repositories::plans::PlanRepository,
    value_objects::plans::PlanUpdateModel,
};
use tokio::sync::RwLock;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::errors::{BillingError, BillingResult};

type PlansBySlug = Arc<HashMap<String, PlanEntity>>;

/// Read-mostly cache of the active plan catalog, keyed by slug.
/// Loaded on first use; admin edits write through and drop the cache.
pub struct PlanCatalog {
    plan_repo: Arc<dyn PlanRepository + Send + Sync>,
    cache: RwLock<Option<PlansBySlug>>,
}

impl PlanCatalog {
    pub fn new(plan_repo: Arc<dyn PlanRepository + Send + Sync>) -> Self {
        Self {
            plan_repo,
            cache: RwLock::new(None),
        }
    }

    async fn plans(&self) -> BillingResult<PlansBySlug> {
        if let Some(plans) = self.cache.read().await.as_ref() {
            return Ok(Arc::clone(plans));
        }

        let mut cache = self.cache.write().await;
        // Another request may have filled the cache while we waited for the lock.
        if let Some(plans) = cache.as_ref() {
            return Ok(Arc::clone(plans));
        }

        let plans = self.plan_repo.list_active_plans().await.map_err(|err| {
            error!(db_error = ?err, "plan_catalog: failed to load active plans");
            BillingError::Internal(err)
        })?;
        let by_slug: PlansBySlug = Arc::new(
            plans
                .into_iter()
                .map(|plan| (plan.slug.clone(), plan))
                .collect(),
        );

        info!(plan_count = by_slug.len(), "plan_catalog: active plans cached");
        *cache = Some(Arc::clone(&by_slug));
        Ok(by_slug)
    }

    pub async fn list_plans(&self) -> BillingResult<Vec<PlanEntity>> {
        let plans = self.plans().await?;
        let mut plans: Vec<PlanEntity> = plans.values().cloned().collect();
        plans.sort_by(|a, b| {
            (a.sort_order, a.price_minor, &a.slug).cmp(&(b.sort_order, b.price_minor, &b.slug))
        });
        Ok(plans)
    }

    pub async fn find_active(&self, slug: &str) -> BillingResult<PlanEntity> {
        let plans = self.plans().await?;
        plans.get(slug).cloned().ok_or_else(|| {
            debug!(plan_type = %slug, "plan_catalog: unknown or inactive plan");
            BillingError::PlanNotFound(slug.to_string())
        })
    }

    /// Includes deactivated plans, which existing subscriptions may still reference.
    pub async fn find_by_id(&self, plan_id: Uuid) -> BillingResult<Option<PlanEntity>> {
        let plans = self.plans().await?;
        if let Some(plan) = plans.values().find(|plan| plan.id == plan_id) {
            return Ok(Some(plan.clone()));
        }

        self.plan_repo.find_by_id(plan_id).await.map_err(|err| {
            error!(%plan_id, db_error = ?err, "plan_catalog: failed to load plan");
            BillingError::Internal(err)
        })
    }

    pub async fn update_plan(
        &self,
        plan_id: Uuid,
        update_model: PlanUpdateModel,
    ) -> BillingResult<PlanEntity> {
        if matches!(update_model.price_minor, Some(price) if price < 0)
            || matches!(update_model.guest_unit_price_minor, Some(price) if price < 0)
            || matches!(update_model.included_guests, Some(guests) if guests < 0)
        {
            return Err(BillingError::InvalidInput(
                "plan prices and included guests must not be negative".to_string(),
            ));
        }

        let existing = self.plan_repo.find_by_id(plan_id).await.map_err(|err| {
            error!(%plan_id, db_error = ?err, "plan_catalog: failed to load plan for update");
            BillingError::Internal(err)
        })?;
        if existing.is_none() {
            return Err(BillingError::PlanNotFound(plan_id.to_string()));
        }

        let updated = self
            .plan_repo
            .update_plan(plan_id, update_model)
            .await
            .map_err(|err| {
                error!(%plan_id, db_error = ?err, "plan_catalog: failed to update plan");
                BillingError::Internal(err)
            })?;

        self.invalidate().await;
        info!(%plan_id, plan_type = %updated.slug, "plan_catalog: plan updated");
        Ok(updated)
    }

    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
        debug!("plan_catalog: cache invalidated");
    }
}
