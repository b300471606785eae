use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use diesel::{RunQueryDsl, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain;
use crate::infra::db::postgres::{postgres_connection::PgPoolSquad, schema::plans};
use domain::{
    entities::plans::{PlanChangeset, PlanEntity, PlanRow},
    repositories::plans::PlanRepository,
    value_objects::plans::PlanUpdateModel,
};

pub struct PlanPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PlanPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PlanRepository for PlanPostgres {
    async fn find_by_id(&self, plan_id: Uuid) -> Result<Option<PlanEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = plans::table
            .filter(plans::id.eq(plan_id))
            .select(PlanRow::as_select())
            .first::<PlanRow>(&mut conn)
            .optional()?;

        Ok(row.map(PlanEntity::from))
    }

    async fn list_active_plans(&self) -> Result<Vec<PlanEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = plans::table
            .filter(plans::is_active.eq(true))
            .order((plans::sort_order.asc(), plans::price_minor.asc()))
            .select(PlanRow::as_select())
            .load::<PlanRow>(&mut conn)?;

        Ok(rows.into_iter().map(PlanEntity::from).collect())
    }

    async fn update_plan(&self, plan_id: Uuid, update_model: PlanUpdateModel) -> Result<PlanEntity> {
        let changeset = PlanChangeset::from_model(update_model, Utc::now())?;
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = update(plans::table)
            .filter(plans::id.eq(plan_id))
            .set(&changeset)
            .returning(PlanRow::as_returning())
            .get_result::<PlanRow>(&mut conn)
            .optional()?
            .with_context(|| format!("plan {plan_id} not found"))?;

        Ok(row.into())
    }
}
