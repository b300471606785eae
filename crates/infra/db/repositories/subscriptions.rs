use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{RunQueryDsl, dsl::count_star, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::subscriptions},
};
use domain::{
    entities::subscriptions::{
        InsertSubscriptionEntity, SubscriptionChangeset, SubscriptionEntity, SubscriptionRow,
    },
    repositories::subscriptions::SubscriptionRepository,
    value_objects::enums::subscription_statuses::SubscriptionStatus,
};

pub struct SubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SubscriptionRepository for SubscriptionPostgres {
    async fn find_by_id(&self, subscription_id: Uuid) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = subscriptions::table
            .filter(subscriptions::id.eq(subscription_id))
            .select(SubscriptionRow::as_select())
            .first::<SubscriptionRow>(&mut conn)
            .optional()?;

        row.map(SubscriptionEntity::try_from).transpose()
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = subscriptions::table
            .filter(subscriptions::owner_id.eq(owner_id))
            .order(subscriptions::created_at.desc())
            .select(SubscriptionRow::as_select())
            .load::<SubscriptionRow>(&mut conn)?;

        rows.into_iter().map(SubscriptionEntity::try_from).collect()
    }

    async fn find_active_for_scope(
        &self,
        owner_id: Uuid,
        event_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let mut query = subscriptions::table
            .filter(subscriptions::owner_id.eq(owner_id))
            .filter(subscriptions::payment_status.eq(SubscriptionStatus::Paid.to_string()))
            .filter(
                subscriptions::expires_at
                    .is_null()
                    .or(subscriptions::expires_at.gt(now)),
            )
            .into_boxed();

        query = match event_id {
            Some(event_id) => query.filter(subscriptions::event_id.eq(event_id)),
            None => query.filter(subscriptions::event_id.is_null()),
        };

        let row = query
            .order(subscriptions::created_at.desc())
            .select(SubscriptionRow::as_select())
            .first::<SubscriptionRow>(&mut conn)
            .optional()?;

        row.map(SubscriptionEntity::try_from).transpose()
    }

    async fn count_by_owner_and_plan(&self, owner_id: Uuid, plan_id: Uuid) -> Result<i64> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let total = subscriptions::table
            .filter(subscriptions::owner_id.eq(owner_id))
            .filter(subscriptions::plan_id.eq(plan_id))
            .select(count_star())
            .get_result::<i64>(&mut conn)?;

        Ok(total)
    }

    async fn insert(
        &self,
        insert_subscription_entity: InsertSubscriptionEntity,
    ) -> Result<SubscriptionEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = insert_into(subscriptions::table)
            .values(&insert_subscription_entity)
            .returning(SubscriptionRow::as_returning())
            .get_result::<SubscriptionRow>(&mut conn)?;

        SubscriptionEntity::try_from(row)
    }

    async fn update_versioned(
        &self,
        subscription: SubscriptionEntity,
    ) -> Result<Option<SubscriptionEntity>> {
        let changeset = SubscriptionChangeset::next_version(&subscription, Utc::now());
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = update(subscriptions::table)
            .filter(subscriptions::id.eq(subscription.id))
            .filter(subscriptions::version.eq(subscription.version))
            .set(&changeset)
            .returning(SubscriptionRow::as_returning())
            .get_result::<SubscriptionRow>(&mut conn)
            .optional()?;

        row.map(SubscriptionEntity::try_from).transpose()
    }
}
