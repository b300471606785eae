use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{RunQueryDsl, dsl::count_star, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{event_collaborators, event_photos, events, guests},
    },
};
use domain::{
    repositories::resource_usage::ResourceUsageRepository, value_objects::quota::ResourceUsage,
};

pub struct ResourceUsagePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl ResourceUsagePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl ResourceUsageRepository for ResourceUsagePostgres {
    async fn count_usage(
        &self,
        owner_id: Uuid,
        event_id: Option<Uuid>,
        period_start: DateTime<Utc>,
    ) -> Result<ResourceUsage> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // Event-scoped counts cover one event; account-level counts cover every owned event.
        let event_ids: Vec<Uuid> = match event_id {
            Some(event_id) => vec![event_id],
            None => events::table
                .filter(events::owner_id.eq(owner_id))
                .select(events::id)
                .load::<Uuid>(&mut conn)?,
        };

        let guests = guests::table
            .filter(guests::event_id.eq_any(&event_ids))
            .select(count_star())
            .get_result::<i64>(&mut conn)?;

        let collaborators = event_collaborators::table
            .filter(event_collaborators::event_id.eq_any(&event_ids))
            .select(count_star())
            .get_result::<i64>(&mut conn)?;

        let photos = event_photos::table
            .filter(event_photos::event_id.eq_any(&event_ids))
            .select(count_star())
            .get_result::<i64>(&mut conn)?;

        let events_in_period = events::table
            .filter(events::owner_id.eq(owner_id))
            .filter(events::created_at.ge(period_start))
            .select(count_star())
            .get_result::<i64>(&mut conn)?;

        Ok(ResourceUsage {
            guests,
            collaborators,
            photos,
            events_in_period,
        })
    }
}
