use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::value_objects::quota::ResourceUsage;

/// Read-only counts of the metered resources owned by other parts of the system.
#[automock]
#[async_trait]
pub trait ResourceUsageRepository {
    async fn count_usage(
        &self,
        owner_id: Uuid,
        event_id: Option<Uuid>,
        period_start: DateTime<Utc>,
    ) -> Result<ResourceUsage>;
}
