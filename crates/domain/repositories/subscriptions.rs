use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::subscriptions::{InsertSubscriptionEntity, SubscriptionEntity};

#[automock]
#[async_trait]
pub trait SubscriptionRepository {
    async fn find_by_id(&self, subscription_id: Uuid) -> Result<Option<SubscriptionEntity>>;

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<SubscriptionEntity>>;

    /// Most recently created paid, unexpired subscription for exactly this scope
    /// (`event_id = None` means the account-level scope).
    async fn find_active_for_scope(
        &self,
        owner_id: Uuid,
        event_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Option<SubscriptionEntity>>;

    async fn count_by_owner_and_plan(&self, owner_id: Uuid, plan_id: Uuid) -> Result<i64>;

    async fn insert(&self, subscription: InsertSubscriptionEntity) -> Result<SubscriptionEntity>;

    /// Writes `subscription` only if the stored row still carries `subscription.version`.
    /// Returns `None` when another writer got there first.
    async fn update_versioned(
        &self,
        subscription: SubscriptionEntity,
    ) -> Result<Option<SubscriptionEntity>>;
}
