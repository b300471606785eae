use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::{
    entities::payments::{InsertPaymentEntity, PaymentEntity},
    value_objects::enums::{payment_methods::PaymentMethod, payment_statuses::PaymentStatus},
};

#[automock]
#[async_trait]
pub trait PaymentRepository {
    async fn insert(&self, payment: InsertPaymentEntity) -> Result<PaymentEntity>;

    async fn find_by_id(&self, payment_id: Uuid) -> Result<Option<PaymentEntity>>;

    async fn find_by_external_reference(
        &self,
        subscription_id: Uuid,
        external_reference: String,
    ) -> Result<Option<PaymentEntity>>;

    async fn find_by_transaction_reference(
        &self,
        payment_method: PaymentMethod,
        transaction_reference: String,
    ) -> Result<Option<PaymentEntity>>;

    async fn list_by_subscription(&self, subscription_id: Uuid) -> Result<Vec<PaymentEntity>>;

    /// Moves the payment from `from` to `to` and merges `metadata` into the stored
    /// object, only if it is still in `from`. Returns `None` when the status had
    /// already changed.
    async fn transition_status(
        &self,
        payment_id: Uuid,
        from: PaymentStatus,
        to: PaymentStatus,
        metadata: Map<String, Value>,
    ) -> Result<Option<PaymentEntity>>;

    /// Merges `metadata` into the stored object. Keys already present are overwritten.
    async fn update_metadata(
        &self,
        payment_id: Uuid,
        metadata: Map<String, Value>,
    ) -> Result<PaymentEntity>;
}
