use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use diesel::{RunQueryDsl, insert_into, prelude::*, update};
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::payments},
};
use domain::{
    entities::payments::{InsertPaymentEntity, PaymentEntity, PaymentRow},
    repositories::payments::PaymentRepository,
    value_objects::enums::{payment_methods::PaymentMethod, payment_statuses::PaymentStatus},
};

pub struct PaymentPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PaymentRepository for PaymentPostgres {
    async fn insert(&self, insert_payment_entity: InsertPaymentEntity) -> Result<PaymentEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = insert_into(payments::table)
            .values(&insert_payment_entity)
            .returning(PaymentRow::as_returning())
            .get_result::<PaymentRow>(&mut conn)?;

        PaymentEntity::try_from(row)
    }

    async fn find_by_id(&self, payment_id: Uuid) -> Result<Option<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = payments::table
            .filter(payments::id.eq(payment_id))
            .select(PaymentRow::as_select())
            .first::<PaymentRow>(&mut conn)
            .optional()?;

        row.map(PaymentEntity::try_from).transpose()
    }

    async fn find_by_external_reference(
        &self,
        subscription_id: Uuid,
        external_reference: String,
    ) -> Result<Option<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = payments::table
            .filter(payments::subscription_id.eq(subscription_id))
            .filter(payments::external_reference.eq(external_reference))
            .select(PaymentRow::as_select())
            .first::<PaymentRow>(&mut conn)
            .optional()?;

        row.map(PaymentEntity::try_from).transpose()
    }

    async fn find_by_transaction_reference(
        &self,
        payment_method: PaymentMethod,
        transaction_reference: String,
    ) -> Result<Option<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = payments::table
            .filter(payments::payment_method.eq(payment_method.to_string()))
            .filter(payments::transaction_reference.eq(transaction_reference))
            .order(payments::created_at.desc())
            .select(PaymentRow::as_select())
            .first::<PaymentRow>(&mut conn)
            .optional()?;

        row.map(PaymentEntity::try_from).transpose()
    }

    async fn list_by_subscription(&self, subscription_id: Uuid) -> Result<Vec<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = payments::table
            .filter(payments::subscription_id.eq(subscription_id))
            .order(payments::created_at.desc())
            .select(PaymentRow::as_select())
            .load::<PaymentRow>(&mut conn)?;

        rows.into_iter().map(PaymentEntity::try_from).collect()
    }

    async fn transition_status(
        &self,
        payment_id: Uuid,
        from: PaymentStatus,
        to: PaymentStatus,
        metadata: Map<String, Value>,
    ) -> Result<Option<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = update(payments::table)
            .filter(payments::id.eq(payment_id))
            .filter(payments::status.eq(from.to_string()))
            .set((
                payments::status.eq(to.to_string()),
                payments::metadata.eq(payments::metadata.concat(Value::Object(metadata))),
                payments::updated_at.eq(Utc::now()),
            ))
            .returning(PaymentRow::as_returning())
            .get_result::<PaymentRow>(&mut conn)
            .optional()?;

        row.map(PaymentEntity::try_from).transpose()
    }

    async fn update_metadata(
        &self,
        payment_id: Uuid,
        metadata: Map<String, Value>,
    ) -> Result<PaymentEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = update(payments::table)
            .filter(payments::id.eq(payment_id))
            .set((
                payments::metadata.eq(payments::metadata.concat(Value::Object(metadata))),
                payments::updated_at.eq(Utc::now()),
            ))
            .returning(PaymentRow::as_returning())
            .get_result::<PaymentRow>(&mut conn)
            .optional()?
            .with_context(|| format!("payment {payment_id} not found"))?;

        PaymentEntity::try_from(row)
    }
}
