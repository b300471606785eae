use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::{
        payment_methods::PaymentMethod, payment_statuses::PaymentStatus,
    },
    infra::db::postgres::schema::payments,
};

/// One attempt to pay for a subscription through a mobile-money operator.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentEntity {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub owner_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub phone_number: String,
    pub external_reference: String,
    pub transaction_reference: Option<String>,
    pub status: PaymentStatus,
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Metadata entries to merge into a payment. The repository merges them over the
/// stored object, so keys written concurrently by other requests survive.
pub fn metadata_patch<I>(entries: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (&'static str, Value)>,
{
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = payments)]
pub struct PaymentRow {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub owner_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub payment_method: String,
    pub phone_number: String,
    pub external_reference: String,
    pub transaction_reference: Option<String>,
    pub status: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for PaymentEntity {
    type Error = anyhow::Error;

    fn try_from(value: PaymentRow) -> Result<Self> {
        let payment_method = PaymentMethod::from_str(&value.payment_method).ok_or_else(|| {
            anyhow!(
                "payment {} has unknown payment_method {}",
                value.id,
                value.payment_method
            )
        })?;
        let status = PaymentStatus::from_str(&value.status)
            .ok_or_else(|| anyhow!("payment {} has unknown status {}", value.id, value.status))?;
        let metadata = match value.metadata {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("legacy".to_string(), other);
                map
            }
        };

        Ok(Self {
            id: value.id,
            subscription_id: value.subscription_id,
            owner_id: value.owner_id,
            amount_minor: value.amount_minor,
            currency: value.currency,
            payment_method,
            phone_number: value.phone_number,
            external_reference: value.external_reference,
            transaction_reference: value.transaction_reference,
            status,
            metadata,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = payments)]
pub struct InsertPaymentEntity {
    pub subscription_id: Uuid,
    pub owner_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub payment_method: String,
    pub phone_number: String,
    pub external_reference: String,
    pub transaction_reference: Option<String>,
    pub status: String,
    pub metadata: Value,
}
