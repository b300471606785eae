use chrono::{DateTime, Utc};
use diesel::prelude::*;
use tracing::warn;
use uuid::Uuid;

use crate::{
    domain::value_objects::plans::{PlanFeatures, PlanLimits, PlanUpdateModel},
    infra::db::postgres::schema::plans,
};

#[derive(Debug, Clone, PartialEq)]
pub struct PlanEntity {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub price_minor: i64,
    pub included_guests: i32,
    pub guest_unit_price_minor: i64,
    pub duration_days: i32,
    pub is_trial: bool,
    pub is_one_time_use: bool,
    pub is_active: bool,
    pub limits: PlanLimits,
    pub features: PlanFeatures,
    pub sort_order: i32,
}

/// Raw row used for Diesel queries. Limits and features stay as JSON and are parsed
/// into their value objects.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = plans)]
pub struct PlanRow {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub price_minor: i64,
    pub included_guests: i32,
    pub guest_unit_price_minor: i64,
    pub duration_days: i32,
    pub is_trial: bool,
    pub is_one_time_use: bool,
    pub is_active: bool,
    pub limits: serde_json::Value,
    pub features: serde_json::Value,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PlanRow> for PlanEntity {
    fn from(value: PlanRow) -> Self {
        let limits = serde_json::from_value(value.limits).unwrap_or_else(|err| {
            warn!(plan_id = %value.id, error = %err, "plans: invalid limits json, closing all limits");
            PlanLimits::default()
        });
        let features = serde_json::from_value(value.features).unwrap_or_default();

        Self {
            id: value.id,
            name: value.name,
            slug: value.slug,
            price_minor: value.price_minor,
            included_guests: value.included_guests,
            guest_unit_price_minor: value.guest_unit_price_minor,
            duration_days: value.duration_days,
            is_trial: value.is_trial,
            is_one_time_use: value.is_one_time_use,
            is_active: value.is_active,
            limits,
            features,
            sort_order: value.sort_order,
        }
    }
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = plans)]
pub struct PlanChangeset {
    pub name: Option<String>,
    pub price_minor: Option<i64>,
    pub included_guests: Option<i32>,
    pub guest_unit_price_minor: Option<i64>,
    pub duration_days: Option<i32>,
    pub is_active: Option<bool>,
    pub limits: Option<serde_json::Value>,
    pub features: Option<serde_json::Value>,
    pub sort_order: Option<i32>,
    pub updated_at: DateTime<Utc>,
}

impl PlanChangeset {
    pub fn from_model(model: PlanUpdateModel, updated_at: DateTime<Utc>) -> anyhow::Result<Self> {
        let limits = model.limits.map(serde_json::to_value).transpose()?;
        let features = model.features.map(serde_json::to_value).transpose()?;

        Ok(Self {
            name: model.name,
            price_minor: model.price_minor,
            included_guests: model.included_guests,
            guest_unit_price_minor: model.guest_unit_price_minor,
            duration_days: model.duration_days,
            is_active: model.is_active,
            limits,
            features,
            sort_order: model.sort_order,
            updated_at,
        })
    }
}
