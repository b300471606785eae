use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::plans::PlanEntity, value_objects::enums::resource_kinds::ResourceKind,
};

/// Limit value meaning "no cap".
pub const UNLIMITED: i64 = -1;

/// Numeric limits attached to a plan. Stored as JSONB in the database.
/// A missing limit is treated as zero so unknown plans fail closed.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct PlanLimits {
    #[serde(default)]
    pub max_guests: Option<i64>,

    #[serde(default)]
    pub max_collaborators: Option<i64>,

    #[serde(default)]
    pub max_photos: Option<i64>,

    #[serde(default)]
    pub events_per_period: Option<i64>,
}

impl PlanLimits {
    pub fn limit_for(&self, resource: ResourceKind) -> i64 {
        let limit = match resource {
            ResourceKind::Guests => self.max_guests,
            ResourceKind::Collaborators => self.max_collaborators,
            ResourceKind::Photos => self.max_photos,
            ResourceKind::EventsPerPeriod => self.events_per_period,
        };
        limit.unwrap_or(0)
    }

    pub fn unlimited() -> Self {
        Self {
            max_guests: Some(UNLIMITED),
            max_collaborators: Some(UNLIMITED),
            max_photos: Some(UNLIMITED),
            events_per_period: Some(UNLIMITED),
        }
    }
}

/// Boolean feature flags (e.g. `custom_branding`, `csv_export`).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct PlanFeatures(pub BTreeMap<String, bool>);

impl PlanFeatures {
    pub fn has(&self, feature: &str) -> bool {
        self.0.get(feature).copied().unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanDto {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub price_minor: i64,
    pub included_guests: i32,
    pub guest_unit_price_minor: i64,
    pub duration_days: i32,
    pub is_trial: bool,
    pub limits: PlanLimits,
    pub features: PlanFeatures,
}

impl From<PlanEntity> for PlanDto {
    fn from(value: PlanEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            slug: value.slug,
            price_minor: value.price_minor,
            included_guests: value.included_guests,
            guest_unit_price_minor: value.guest_unit_price_minor,
            duration_days: value.duration_days,
            is_trial: value.is_trial,
            limits: value.limits,
            features: value.features,
        }
    }
}

/// Admin edit of a catalog entry. Only the provided fields change; prices stored
/// on existing subscriptions are never touched.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PlanUpdateModel {
    pub name: Option<String>,
    pub price_minor: Option<i64>,
    pub included_guests: Option<i32>,
    pub guest_unit_price_minor: Option<i64>,
    pub duration_days: Option<i32>,
    pub is_active: Option<bool>,
    pub limits: Option<PlanLimits>,
    pub features: Option<PlanFeatures>,
    pub sort_order: Option<i32>,
}
