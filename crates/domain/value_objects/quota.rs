use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::domain::value_objects::{
    enums::resource_kinds::ResourceKind,
    plans::{PlanLimits, UNLIMITED},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    Unlimited,
    Limited(i64),
}

impl Serialize for Remaining {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Remaining::Unlimited => serializer.serialize_str("unlimited"),
            Remaining::Limited(value) => serializer.serialize_i64(*value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub limit: i64,
    pub current: i64,
    pub remaining: Remaining,
}

/// Already-loaded counts for one owner/event scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResourceUsage {
    pub guests: i64,
    pub collaborators: i64,
    pub photos: i64,
    pub events_in_period: i64,
}

impl ResourceUsage {
    pub fn count_for(&self, resource: ResourceKind) -> i64 {
        match resource {
            ResourceKind::Guests => self.guests,
            ResourceKind::Collaborators => self.collaborators,
            ResourceKind::Photos => self.photos,
            ResourceKind::EventsPerPeriod => self.events_in_period,
        }
    }
}

/// Answer to "what may this owner still create" for one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanLimitsReport {
    pub subscription_id: Option<Uuid>,
    pub plan_type: Option<String>,
    pub resources: BTreeMap<ResourceKind, QuotaDecision>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitsQuery {
    pub event_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuotaCheckQuery {
    pub resource: ResourceKind,
    pub event_id: Option<Uuid>,
}

/// Can one more unit be added? `-1` is unlimited; any other negative limit is closed.
pub fn evaluate_quota(limit: i64, current: i64) -> QuotaDecision {
    if limit == UNLIMITED {
        return QuotaDecision {
            allowed: true,
            limit,
            current,
            remaining: Remaining::Unlimited,
        };
    }

    let limit = limit.max(0);
    let remaining = limit.saturating_sub(current).max(0);

    QuotaDecision {
        allowed: current < limit,
        limit,
        current,
        remaining: Remaining::Limited(remaining),
    }
}

pub fn evaluate_all(
    limits: &PlanLimits,
    usage: &ResourceUsage,
) -> BTreeMap<ResourceKind, QuotaDecision> {
    ResourceKind::ALL
        .into_iter()
        .map(|resource| {
            (
                resource,
                evaluate_quota(limits.limit_for(resource), usage.count_for(resource)),
            )
        })
        .collect()
}
