use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Resources whose creation is metered by plan limits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Guests,
    Collaborators,
    Photos,
    EventsPerPeriod,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Guests,
        ResourceKind::Collaborators,
        ResourceKind::Photos,
        ResourceKind::EventsPerPeriod,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Guests => "guests",
            ResourceKind::Collaborators => "collaborators",
            ResourceKind::Photos => "photos",
            ResourceKind::EventsPerPeriod => "events_per_period",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
