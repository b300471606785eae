use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Stored payment state of a subscription. Expiry is not a status: it is derived
/// from `expires_at` whenever access is evaluated.
#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Cancelled,
    Refunded,
}

impl Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Paid => "paid",
            SubscriptionStatus::Failed => "failed",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Refunded => "refunded",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(SubscriptionStatus::Pending),
            "paid" => Some(SubscriptionStatus::Paid),
            "failed" => Some(SubscriptionStatus::Failed),
            "cancelled" => Some(SubscriptionStatus::Cancelled),
            "refunded" => Some(SubscriptionStatus::Refunded),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: SubscriptionStatus) -> bool {
        use SubscriptionStatus::*;

        matches!(
            (self, next),
            (Pending, Paid)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Failed, Pending)
                | (Failed, Paid)
                | (Failed, Cancelled)
                | (Paid, Pending)
                | (Paid, Cancelled)
                | (Paid, Refunded)
        )
    }

    pub fn is_cancellable(&self) -> bool {
        self.can_transition_to(SubscriptionStatus::Cancelled)
    }

    /// Cancelled and refunded subscriptions are closed financial records.
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Cancelled | SubscriptionStatus::Refunded
        )
    }
}
