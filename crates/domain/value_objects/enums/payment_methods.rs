use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Mobile-money operators a payment can be routed through.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    MtnMomo,
    OrangeMoney,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::MtnMomo => "mtn_momo",
            PaymentMethod::OrangeMoney => "orange_money",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "mtn_momo" => Some(PaymentMethod::MtnMomo),
            "orange_money" => Some(PaymentMethod::OrangeMoney),
            _ => None,
        }
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
