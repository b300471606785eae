use crates::{
    domain::value_objects::plans::PlanLimits,
    payments::{mtn_momo::MtnMomoConfig, orange_money::OrangeMoneyConfig},
};

use super::stage::Stage;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub stage: Stage,
    pub backend_server: BackendServer,
    pub database: Database,
    pub auth: AuthSecret,
    pub billing: Billing,
    pub mtn_momo: Option<MtnMomoConfig>,
    pub orange_money: Option<OrangeMoneyConfig>,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct AuthSecret {
    pub jwt_secret: String,
}

#[derive(Debug, Clone)]
pub struct Billing {
    /// ISO 4217 code charged on every payment; `XAF` has no minor unit.
    pub currency: String,
    /// Limits applied when an owner has no active subscription.
    pub default_limits: PlanLimits,
}
