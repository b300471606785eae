use std::sync::Arc;

use anyhow::Result;
use axum::extract::FromRef;
use crates::{
    infra::{
        db::{
            postgres::postgres_connection::PgPoolSquad,
            repositories::{
                payments::PaymentPostgres, plans::PlanPostgres,
                resource_usage::ResourceUsagePostgres, subscriptions::SubscriptionPostgres,
            },
        },
        notifications::TracingPaymentNotifier,
    },
    payments::{
        gateway::PaymentGateways, mtn_momo::MtnMomoClient, orange_money::OrangeMoneyClient,
    },
};
use tracing::{info, warn};

use crate::{
    auth::JwtSecret,
    config::config_model::DotEnvyConfig,
    usecases::{
        payments::PaymentUseCase, plan_catalog::PlanCatalog, plan_resolver::PlanResolver,
        quota::QuotaUseCase, subscriptions::SubscriptionUseCase,
    },
};

/// Shared by every billing router. Cloning only bumps reference counts.
#[derive(Clone)]
pub struct BillingState {
    pub plan_catalog: Arc<PlanCatalog>,
    pub subscriptions: Arc<SubscriptionUseCase>,
    pub payments: Arc<PaymentUseCase>,
    pub quota: Arc<QuotaUseCase>,
    pub jwt_secret: JwtSecret,
}

impl FromRef<BillingState> for JwtSecret {
    fn from_ref(state: &BillingState) -> Self {
        state.jwt_secret.clone()
    }
}

impl BillingState {
    pub fn build(config: &DotEnvyConfig, db_pool: Arc<PgPoolSquad>) -> Result<Self> {
        let plan_repository = Arc::new(PlanPostgres::new(Arc::clone(&db_pool)));
        let subscription_repository = Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool)));
        let payment_repository = Arc::new(PaymentPostgres::new(Arc::clone(&db_pool)));
        let usage_repository = Arc::new(ResourceUsagePostgres::new(Arc::clone(&db_pool)));

        let plan_catalog = Arc::new(PlanCatalog::new(plan_repository));
        let plan_resolver = Arc::new(PlanResolver::new(
            Arc::clone(&plan_catalog),
            subscription_repository.clone(),
            config.billing.default_limits.clone(),
        ));

        let subscriptions = Arc::new(SubscriptionUseCase::new(
            Arc::clone(&plan_catalog),
            subscription_repository.clone(),
        ));
        let payments = Arc::new(PaymentUseCase::new(
            subscription_repository,
            payment_repository,
            build_gateways(config)?,
            Arc::new(TracingPaymentNotifier::new()),
            config.billing.currency.clone(),
        ));
        let quota = Arc::new(QuotaUseCase::new(plan_resolver, usage_repository));

        Ok(Self {
            plan_catalog,
            subscriptions,
            payments,
            quota,
            jwt_secret: JwtSecret::new(&config.auth.jwt_secret),
        })
    }
}

fn build_gateways(config: &DotEnvyConfig) -> Result<PaymentGateways> {
    let mut gateways = PaymentGateways::new();

    if let Some(mtn_momo) = &config.mtn_momo {
        gateways = gateways.register(Arc::new(MtnMomoClient::new(mtn_momo.clone())?));
    }
    if let Some(orange_money) = &config.orange_money {
        gateways = gateways.register(Arc::new(OrangeMoneyClient::new(orange_money.clone())?));
    }

    let methods = gateways.configured_methods();
    if methods.is_empty() {
        warn!("billing: no payment gateway configured, payments will be rejected");
    } else {
        info!(gateways = ?methods, "billing: payment gateways registered");
    }

    Ok(gateways)
}
