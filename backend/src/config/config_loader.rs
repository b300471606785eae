use anyhow::{Context, Result, bail};
use crates::{
    domain::value_objects::plans::PlanLimits,
    payments::{mtn_momo::MtnMomoConfig, orange_money::OrangeMoneyConfig},
};
use url::Url;

use super::{
    config_model::{AuthSecret, BackendServer, Billing, Database, DotEnvyConfig},
    stage::Stage,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let stage = get_stage();

    let backend_server = BackendServer {
        port: required("SERVER_PORT_BACKEND")?
            .parse()
            .context("SERVER_PORT_BACKEND is invalid")?,
        body_limit: required("SERVER_BODY_LIMIT")?
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: required("SERVER_TIMEOUT")?
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
        max_connections: optional("DATABASE_MAX_CONNECTIONS")
            .map(|raw| raw.parse::<u32>())
            .transpose()
            .context("DATABASE_MAX_CONNECTIONS is invalid")?
            .unwrap_or(10),
    };

    let auth = AuthSecret {
        jwt_secret: required("JWT_SECRET")?,
    };

    let billing = Billing {
        currency: optional("BILLING_CURRENCY").unwrap_or_else(|| "XAF".to_string()),
        default_limits: PlanLimits {
            max_guests: Some(limit_or_zero("BILLING_DEFAULT_MAX_GUESTS")?),
            max_collaborators: Some(limit_or_zero("BILLING_DEFAULT_MAX_COLLABORATORS")?),
            max_photos: Some(limit_or_zero("BILLING_DEFAULT_MAX_PHOTOS")?),
            events_per_period: Some(limit_or_zero("BILLING_DEFAULT_EVENTS_PER_PERIOD")?),
        },
    };

    let mtn_momo = load_mtn_momo()?;
    let orange_money = load_orange_money()?;

    if stage == Stage::Production {
        let secrets = [
            mtn_momo.as_ref().map(|c| c.callback_secret.as_str()),
            orange_money.as_ref().map(|c| c.callback_secret.as_str()),
        ];
        if secrets.into_iter().flatten().any(|secret| secret.len() < 16) {
            bail!("callback secrets must be at least 16 characters in production");
        }
    }

    Ok(DotEnvyConfig {
        stage,
        backend_server,
        database,
        auth,
        billing,
        mtn_momo,
        orange_money,
    })
}

pub fn get_stage() -> Stage {
    dotenvy::dotenv().ok();

    let stage_str = std::env::var("STAGE").unwrap_or("".to_string());
    Stage::try_from(&stage_str).unwrap_or_default()
}

/// Enabled when `MTN_MOMO_BASE_URL` is set; every other MTN variable is then required.
fn load_mtn_momo() -> Result<Option<MtnMomoConfig>> {
    let Some(base_url) = optional("MTN_MOMO_BASE_URL") else {
        return Ok(None);
    };

    Ok(Some(MtnMomoConfig {
        base_url: Url::parse(&base_url).context("MTN_MOMO_BASE_URL is invalid")?,
        subscription_key: required("MTN_MOMO_SUBSCRIPTION_KEY")?,
        api_user: required("MTN_MOMO_API_USER")?,
        api_key: required("MTN_MOMO_API_KEY")?,
        target_environment: optional("MTN_MOMO_TARGET_ENVIRONMENT")
            .unwrap_or_else(|| "sandbox".to_string()),
        callback_url: optional("MTN_MOMO_CALLBACK_URL"),
        callback_secret: required("MTN_MOMO_CALLBACK_SECRET")?,
    }))
}

/// Enabled when `ORANGE_MONEY_BASE_URL` is set.
fn load_orange_money() -> Result<Option<OrangeMoneyConfig>> {
    let Some(base_url) = optional("ORANGE_MONEY_BASE_URL") else {
        return Ok(None);
    };

    Ok(Some(OrangeMoneyConfig {
        base_url: Url::parse(&base_url).context("ORANGE_MONEY_BASE_URL is invalid")?,
        consumer_key: required("ORANGE_MONEY_CONSUMER_KEY")?,
        consumer_secret: required("ORANGE_MONEY_CONSUMER_SECRET")?,
        auth_token: required("ORANGE_MONEY_AUTH_TOKEN")?,
        channel_user_msisdn: required("ORANGE_MONEY_CHANNEL_MSISDN")?,
        channel_pin: required("ORANGE_MONEY_CHANNEL_PIN")?,
        notify_url: optional("ORANGE_MONEY_NOTIFY_URL"),
        callback_secret: required("ORANGE_MONEY_CALLBACK_SECRET")?,
    }))
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{key} is invalid"))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn limit_or_zero(key: &str) -> Result<i64> {
    let Some(raw) = optional(key) else {
        return Ok(0);
    };
    let limit: i64 = raw.parse().with_context(|| format!("{key} is invalid"))?;
    if limit < -1 {
        bail!("{key} must be -1 (unlimited) or a non-negative number");
    }
    Ok(limit)
}
