mod config;
pub mod redact;

use anyhow::Result;
use config::ObservabilityConfig;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub fn init_observability(component: &str) -> Result<()> {
    let config = ObservabilityConfig::from_env(component);

    // RUST_LOG wins; default to info so provider payload traces stay out of production logs.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Local time so `TZ=Africa/Douala` shows `+01:00` in logs.
    let timer = tracing_subscriber::fmt::time::ChronoLocal::rfc_3339();

    let (text_layer, json_layer) = if config.json_logs {
        (
            None,
            Some(tracing_subscriber::fmt::layer().json().with_timer(timer)),
        )
    } else {
        (Some(tracing_subscriber::fmt::layer().with_timer(timer)), None)
    };

    tracing_subscriber::registry()
        .with(text_layer)
        .with(json_layer)
        .with(env_filter)
        .try_init()?;

    for warning in &config.warnings {
        warn!(
            service = %config.service_context.service_name,
            environment = %config.service_context.environment,
            component = %config.service_context.component,
            warning = %warning,
            "observability: config warning"
        );
    }

    info!(
        service = %config.service_context.service_name,
        environment = %config.service_context.environment,
        component = %config.service_context.component,
        json_logs = config.json_logs,
        "observability: tracing initialized"
    );

    Ok(())
}
