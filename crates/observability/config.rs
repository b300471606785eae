use std::env;

#[derive(Debug, Clone)]
pub(crate) struct ServiceContext {
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
}

#[derive(Debug, Clone)]
pub(crate) struct ObservabilityConfig {
    pub(crate) service_context: ServiceContext,
    pub(crate) json_logs: bool,
    /// Warnings captured during config parsing so they can be logged after tracing is initialized.
    pub(crate) warnings: Vec<String>,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(component: &str) -> Self {
        let component = component.trim().to_string();
        let mut warnings = Vec::new();

        let service_name = env_string("SERVICE_NAME")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| component.clone());

        let environment = env_string("STAGE")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        let json_logs = match env_string("LOG_FORMAT") {
            Some(raw) => match parse_log_format(&raw) {
                Some(json) => json,
                None => {
                    warnings.push(format!(
                        "LOG_FORMAT is invalid (value: {raw}); defaulting to text"
                    ));
                    false
                }
            },
            None => false,
        };

        Self {
            service_context: ServiceContext {
                service_name,
                environment,
                component,
            },
            json_logs,
            warnings,
        }
    }
}

fn parse_log_format(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "json" => Some(true),
        "" | "text" | "pretty" | "plain" => Some(false),
        _ => None,
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok()
}
