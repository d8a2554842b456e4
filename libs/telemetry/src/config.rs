use std::env;

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub service_name: String,
    pub json: bool,
    pub filter: String,
}

impl LoggingConfig {
    pub fn from_env(default_service_name: &str) -> Self {
        let service_name = env::var("BRIDGE_SERVICE_NAME")
            .unwrap_or_else(|_| default_service_name.to_string());
        let json = env::var("BRIDGE_LOG_FORMAT")
            .map(|v| !matches!(v.to_lowercase().as_str(), "text" | "pretty" | "plain"))
            .unwrap_or(true);
        let filter = env::var("RUST_LOG")
            .or_else(|_| env::var("BRIDGE_LOG_LEVEL"))
            .unwrap_or_else(|_| "info".into());

        Self {
            service_name,
            json,
            filter,
        }
    }
}
