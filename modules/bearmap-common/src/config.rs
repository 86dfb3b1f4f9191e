use std::env;

/// Ingestion configuration loaded from environment variables.
///
/// `DATABASE_URL` is optional on purpose: without it the coordinator runs
/// in degraded mode and writes candidate batches to JSON files instead.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub kumap_api_key: Option<String>,
    pub browserless_url: String,
    pub browserless_token: Option<String>,
    pub data_dir: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").ok(),
            kumap_api_key: env::var("KUMAP_API_KEY").ok(),
            browserless_url: env::var("BROWSERLESS_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            browserless_token: env::var("BROWSERLESS_TOKEN").ok(),
            data_dir: env::var("BEARMAP_DATA_DIR").unwrap_or_else(|_| "data".to_string()),
        }
    }

    /// Log the effective configuration without leaking secrets.
    pub fn log_redacted(&self) {
        tracing::info!(
            database = if self.database_url.is_some() { "configured" } else { "absent (file sink)" },
            kumap_api_key = if self.kumap_api_key.is_some() { "set" } else { "unset" },
            browserless_url = self.browserless_url.as_str(),
            data_dir = self.data_dir.as_str(),
            "Loaded configuration"
        );
    }
}
