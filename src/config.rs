use std::net::IpAddr;
use std::time::Duration;

use crate::sync::RetryPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub api_base_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    pub probe_path: String,
    /// `None` disables the connectivity probe.
    pub probe_interval: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env_or("SYNCQUEUE_DATABASE_URL", "sqlite://syncqueue.db?mode=rwc");
        let api_base_url = env_required("SYNCQUEUE_API_BASE_URL")?;

        let host: IpAddr = env_or("SYNCQUEUE_HOST", "127.0.0.1")
            .parse()
            .map_err(|e| format!("Invalid SYNCQUEUE_HOST: {e}"))?;

        let port: u16 = env_or("SYNCQUEUE_PORT", "3030")
            .parse()
            .map_err(|e| format!("Invalid SYNCQUEUE_PORT: {e}"))?;

        let log_level = env_or("SYNCQUEUE_LOG_LEVEL", "info");

        let max_retries: u32 = env_or("SYNCQUEUE_MAX_RETRIES", "5")
            .parse()
            .map_err(|e| format!("Invalid SYNCQUEUE_MAX_RETRIES: {e}"))?;
        if max_retries == 0 {
            return Err("SYNCQUEUE_MAX_RETRIES must be at least 1".to_string());
        }

        let base_delay_ms: u64 = env_or("SYNCQUEUE_BASE_DELAY_MS", "1000")
            .parse()
            .map_err(|e| format!("Invalid SYNCQUEUE_BASE_DELAY_MS: {e}"))?;

        let max_delay_ms: u64 = env_or("SYNCQUEUE_MAX_DELAY_MS", "16000")
            .parse()
            .map_err(|e| format!("Invalid SYNCQUEUE_MAX_DELAY_MS: {e}"))?;

        let request_timeout_secs: u64 = env_or("SYNCQUEUE_REQUEST_TIMEOUT_SECS", "30")
            .parse()
            .map_err(|e| format!("Invalid SYNCQUEUE_REQUEST_TIMEOUT_SECS: {e}"))?;

        let probe_path = env_or("SYNCQUEUE_PROBE_PATH", "/health");

        let probe_interval_secs: u64 = env_or("SYNCQUEUE_PROBE_INTERVAL_SECS", "10")
            .parse()
            .map_err(|e| format!("Invalid SYNCQUEUE_PROBE_INTERVAL_SECS: {e}"))?;

        Ok(Config {
            database_url,
            api_base_url,
            host,
            port,
            log_level,
            retry: RetryPolicy {
                max_retries,
                base_delay: Duration::from_millis(base_delay_ms),
                max_delay: Duration::from_millis(max_delay_ms),
            },
            request_timeout: Duration::from_secs(request_timeout_secs),
            probe_path,
            probe_interval: (probe_interval_secs > 0)
                .then(|| Duration::from_secs(probe_interval_secs)),
        })
    }

    pub fn probe_url(&self) -> String {
        format!("{}{}", self.api_base_url.trim_end_matches('/'), self.probe_path)
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
