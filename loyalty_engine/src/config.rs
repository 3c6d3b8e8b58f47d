use std::time::Duration;

use log::*;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/loyalty.db";
const DEFAULT_ACCRUAL_URL: &str = "http://localhost:8080";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Engine configuration, read from the environment.
///
/// Process bootstrap lives outside this crate; the engine only needs to know where its database is, where the accrual
/// oracle lives, and how often to poll it.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database_url: String,
    /// Base URL of the accrual oracle, e.g. `http://accrual.internal:8080`.
    pub accrual_url: String,
    /// Interval between reconciliation cycle triggers.
    pub poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            accrual_url: DEFAULT_ACCRUAL_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl EngineConfig {
    pub fn from_env_or_default() -> Self {
        let database_url = std::env::var("LOYALTY_DATABASE_URL").unwrap_or_else(|_| {
            warn!("LOYALTY_DATABASE_URL not set, using {DEFAULT_DATABASE_URL}");
            DEFAULT_DATABASE_URL.to_string()
        });
        let accrual_url = std::env::var("LOYALTY_ACCRUAL_URL").unwrap_or_else(|_| {
            warn!("LOYALTY_ACCRUAL_URL not set, using {DEFAULT_ACCRUAL_URL}");
            DEFAULT_ACCRUAL_URL.to_string()
        });
        let poll_interval = std::env::var("LOYALTY_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| {
                warn!("LOYALTY_POLL_INTERVAL_SECS not set or unparseable, using {}s", DEFAULT_POLL_INTERVAL.as_secs());
                DEFAULT_POLL_INTERVAL
            });
        Self { database_url, accrual_url, poll_interval }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::EngineConfig;

    // the only test in the suite that touches the LOYALTY_* environment
    #[test]
    fn reads_the_environment_with_fallbacks() {
        std::env::set_var("LOYALTY_DATABASE_URL", "sqlite://test.db");
        std::env::set_var("LOYALTY_ACCRUAL_URL", "http://accrual.local:8080");
        std::env::set_var("LOYALTY_POLL_INTERVAL_SECS", "5");
        let config = EngineConfig::from_env_or_default();
        assert_eq!(config.database_url, "sqlite://test.db");
        assert_eq!(config.accrual_url, "http://accrual.local:8080");
        assert_eq!(config.poll_interval, Duration::from_secs(5));

        std::env::set_var("LOYALTY_POLL_INTERVAL_SECS", "not-a-number");
        let config = EngineConfig::from_env_or_default();
        assert_eq!(config.poll_interval, EngineConfig::default().poll_interval);
    }
}
