//! Client defaults sourced from the environment.
//!
//! | Variable                          | Meaning                         | Default |
//! |-----------------------------------|---------------------------------|---------|
//! | `CTI_GRAPHQL_TIMEOUT`             | request timeout                 | `10s`   |
//! | `CTI_GRAPHQL_HEALTH_CHECK_TIMEOUT`| health check timeout            | `3s`    |
//! | `CTI_GRAPHQL_PAGE_SIZE`           | default `first` of list queries | unset   |
//! | `CTI_GRAPHQL_ORDER_BY`            | default `orderBy`               | unset   |
//! | `CTI_GRAPHQL_ORDER_MODE`          | default `orderMode` (`asc`/`desc`) | unset |
//!
//! Durations accept a bare number of seconds or a `ms`/`s`/`m`/`h` suffix.

use std::time::Duration;

use crate::error::GraphqlClientError;
use crate::filter::OrderMode;

/// Prefix shared by every environment variable.
pub const ENV_PREFIX: &str = "CTI_GRAPHQL_";

/// Environment-level configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientEnvConfig {
    /// Request timeout.
    pub timeout: Duration,

    /// Timeout of the optional health check run while building the client.
    pub health_check_timeout: Duration,

    /// Default page size of list queries.
    pub page_size: Option<u32>,

    /// Default ordering field of list queries.
    pub order_by: Option<String>,

    /// Default ordering mode of list queries.
    pub order_mode: Option<OrderMode>,
}

const fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

const fn default_health_check_timeout() -> Duration {
    Duration::from_secs(3)
}

impl Default for ClientEnvConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            health_check_timeout: default_health_check_timeout(),
            page_size: None,
            order_by: None,
            order_mode: None,
        }
    }
}

impl ClientEnvConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, GraphqlClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, which receives full variable names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GraphqlClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();
        if let Some(raw) = read("TIMEOUT") {
            config.timeout = parse_duration("TIMEOUT", &raw)?;
        }
        if let Some(raw) = read("HEALTH_CHECK_TIMEOUT") {
            config.health_check_timeout = parse_duration("HEALTH_CHECK_TIMEOUT", &raw)?;
        }
        if let Some(raw) = read("PAGE_SIZE") {
            config.page_size = Some(raw.parse().map_err(|_| invalid("PAGE_SIZE", &raw))?);
        }
        config.order_by = read("ORDER_BY");
        if let Some(raw) = read("ORDER_MODE") {
            config.order_mode = Some(raw.parse().map_err(|_| invalid("ORDER_MODE", &raw))?);
        }
        Ok(config)
    }
}

fn invalid(name: &str, raw: &str) -> GraphqlClientError {
    GraphqlClientError::Config(format!("invalid value '{raw}' for {ENV_PREFIX}{name}"))
}

fn parse_duration(name: &str, raw: &str) -> Result<Duration, GraphqlClientError> {
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (amount, unit) = raw.split_at(split);
    let amount: u64 = amount.parse().map_err(|_| invalid(name, raw))?;
    let secs = |factor: u64| {
        amount
            .checked_mul(factor)
            .map(Duration::from_secs)
            .ok_or_else(|| invalid(name, raw))
    };
    match unit {
        "" | "s" => Ok(Duration::from_secs(amount)),
        "ms" => Ok(Duration::from_millis(amount)),
        "m" => secs(60),
        "h" => secs(3600),
        _ => Err(invalid(name, raw)),
    }
}
