//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use chrono::FixedOffset;
use common::Money;
use domain::{BusinessCalendar, OrderPolicy};
use notifications::{EventBusConfig, NotificationDispatcher};
use thiserror::Error;

/// Minimum length of the token signing secret, in bytes.
pub const MIN_JWT_SECRET_LEN: usize = 32;

const DEV_JWT_SECRET: &str = "local-development-secret-change-me-0123456789";
const DEFAULT_JWT_EXPIRATION_MS: u64 = 86_400_000;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} bytes, got {0}")]
    JwtSecretTooShort(usize),

    #[error("ORDER_UTC_OFFSET is not a valid offset: {0}")]
    InvalidUtcOffset(String),
}

/// Server configuration.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`, `RUST_LOG`: bind address, port and log filter
/// - `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS`: PostgreSQL; unset selects
///   the in-memory store
/// - `ORDER_MAX_AMOUNT`, `ORDER_DAILY_LIMIT`, `ORDER_UTC_OFFSET`,
///   `ORDER_DISABLED_VALIDATORS`: the order policy
/// - `JWT_SECRET`, `JWT_EXPIRATION_MS`: token signing
/// - `NOTIFICATION_URL`, `NOTIFICATION_TIMEOUT_SECS`: outbound notifications
/// - `EVENT_BUS_CAPACITY`, `EVENT_BUS_WORKERS`: event bus sizing
///
/// Unparsable numbers fall back to their default.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub order_policy: OrderPolicy,
    pub jwt_secret: String,
    pub jwt_expiration: Duration,
    pub notification_url: Option<String>,
    pub notification_timeout: Duration,
    pub event_bus: EventBusConfig,
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let text = |key: &str| non_blank(&lookup, key);

        let defaults = Config::default();

        let calendar = match text("ORDER_UTC_OFFSET") {
            Some(raw) => BusinessCalendar::new(
                parse_utc_offset(&raw).ok_or(ConfigError::InvalidUtcOffset(raw))?,
            ),
            None => defaults.order_policy.calendar,
        };

        let order_policy = OrderPolicy {
            max_amount: parsed(&lookup, "ORDER_MAX_AMOUNT")
                .filter(Money::is_positive)
                .unwrap_or(defaults.order_policy.max_amount),
            daily_limit: parsed(&lookup, "ORDER_DAILY_LIMIT")
                .unwrap_or(defaults.order_policy.daily_limit),
            calendar,
            disabled_validators: text("ORDER_DISABLED_VALIDATORS")
                .map(|names| {
                    names
                        .split(',')
                        .map(str::trim)
                        .filter(|n| !n.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
        };

        let jwt_secret = text("JWT_SECRET").unwrap_or(defaults.jwt_secret);
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::JwtSecretTooShort(jwt_secret.len()));
        }

        Ok(Self {
            host: text("HOST").unwrap_or(defaults.host),
            port: parsed(&lookup, "PORT").unwrap_or(defaults.port),
            log_level: text("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: text("DATABASE_URL"),
            database_max_connections: parsed(&lookup, "DATABASE_MAX_CONNECTIONS")
                .filter(|n: &u32| *n > 0)
                .unwrap_or(defaults.database_max_connections),
            order_policy,
            jwt_secret,
            jwt_expiration: parsed(&lookup, "JWT_EXPIRATION_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.jwt_expiration),
            notification_url: text("NOTIFICATION_URL"),
            notification_timeout: parsed(&lookup, "NOTIFICATION_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.notification_timeout),
            event_bus: EventBusConfig {
                capacity: parsed(&lookup, "EVENT_BUS_CAPACITY")
                    .filter(|n: &usize| *n > 0)
                    .unwrap_or(defaults.event_bus.capacity),
                workers: parsed(&lookup, "EVENT_BUS_WORKERS")
                    .filter(|n: &usize| *n > 0)
                    .unwrap_or(defaults.event_bus.workers),
            },
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            database_url: None,
            database_max_connections: DEFAULT_MAX_CONNECTIONS,
            order_policy: OrderPolicy::default(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_expiration: Duration::from_millis(DEFAULT_JWT_EXPIRATION_MS),
            notification_url: None,
            notification_timeout: NotificationDispatcher::DEFAULT_TIMEOUT,
            event_bus: EventBusConfig::default(),
        }
    }
}

fn non_blank(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    non_blank(lookup, key).and_then(|v| v.parse().ok())
}

/// Parses `Z`, `UTC`, `+HH:MM`, `-HH:MM` or `+HHMM`.
fn parse_utc_offset(raw: &str) -> Option<FixedOffset> {
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 => rest.split_at(2),
        None => (rest, "0"),
    };
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 18 || minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
