//! Runtime configuration, read from the environment (`.env` honoured).

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MESSENGER_URL: &str = "https://m.me/Rnold77";
pub const DEFAULT_PORT: u16 = 8083;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// How an order leaves the storefront.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CheckoutMode {
    /// Buyer sends a pre-filled message to the seller; no order record is created.
    #[default]
    Messenger,
    /// An order record is created and tracked until staff review it.
    Direct,
}

impl CheckoutMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Messenger => "messenger",
            Self::Direct => "direct",
        }
    }
}

impl FromStr for CheckoutMode {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "messenger" | "order_via_messenger" => Ok(Self::Messenger),
            "direct" | "place_order" => Ok(Self::Direct),
            other => Err(ConfigError::Invalid { key: "CHECKOUT_MODE", value: other.to_string() }),
        }
    }
}

/// The part of the configuration the checkout flow needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutSettings {
    pub mode: CheckoutMode,
    pub messenger_url: String,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self { mode: CheckoutMode::default(), messenger_url: DEFAULT_MESSENGER_URL.to_string() }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub nats_url: Option<String>,
    pub port: u16,
    pub checkout: CheckoutSettings,
    pub receipts_dir: PathBuf,
    pub receipts_public_url: String,
    pub poll_interval: Duration,
    pub receipt_max_age: chrono::Duration,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value `{value}` for {key}")]
    Invalid { key: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let port = parse_or(&get, "PORT", DEFAULT_PORT)?;
        let mode = get("CHECKOUT_MODE").map(|v| v.parse()).transpose()?.unwrap_or_default();
        let poll_secs = parse_or(&get, "ORDER_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL.as_secs())?;
        let max_age_hours = parse_or(&get, "RECEIPT_MAX_AGE_HOURS", 24i64)?;
        let receipts_dir = PathBuf::from(get("RECEIPTS_DIR").unwrap_or_else(|| "./receipts".to_string()));
        Ok(Self {
            database_url,
            nats_url: get("NATS_URL").filter(|v| !v.trim().is_empty()),
            port,
            checkout: CheckoutSettings {
                mode,
                messenger_url: get("MESSENGER_URL").unwrap_or_else(|| DEFAULT_MESSENGER_URL.to_string()),
            },
            receipts_public_url: get("RECEIPTS_PUBLIC_URL").unwrap_or_else(|| format!("http://localhost:{port}/receipts")),
            receipts_dir,
            poll_interval: Duration::from_secs(poll_secs.max(1)),
            receipt_max_age: chrono::Duration::hours(max_age_hours),
        })
    }
}

fn parse_or<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}
