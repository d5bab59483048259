use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use tracing::info;
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_WEBHOOK_TOLERANCE_SECS: u64 = 300;
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 30;

/// Application configuration, layered from `config/default.toml`,
/// `config/{environment}.toml` and `APP__`-prefixed environment variables.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// JWT signing secret (HS256)
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// Access token lifetime in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration: u64,

    /// Refresh token lifetime in seconds
    #[serde(default = "default_refresh_expiration")]
    pub refresh_token_expiration: u64,

    /// Server bind host
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment ("development", "test", "production")
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level filter
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON
    #[serde(default)]
    pub log_json: bool,

    /// Run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,

    /// Stripe secret API key
    pub stripe_secret_key: String,

    /// Shared secret for verifying webhook signatures. A missing value is a
    /// startup failure, never a per-request condition.
    #[validate(length(min = 1))]
    pub stripe_webhook_secret: String,

    /// Accepted clock skew for webhook signature timestamps
    #[serde(default = "default_webhook_tolerance")]
    pub stripe_webhook_tolerance_secs: u64,

    /// Base URL of the payment processor API (overridable for tests)
    #[serde(default = "default_stripe_api_base")]
    pub stripe_api_base: String,

    /// Outbound gateway request timeout
    #[serde(default = "default_gateway_timeout")]
    pub gateway_timeout_secs: u64,

    /// Where the processor sends the customer after payment
    #[serde(default = "default_checkout_success_url")]
    pub checkout_success_url: String,
    #[serde(default = "default_checkout_cancel_url")]
    pub checkout_cancel_url: String,

    /// Currency for checkout line items
    #[serde(default = "default_currency")]
    pub default_currency: String,

    /// Rate-limit counter settings; the store itself is injected (in-memory
    /// for single-instance, Redis for multi-instance deployments).
    #[serde(default = "default_rate_limit_requests")]
    pub rate_limit_requests_per_window: u32,
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_seconds: u64,
    #[serde(default)]
    pub rate_limit_use_redis: bool,

    /// Redis connection URL (required when rate_limit_use_redis is set)
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Capacity of the domain event channel
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

fn default_jwt_expiration() -> u64 {
    3600
}
fn default_refresh_expiration() -> u64 {
    86_400 * 7
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_webhook_tolerance() -> u64 {
    DEFAULT_WEBHOOK_TOLERANCE_SECS
}
fn default_stripe_api_base() -> String {
    "https://api.stripe.com/v1".to_string()
}
fn default_gateway_timeout() -> u64 {
    DEFAULT_GATEWAY_TIMEOUT_SECS
}
fn default_checkout_success_url() -> String {
    "http://localhost:3000/checkout/success".to_string()
}
fn default_checkout_cancel_url() -> String {
    "http://localhost:3000/cart".to_string()
}
fn default_currency() -> String {
    "USD".to_string()
}
fn default_rate_limit_requests() -> u32 {
    100
}
fn default_rate_limit_window_secs() -> u64 {
    60
}
fn default_event_channel_capacity() -> usize {
    256
}

impl AppConfig {
    /// Loads configuration from files and environment, then validates it.
    pub fn load() -> Result<Self, ConfigError> {
        let environment = env::var("APP_ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

        let mut builder = Config::builder();
        let default_path = Path::new(CONFIG_DIR).join("default.toml");
        let env_path = Path::new(CONFIG_DIR).join(format!("{environment}.toml"));
        builder = builder
            .add_source(File::from(default_path).required(false))
            .add_source(File::from(env_path).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"));

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config
            .validate()
            .map_err(|e| ConfigError::Message(format!("invalid configuration: {e}")))?;

        info!(environment = %config.environment, "configuration loaded");
        Ok(config)
    }

    /// Constructs a configuration directly; used by tests and tools.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        database_url: String,
        jwt_secret: String,
        stripe_secret_key: String,
        stripe_webhook_secret: String,
        host: String,
        port: u16,
        environment: String,
    ) -> Self {
        Self {
            database_url,
            jwt_secret,
            jwt_expiration: default_jwt_expiration(),
            refresh_token_expiration: default_refresh_expiration(),
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            stripe_secret_key,
            stripe_webhook_secret,
            stripe_webhook_tolerance_secs: default_webhook_tolerance(),
            stripe_api_base: default_stripe_api_base(),
            gateway_timeout_secs: default_gateway_timeout(),
            checkout_success_url: default_checkout_success_url(),
            checkout_cancel_url: default_checkout_cancel_url(),
            default_currency: default_currency(),
            rate_limit_requests_per_window: default_rate_limit_requests(),
            rate_limit_window_seconds: default_rate_limit_window_secs(),
            rate_limit_use_redis: false,
            redis_url: None,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
