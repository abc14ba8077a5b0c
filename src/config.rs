use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";

/// Application configuration with validation.
///
/// Values are layered: built-in defaults, then `config/{env}.toml` files,
/// then `APP__`-prefixed environment variables.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL (orders and provider credential store)
    pub database_url: String,

    /// Secret used to verify bearer identity tokens (minimum 64 characters)
    #[validate(length(min = 64))]
    pub jwt_secret: String,

    /// Expected token issuer (optional)
    #[serde(default)]
    pub auth_issuer: Option<String>,

    /// Expected token audience (optional)
    #[serde(default)]
    pub auth_audience: Option<String>,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Stripe key mode: "live" (default), or "test"/"sandbox"
    #[serde(default = "default_stripe_mode")]
    pub stripe_mode: String,

    /// Storefront base URL, used as the fallback redirect base
    #[serde(default = "default_app_url")]
    pub app_url: String,

    /// Stripe webhook timestamp tolerance in seconds
    #[serde(default = "default_webhook_tolerance_secs")]
    pub webhook_tolerance_secs: u64,

    /// Base URLs for the external providers; overridable for testing
    #[serde(default = "default_stripe_api_url")]
    pub stripe_api_url: String,
    #[serde(default = "default_coinbase_api_url")]
    pub coinbase_api_url: String,
    #[serde(default = "default_lemonsqueezy_api_url")]
    pub lemonsqueezy_api_url: String,
    #[serde(default = "default_reseller_api_url")]
    pub reseller_api_url: String,

    /// Timeout applied to reseller (token + balance) calls, in seconds
    #[serde(default = "default_reseller_timeout_secs")]
    pub reseller_timeout_secs: u64,

    /// Minimum reseller balance before orders start failing
    #[serde(default = "default_minimum_balance")]
    pub minimum_balance: f64,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: connect timeout (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_stripe_mode() -> String {
    "live".to_string()
}

fn default_app_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_webhook_tolerance_secs() -> u64 {
    300
}

fn default_stripe_api_url() -> String {
    "https://api.stripe.com".to_string()
}

fn default_coinbase_api_url() -> String {
    "https://api.commerce.coinbase.com".to_string()
}

fn default_lemonsqueezy_api_url() -> String {
    "https://api.lemonsqueezy.com".to_string()
}

fn default_reseller_api_url() -> String {
    "https://partners-api.airalo.com".to_string()
}

fn default_reseller_timeout_secs() -> u64 {
    30
}

fn default_minimum_balance() -> f64 {
    4.0
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_connect_timeout_secs() -> u64 {
    30
}

impl AppConfig {
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
            || self.environment.eq_ignore_ascii_case("dev")
    }

    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    /// Whether Stripe credentials should resolve to the test variant.
    pub fn stripe_uses_test_mode(&self) -> bool {
        matches!(self.stripe_mode.as_str(), "test" | "sandbox")
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

pub fn load_config() -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    // jwt_secret has no default; it must come from the environment or a
    // config file so an insecure default can never reach production.
    let config = Config::builder()
        .set_default("database_url", "sqlite://esim_store.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("jwt_secret").is_err() {
        error!("JWT secret is not configured. Set APP__JWT_SECRET with a secure random string (minimum 64 characters).");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret is required but not configured. Set APP__JWT_SECRET environment variable."
                .into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("esim_store_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

/// Config fixture shared by unit and integration tests.
#[cfg(test)]
pub(crate) fn test_config(jwt_secret: &str) -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        jwt_secret: jwt_secret.to_string(),
        auth_issuer: None,
        auth_audience: None,
        host: "127.0.0.1".into(),
        port: 8080,
        environment: "development".into(),
        log_level: "info".into(),
        log_json: false,
        stripe_mode: "live".into(),
        app_url: default_app_url(),
        webhook_tolerance_secs: 300,
        stripe_api_url: default_stripe_api_url(),
        coinbase_api_url: default_coinbase_api_url(),
        lemonsqueezy_api_url: default_lemonsqueezy_api_url(),
        reseller_api_url: default_reseller_api_url(),
        reseller_timeout_secs: 30,
        minimum_balance: 4.0,
        cors_allowed_origins: None,
        cors_allow_any_origin: false,
        db_max_connections: 10,
        db_connect_timeout_secs: 30,
    }
}
