//! Provider credential resolution.
//!
//! Secrets are looked up through an ordered chain of sources: the remote
//! credential store first, then a fixed list of environment variables per
//! provider/key. The first non-empty value wins. Nothing is cached;
//! checkout-time calls are low-frequency.

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, EntityTrait};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::entities::provider_credential;
use crate::errors::ServiceError;

/// External providers the store integrates with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Stripe,
    Coinbase,
    LemonSqueezy,
    Airalo,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Stripe => "stripe",
            Provider::Coinbase => "coinbase",
            Provider::LemonSqueezy => "lemonsqueezy",
            Provider::Airalo => "airalo",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical credential names, independent of where the value is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKey {
    LiveSecretKey,
    TestSecretKey,
    ApiKey,
    StoreId,
    WebhookSecret,
    ClientId,
    ClientSecret,
}

impl CredentialKey {
    /// Field name inside a credential store document.
    pub fn field_name(&self) -> &'static str {
        match self {
            CredentialKey::LiveSecretKey => "live_secret_key",
            CredentialKey::TestSecretKey => "test_secret_key",
            CredentialKey::ApiKey => "api_key",
            CredentialKey::StoreId => "store_id",
            CredentialKey::WebhookSecret => "webhook_secret",
            CredentialKey::ClientId => "client_id",
            CredentialKey::ClientSecret => "client_secret",
        }
    }

    /// Legacy camelCase variant still present in older store documents.
    pub fn camel_name(&self) -> &'static str {
        match self {
            CredentialKey::LiveSecretKey => "liveSecretKey",
            CredentialKey::TestSecretKey => "testSecretKey",
            CredentialKey::ApiKey => "apiKey",
            CredentialKey::StoreId => "storeId",
            CredentialKey::WebhookSecret => "webhookSecret",
            CredentialKey::ClientId => "clientId",
            CredentialKey::ClientSecret => "clientSecret",
        }
    }
}

/// Environment variable fallbacks per provider/key, in precedence order.
pub fn env_candidates(provider: Provider, key: CredentialKey) -> &'static [&'static str] {
    match (provider, key) {
        (Provider::Stripe, CredentialKey::LiveSecretKey) => {
            &["STRIPE_LIVE_SECRET_KEY", "STRIPE_SECRET_KEY", "STRIPE_KEY"]
        }
        (Provider::Stripe, CredentialKey::TestSecretKey) => {
            &["STRIPE_TEST_SECRET_KEY", "STRIPE_TEST_KEY"]
        }
        (Provider::Stripe, CredentialKey::WebhookSecret) => &["STRIPE_WEBHOOK_SECRET"],
        (Provider::Coinbase, CredentialKey::ApiKey) => {
            &["COINBASE_API_KEY", "COINBASE_PRIVATE_KEY"]
        }
        (Provider::Coinbase, CredentialKey::WebhookSecret) => &["COINBASE_WEBHOOK_SECRET"],
        (Provider::LemonSqueezy, CredentialKey::ApiKey) => &["LEMON_SQUEEZY_API_KEY"],
        (Provider::LemonSqueezy, CredentialKey::StoreId) => &["LEMON_SQUEEZY_STORE_ID"],
        (Provider::LemonSqueezy, CredentialKey::WebhookSecret) => {
            &["LEMON_SQUEEZY_WEBHOOK_SECRET"]
        }
        (Provider::Airalo, CredentialKey::ClientId) => &["AIRALO_CLIENT_ID", "AIRALO_API_KEY"],
        (Provider::Airalo, CredentialKey::ClientSecret) => &[
            "AIRALO_CLIENT_SECRET",
            "AIRALO_SECRET",
            "AIRALO_CLIENT_SECRET_PRODUCTION",
        ],
        _ => &[],
    }
}

/// A single place a credential may live.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Human-readable description of what this source would check for the
    /// given provider/key, used in `ConfigurationError` messages.
    fn describe(&self, provider: Provider, key: CredentialKey) -> String;

    async fn try_resolve(
        &self,
        provider: Provider,
        key: CredentialKey,
    ) -> Result<Option<String>, ServiceError>;
}

/// Reads the provider's row from the `provider_credentials` table.
pub struct ConfigStoreSource {
    db: Arc<DatabaseConnection>,
}

impl ConfigStoreSource {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialSource for ConfigStoreSource {
    fn describe(&self, provider: Provider, key: CredentialKey) -> String {
        format!(
            "credential store document '{}' field '{}'",
            provider,
            key.field_name()
        )
    }

    async fn try_resolve(
        &self,
        provider: Provider,
        key: CredentialKey,
    ) -> Result<Option<String>, ServiceError> {
        let row = provider_credential::Entity::find_by_id(provider.as_str().to_string())
            .one(self.db.as_ref())
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let value = row
            .secrets
            .get(key.field_name())
            .or_else(|| row.secrets.get(key.camel_name()))
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(value)
    }
}

/// Scans the fixed env-var list for the provider/key.
pub struct EnvSource;

#[async_trait]
impl CredentialSource for EnvSource {
    fn describe(&self, provider: Provider, key: CredentialKey) -> String {
        let names = env_candidates(provider, key);
        if names.is_empty() {
            format!("environment (no variables mapped for {}:{:?})", provider, key)
        } else {
            format!("environment variables {}", names.join(", "))
        }
    }

    async fn try_resolve(
        &self,
        provider: Provider,
        key: CredentialKey,
    ) -> Result<Option<String>, ServiceError> {
        for name in env_candidates(provider, key) {
            if let Ok(value) = std::env::var(name) {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    debug!(provider = %provider, var = name, "credential resolved from environment");
                    return Ok(Some(trimmed.to_string()));
                }
            }
        }
        Ok(None)
    }
}

/// Fixed in-memory credential map. Useful for tests and for deployments
/// that inject every secret at startup.
#[derive(Default)]
pub struct StaticSource {
    values: std::collections::HashMap<(Provider, CredentialKey), String>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: Provider, key: CredentialKey, value: &str) -> Self {
        self.values.insert((provider, key), value.to_string());
        self
    }
}

#[async_trait]
impl CredentialSource for StaticSource {
    fn describe(&self, provider: Provider, key: CredentialKey) -> String {
        format!("static credential map entry {}:{}", provider, key.field_name())
    }

    async fn try_resolve(
        &self,
        provider: Provider,
        key: CredentialKey,
    ) -> Result<Option<String>, ServiceError> {
        Ok(self.values.get(&(provider, key)).cloned())
    }
}

/// Ordered chain of credential sources.
pub struct CredentialResolver {
    sources: Vec<Arc<dyn CredentialSource>>,
}

impl CredentialResolver {
    pub fn new(sources: Vec<Arc<dyn CredentialSource>>) -> Self {
        Self { sources }
    }

    /// Standard chain: credential store first, environment second.
    pub fn with_store(db: Arc<DatabaseConnection>) -> Self {
        Self::new(vec![
            Arc::new(ConfigStoreSource::new(db)),
            Arc::new(EnvSource),
        ])
    }

    /// Returns the first non-empty value in source order, or a
    /// `ConfigurationError` naming every source that was checked.
    pub async fn resolve(
        &self,
        provider: Provider,
        key: CredentialKey,
    ) -> Result<String, ServiceError> {
        let mut checked = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            match source.try_resolve(provider, key).await {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => checked.push(source.describe(provider, key)),
                Err(err) => {
                    // An unreachable store must not block the env fallback.
                    warn!(provider = %provider, error = %err, "credential source failed, trying next");
                    checked.push(format!(
                        "{} (unavailable: {})",
                        source.describe(provider, key),
                        err
                    ));
                }
            }
        }

        Err(ServiceError::ConfigurationError(format!(
            "{} credential '{}' not found. Checked: {}",
            provider,
            key.field_name(),
            checked.join("; ")
        )))
    }
}
