//! Reseller (Airalo partners API) balance passthrough.
//!
//! The reseller account funds eSIM provisioning; the storefront shows a
//! warning when the balance drops below the configured minimum. Access
//! tokens are obtained per request through the client-credentials grant
//! and are not cached.

use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use utoipa::ToSchema;

use super::checkout::upstream_error;
use crate::config::AppConfig;
use crate::credentials::{CredentialKey, CredentialResolver, Provider};
use crate::errors::ServiceError;

/// Normalized balance state returned to the storefront.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSummary {
    pub balance: f64,
    pub has_insufficient_funds: bool,
    pub minimum_required: f64,
}

#[derive(Clone)]
pub struct ResellerClient {
    credentials: Arc<CredentialResolver>,
    http: reqwest::Client,
    api_url: String,
    timeout: Duration,
    minimum_balance: f64,
}

impl ResellerClient {
    pub fn new(
        credentials: Arc<CredentialResolver>,
        http: reqwest::Client,
        config: &AppConfig,
    ) -> Self {
        Self {
            credentials,
            http,
            api_url: config.reseller_api_url.clone(),
            timeout: Duration::from_secs(config.reseller_timeout_secs),
            minimum_balance: config.minimum_balance,
        }
    }

    /// Exchanges client credentials for a bearer token.
    async fn access_token(&self) -> Result<String, ServiceError> {
        let client_id = self
            .credentials
            .resolve(Provider::Airalo, CredentialKey::ClientId)
            .await?;
        let client_secret = self
            .credentials
            .resolve(Provider::Airalo, CredentialKey::ClientSecret)
            .await?;

        let response = self
            .http
            .post(format!("{}/v2/token", self.api_url))
            .timeout(self.timeout)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }

        let body: Value = response.json().await?;
        body.pointer("/data/access_token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                ServiceError::ExternalServiceError(
                    "No access token received from reseller".to_string(),
                )
            })
    }

    /// Fetches the account balance and normalizes it against the
    /// configured minimum.
    pub async fn balance(&self) -> Result<BalanceSummary, ServiceError> {
        let token = self.access_token().await?;

        let response = self
            .http
            .get(format!("{}/v2/balance", self.api_url))
            .timeout(self.timeout)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }

        let body: Value = response.json().await?;
        let data = body.get("data").ok_or_else(|| {
            ServiceError::ExternalServiceError(
                "Invalid response format from reseller API".to_string(),
            )
        })?;

        let summary = normalize_balance(data, self.minimum_balance);
        info!(
            balance = summary.balance,
            insufficient = summary.has_insufficient_funds,
            "reseller balance fetched"
        );
        Ok(summary)
    }
}

/// The reseller reports balance as a number or numeric string; missing
/// fields fall back to zero balance and the configured minimum.
fn normalize_balance(data: &Value, default_minimum: f64) -> BalanceSummary {
    let balance = read_number(data.get("balance")).unwrap_or(0.0);
    let minimum_required = read_number(data.get("minimum_required")).unwrap_or(default_minimum);
    BalanceSummary {
        balance,
        has_insufficient_funds: balance < minimum_required,
        minimum_required,
    }
}

fn read_number(value: Option<&Value>) -> Option<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().or_else(|| {
            s.trim()
                .parse::<rust_decimal::Decimal>()
                .ok()
                .and_then(|d| d.to_f64())
        }),
        _ => None,
    }
}
