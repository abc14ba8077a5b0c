//! Bearer-token identity verification for customer-facing endpoints.
//!
//! Tokens are HS256 JWTs issued by the storefront's identity layer.
//! Verification fails closed: any decode or claim problem yields 401,
//! never an anonymous pass-through.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tracing::debug;

use crate::config::AppConfig;
use crate::errors::ServiceError;

#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: usize,
}

/// An authenticated caller.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub email: Option<String>,
}

#[derive(Clone)]
pub struct IdentityVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl IdentityVerifier {
    pub fn new(config: &AppConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = &config.auth_issuer {
            validation.set_issuer(&[issuer]);
        }
        if let Some(audience) = &config.auth_audience {
            validation.set_audience(&[audience]);
        }
        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    /// Verifies the value of an `Authorization` header.
    pub fn verify_header(&self, header: Option<&str>) -> Result<Identity, ServiceError> {
        let header = header.ok_or_else(|| {
            ServiceError::Unauthorized("Missing or invalid authorization header".to_string())
        })?;
        let token = header.strip_prefix("Bearer ").ok_or_else(|| {
            ServiceError::Unauthorized("Missing or invalid authorization header".to_string())
        })?;
        self.verify_token(token)
    }

    pub fn verify_token(&self, token: &str) -> Result<Identity, ServiceError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|err| {
            debug!(error = %err, "token verification failed");
            ServiceError::Unauthorized("Unauthorized".to_string())
        })?;
        Ok(Identity {
            user_id: data.claims.sub,
            email: data.claims.email,
        })
    }
}
