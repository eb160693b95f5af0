use crate::services::remote::{ProviderError, check_response};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::Mutex;

const PROVIDER: &str = "google_drive";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Supplies bearer tokens for outgoing provider calls.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, ProviderError>;
}

/// Fixed token, for tests and pre-issued credentials.
pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String, ProviderError> {
        Ok(self.0.clone())
    }
}

/// The fields of a Google service-account key file this crate needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read {}: {}", path.display(), e))?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Exchanges a signed service-account assertion for an OAuth access token
/// and caches it until shortly before expiry.
pub struct ServiceAccountAuth {
    key: ServiceAccountKey,
    scopes: Vec<String>,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    pub fn new(key: ServiceAccountKey, scopes: Vec<String>, http: reqwest::Client) -> Self {
        Self {
            key,
            scopes,
            http,
            cached: Mutex::new(None),
        }
    }

    fn signed_assertion(&self) -> Result<String, ProviderError> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: self.scopes.join(" "),
            aud: &self.key.token_uri,
            iat: now,
            exp: now + 3600,
        };
        let key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| ProviderError::permanent(PROVIDER, format!("invalid private key: {}", e)))?;
        encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| ProviderError::permanent(PROVIDER, format!("cannot sign assertion: {}", e)))
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountAuth {
    async fn access_token(&self) -> Result<String, ProviderError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref()
            && token.expires_at > Utc::now() + Duration::seconds(60)
        {
            return Ok(token.token.clone());
        }

        let assertion = self.signed_assertion()?;
        let res = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)])
            .send()
            .await;
        let body: TokenResponse = check_response(PROVIDER, res)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::from_transport(PROVIDER, e))?;

        tracing::debug!(
            "🔑 Refreshed Drive access token for {} (expires in {}s)",
            self.key.client_email,
            body.expires_in
        );

        *cached = Some(CachedToken {
            token: body.access_token.clone(),
            expires_at: Utc::now() + Duration::seconds(body.expires_in),
        });
        Ok(body.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_file_defaults_token_uri() {
        let key: ServiceAccountKey = serde_json::from_str(
            r#"{"client_email":"lms@project.iam.gserviceaccount.com","private_key":"---"}"#,
        )
        .unwrap();
        assert_eq!(key.token_uri, "https://oauth2.googleapis.com/token");
    }

    #[tokio::test]
    async fn test_invalid_private_key_is_permanent() {
        let auth = ServiceAccountAuth::new(
            ServiceAccountKey {
                client_email: "lms@example.com".to_string(),
                private_key: "not a pem".to_string(),
                token_uri: "http://127.0.0.1:9/token".to_string(),
            },
            vec!["scope".to_string()],
            reqwest::Client::new(),
        );
        let err = auth.access_token().await.unwrap_err();
        assert!(!err.is_retryable());
    }
}
