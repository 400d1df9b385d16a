//! # Credentials
//!
//! How requests to the database authenticate.
//!
//! - Service account: sign an RS256 assertion with the account key, trade it for an OAuth2
//!   access token at the account's token endpoint, send it as `access_token`
//! - Legacy database secret: sent as `auth`
//! - Anonymous: nothing, for the local emulator
//!
//! Access tokens are cached and refreshed one minute before they expire.
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::StoreError;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const SCOPES: &str =
    "https://www.googleapis.com/auth/firebase.database https://www.googleapis.com/auth/userinfo.email";
const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Deserialize, Clone)]
pub struct ServiceAccount {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccount {
    pub fn from_json(blob: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(blob)
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
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

pub struct TokenSource {
    account: ServiceAccount,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    pub fn new(account: ServiceAccount) -> Self {
        Self {
            account,
            cached: Mutex::new(None),
        }
    }

    pub async fn token(&self, client: &Client) -> Result<String, StoreError> {
        let mut cached = self.cached.lock().await;

        if let Some(current) = cached.as_ref() {
            if current.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > Utc::now() {
                return Ok(current.token.clone());
            }
        }

        let fresh = self.fetch(client).await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);

        Ok(token)
    }

    async fn fetch(&self, client: &Client) -> Result<CachedToken, StoreError> {
        let now = Utc::now();
        let claims = Claims {
            iss: &self.account.client_email,
            scope: SCOPES,
            aud: &self.account.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };

        let key = EncodingKey::from_rsa_pem(self.account.private_key.as_bytes())
            .map_err(|e| StoreError::Credentials(e.to_string()))?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| StoreError::Credentials(e.to_string()))?;

        let response = client
            .post(&self.account.token_uri)
            .form(&[("grant_type", GRANT_TYPE), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Credentials(format!("{status}: {body}")));
        }

        let token: TokenResponse = response.json().await?;
        debug!("Access token refreshed for {}", self.account.client_email);

        Ok(CachedToken {
            token: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in),
        })
    }
}

pub enum Credentials {
    Anonymous,
    Secret(String),
    ServiceAccount(TokenSource),
}

impl Credentials {
    pub fn service_account(account: ServiceAccount) -> Self {
        Self::ServiceAccount(TokenSource::new(account))
    }

    /// Query parameter carrying the credential, if any.
    pub async fn query_param(
        &self,
        client: &Client,
    ) -> Result<Option<(&'static str, String)>, StoreError> {
        match self {
            Self::Anonymous => Ok(None),
            Self::Secret(secret) => Ok(Some(("auth", secret.clone()))),
            Self::ServiceAccount(source) => Ok(Some(("access_token", source.token(client).await?))),
        }
    }
}
