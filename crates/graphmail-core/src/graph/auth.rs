//! Client-credential authentication against Entra ID.
//!
//! The app authenticates as itself with a tenant ID, client ID and client
//! secret. Tokens are cached in memory and refreshed shortly before expiry,
//! so callers only ever ask for the current bearer string. The exchange
//! itself is done by the `oauth2` crate over the shared reqwest client.

use std::sync::Mutex;

use chrono::{DateTime, Duration, TimeZone, Utc};
use oauth2::basic::{BasicClient, BasicErrorResponse};
use oauth2::{AuthType, ClientId, ClientSecret, RequestTokenError, Scope, TokenResponse, TokenUrl};
use reqwest::Client;

use crate::CoreError;
use crate::config::GraphConfig;

/// Environment variable holding the application (client) ID.
pub const CLIENT_ID_VAR: &str = "CLIENT_ID";
/// Environment variable holding the client secret.
pub const CLIENT_SECRET_VAR: &str = "SECRET";
/// Environment variable holding the directory (tenant) ID.
pub const TENANT_ID_VAR: &str = "TENANT_ID";

/// Tokens this close to expiry are refreshed before use.
const REFRESH_SKEW_SECS: i64 = 300;
/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_LIFETIME_SECS: i64 = 3600;

/// The tenant/client/secret triple for the client-credential flow.
#[derive(Clone)]
pub struct Credentials {
    /// Directory (tenant) ID.
    pub tenant_id: String,
    /// Application (client) ID.
    pub client_id: String,
    /// Client secret.
    pub client_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Read `CLIENT_ID`, `SECRET` and `TENANT_ID` from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming every variable that is unset or empty.
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build credentials from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming every key that is missing or empty.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut read = |key: &'static str| {
            let value = lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
            if value.is_none() {
                missing.push(key);
            }
            value.unwrap_or_default()
        };

        let client_id = read(CLIENT_ID_VAR);
        let client_secret = read(CLIENT_SECRET_VAR);
        let tenant_id = read(TENANT_ID_VAR);

        if !missing.is_empty() {
            return Err(CoreError::Config(format!(
                "missing credentials: {} must be set",
                missing.join(", ")
            )));
        }

        Ok(Self {
            tenant_id,
            client_id,
            client_secret,
        })
    }
}

/// A bearer token and its expiry.
#[derive(Clone)]
pub struct AccessToken {
    /// The bearer string.
    pub secret: String,
    /// Absolute expiry time.
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl AccessToken {
    /// Whether the token should be refreshed at `now`.
    #[must_use]
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(REFRESH_SKEW_SECS) <= now
    }
}

/// Exchanges client credentials for app-only tokens and caches the result.
#[derive(Debug)]
pub struct ClientSecretCredential {
    http_client: Client,
    credentials: Credentials,
    token_url: String,
    scope: String,
    cached: Mutex<Option<AccessToken>>,
}

impl ClientSecretCredential {
    /// Create a credential for the given tenant, sharing an HTTP client.
    #[must_use]
    pub fn new(http_client: Client, credentials: Credentials, config: &GraphConfig) -> Self {
        let token_url = format!(
            "{}/{}/oauth2/v2.0/token",
            config.authority_url.trim_end_matches('/'),
            urlencoding::encode(&credentials.tenant_id)
        );
        Self {
            http_client,
            credentials,
            token_url,
            scope: config.scope.clone(),
            cached: Mutex::new(None),
        }
    }

    /// The token endpoint this credential posts to.
    #[must_use]
    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Return a valid token, requesting a new one when the cache is empty or stale.
    ///
    /// # Errors
    ///
    /// Returns an authentication error if the token endpoint is unreachable
    /// or rejects the credentials.
    pub async fn get_token(&self) -> Result<AccessToken, CoreError> {
        if let Some(token) = self.cached_token()? {
            log::trace!("using cached app token (expires {})", token.expires_at);
            return Ok(token);
        }

        let token = self.request_token().await?;
        *self
            .cached
            .lock()
            .map_err(|e| CoreError::Other(format!("token cache poisoned: {e}")))? =
            Some(token.clone());
        Ok(token)
    }

    fn cached_token(&self) -> Result<Option<AccessToken>, CoreError> {
        let cached = self
            .cached
            .lock()
            .map_err(|e| CoreError::Other(format!("token cache poisoned: {e}")))?;
        Ok(cached
            .as_ref()
            .filter(|t| !t.needs_refresh(Utc::now()))
            .cloned())
    }

    async fn request_token(&self) -> Result<AccessToken, CoreError> {
        log::debug!(
            "requesting app token for client {} from {}",
            self.credentials.client_id,
            self.token_url
        );

        let token_url = TokenUrl::new(self.token_url.clone())
            .map_err(|e| CoreError::Auth(format!("invalid token URL {}: {e}", self.token_url)))?;
        let oauth = BasicClient::new(ClientId::new(self.credentials.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.credentials.client_secret.clone()))
            .set_auth_type(AuthType::RequestBody)
            .set_token_uri(token_url);

        let response = oauth
            .exchange_client_credentials()
            .add_scope(Scope::new(self.scope.clone()))
            .request_async(&self.http_client)
            .await
            .map_err(token_error)?;

        let lifetime = response
            .expires_in()
            .and_then(|d| Duration::from_std(d).ok())
            .unwrap_or_else(|| Duration::seconds(DEFAULT_LIFETIME_SECS));
        Ok(AccessToken {
            secret: response.access_token().secret().clone(),
            expires_at: Utc::now() + lifetime,
        })
    }
}

fn token_error<RE>(err: RequestTokenError<RE, BasicErrorResponse>) -> CoreError
where
    RE: std::error::Error + 'static,
{
    match err {
        RequestTokenError::ServerResponse(resp) => {
            let detail = resp.error_description().map_or_else(
                || resp.error().to_string(),
                |desc| format!("{}: {desc}", resp.error()),
            );
            CoreError::Auth(format!("token request rejected: {detail}"))
        }
        other => CoreError::Auth(format!("token request failed: {other}")),
    }
}

/// Claims of an app-only Graph token that are worth showing to the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenClaims {
    /// `appid` claim.
    pub app_id: Option<String>,
    /// `app_displayname` claim.
    pub app_display_name: Option<String>,
    /// `tid` claim.
    pub tenant_id: Option<String>,
    /// Application permissions granted to the app.
    pub roles: Vec<String>,
    /// `exp` claim.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Decode the payload of a JWT without verifying its signature.
///
/// # Errors
///
/// Returns an error if the token is not a three-part JWT or the payload is not JSON.
pub fn decode_claims(token: &str) -> Result<TokenClaims, CoreError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(CoreError::Auth(
            "invalid JWT format - expected 3 parts".to_string(),
        ));
    }

    let payload = base64_decode(parts[1])
        .map_err(|e| CoreError::Auth(format!("base64 decode: {e}")))?;

    let claims: serde_json::Value = serde_json::from_str(&payload)
        .map_err(|e| CoreError::Serialization(format!("parsing claims: {e}")))?;

    let text = |key: &str| claims[key].as_str().map(str::to_string);

    let roles = claims["roles"]
        .as_array()
        .map(|roles| {
            roles
                .iter()
                .filter_map(|r| r.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    Ok(TokenClaims {
        app_id: text("appid"),
        app_display_name: text("app_displayname"),
        tenant_id: text("tid"),
        roles,
        expires_at: claims["exp"]
            .as_i64()
            .and_then(|exp| Utc.timestamp_opt(exp, 0).single()),
    })
}

fn base64_decode(input: &str) -> Result<String, Box<dyn std::error::Error>> {
    use base64::Engine;

    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(input.trim_end_matches('='))?;
    Ok(String::from_utf8(decoded)?)
}
