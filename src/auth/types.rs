//! Auth configuration and token types
//!
//! [`AuthSpec`] carries only the *lookup keys* (environment variable names)
//! needed to materialize credentials; no secret value ever lives in a config
//! document. [`TokenRecord`] is the persisted OAuth2 token pair.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Safety buffer subtracted from the server-declared token lifetime
pub const EXPIRY_BUFFER_SECS: i64 = 60;

/// Authentication specification (environment-keyed, no embedded secrets)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthSpec {
    /// No authentication
    #[default]
    None,

    /// Bearer token read from an environment variable
    BearerEnv {
        /// Environment variable holding the token
        #[serde(default = "default_bearer_var")]
        token_var: String,
    },

    /// Static token sent in a custom header
    HeaderToken {
        /// Header name (e.g. "X-API-Key")
        header: String,
        /// Environment variable holding the token
        token_var: String,
    },

    /// Static token sent as a query parameter
    QueryToken {
        /// Query parameter name (e.g. "api_key")
        param: String,
        /// Environment variable holding the token
        token_var: String,
    },

    /// OAuth2 authorization-code + refresh flow
    Oauth2 {
        /// Environment variable holding the token endpoint URL
        #[serde(default = "default_token_url_var")]
        token_url_var: String,
        /// Environment variable holding the client id
        #[serde(default = "default_client_id_var")]
        client_id_var: String,
        /// Environment variable holding the client secret
        #[serde(default = "default_client_secret_var")]
        client_secret_var: String,
        /// Environment variable holding the redirect URI
        #[serde(default = "default_redirect_uri_var")]
        redirect_uri_var: String,
        /// Environment variable holding the scope (optional at runtime)
        #[serde(default = "default_scope_var")]
        scope_var: String,
        /// Token cache file; defaults to `.secrets/tokens_{client_id}.json`
        #[serde(default)]
        token_cache_path: Option<String>,
    },
}

fn default_bearer_var() -> String {
    "API_BEARER_TOKEN".to_string()
}

fn default_token_url_var() -> String {
    "OAUTH_TOKEN_URL".to_string()
}

fn default_client_id_var() -> String {
    "OAUTH_CLIENT_ID".to_string()
}

fn default_client_secret_var() -> String {
    "OAUTH_CLIENT_SECRET".to_string()
}

fn default_redirect_uri_var() -> String {
    "OAUTH_REDIRECT_URI".to_string()
}

fn default_scope_var() -> String {
    "OAUTH_SCOPE".to_string()
}

/// Materialized OAuth2 client credentials
#[derive(Debug, Clone)]
pub struct OAuth2Credentials {
    /// Token endpoint URL
    pub token_url: String,
    /// Client id
    pub client_id: String,
    /// Client secret
    pub client_secret: String,
    /// Redirect URI registered with the provider
    pub redirect_uri: String,
    /// Requested scope, if any
    pub scope: Option<String>,
}

impl OAuth2Credentials {
    /// Resolve credentials from the environment variables named by the spec
    pub fn from_env(
        token_url_var: &str,
        client_id_var: &str,
        client_secret_var: &str,
        redirect_uri_var: &str,
        scope_var: &str,
    ) -> Result<Self> {
        Ok(Self {
            token_url: require_env(token_url_var)?,
            client_id: require_env(client_id_var)?,
            client_secret: require_env(client_secret_var)?,
            redirect_uri: require_env(redirect_uri_var)?,
            scope: std::env::var(scope_var).ok(),
        })
    }
}

/// Read a required environment variable
pub fn require_env(var: &str) -> Result<String> {
    std::env::var(var).map_err(|_| Error::missing_env(var))
}

/// Persisted OAuth2 token pair with absolute expiry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Current access token
    pub access_token: String,
    /// Refresh token; some providers issue it only on the first exchange
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Absolute expiry instant (lifetime minus the safety buffer)
    pub expires_at: DateTime<Utc>,
    /// Token type reported by the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Scope reported by the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenRecord {
    /// Check whether the access token has passed its (buffered) expiry
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Wire shape of a token endpoint response
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Build a record from this response, preserving a previously stored
    /// refresh token when the response omits one.
    ///
    /// Upstream APIs issue the refresh token only on the first exchange;
    /// once observed it must never be overwritten by absence.
    pub fn into_record(self, previous_refresh: Option<String>) -> TokenRecord {
        let lifetime = self.expires_in.unwrap_or(3600);
        let expires_at =
            Utc::now() + chrono::Duration::seconds((lifetime - EXPIRY_BUFFER_SECS).max(0));
        TokenRecord {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at,
            token_type: self.token_type,
            scope: self.scope,
        }
    }
}

#[cfg(test)]
mod type_tests {
    use super::*;

    fn response(expires_in: i64, refresh: Option<&str>) -> TokenResponse {
        TokenResponse {
            access_token: "at".to_string(),
            refresh_token: refresh.map(String::from),
            expires_in: Some(expires_in),
            token_type: Some("Bearer".to_string()),
            scope: None,
        }
    }

    #[test]
    fn test_record_not_expired_with_fresh_lifetime() {
        let record = response(3600, Some("rt")).into_record(None);
        assert!(!record.is_expired());
    }

    #[test]
    fn test_record_expired_when_lifetime_within_buffer() {
        // 30s lifetime is entirely consumed by the 60s buffer
        let record = response(30, Some("rt")).into_record(None);
        assert!(record.is_expired());
    }

    #[test]
    fn test_refresh_token_preserved_when_response_omits_it() {
        let record = response(3600, None).into_record(Some("old-rt".to_string()));
        assert_eq!(record.refresh_token.as_deref(), Some("old-rt"));
    }

    #[test]
    fn test_refresh_token_replaced_when_response_carries_one() {
        let record = response(3600, Some("new-rt")).into_record(Some("old-rt".to_string()));
        assert_eq!(record.refresh_token.as_deref(), Some("new-rt"));
    }

    #[test]
    fn test_auth_spec_default_is_none() {
        assert!(matches!(AuthSpec::default(), AuthSpec::None));
    }

    #[test]
    fn test_auth_spec_yaml_defaults() {
        let spec: AuthSpec = serde_yaml::from_str("kind: oauth2").unwrap();
        match spec {
            AuthSpec::Oauth2 {
                token_url_var,
                client_id_var,
                ..
            } => {
                assert_eq!(token_url_var, "OAUTH_TOKEN_URL");
                assert_eq!(client_id_var, "OAUTH_CLIENT_ID");
            }
            other => panic!("unexpected spec: {other:?}"),
        }
    }
}
