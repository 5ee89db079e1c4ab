//! OAuth2 token store and request authentication
//!
//! [`TokenStore`] owns the token lifecycle for one credential identity:
//! one-time authorization-code exchange, transparent refresh, and durable
//! persistence through an injected [`TokenCache`](super::TokenCache).
//!
//! Ordinary token reads go through a read lock; a refresh happens under the
//! write lock with a double-check, so N concurrent callers observing an
//! expired token trigger exactly one network refresh.

use super::cache::{FileTokenCache, TokenCache};
use super::types::{require_env, AuthSpec, OAuth2Credentials, TokenRecord, TokenResponse};
use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::{Client, RequestBuilder, StatusCode};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// OAuth2 token lifecycle manager for one credential identity
pub struct TokenStore {
    credentials: OAuth2Credentials,
    cache: Box<dyn TokenCache>,
    record: RwLock<Option<TokenRecord>>,
    http: Client,
}

impl TokenStore {
    /// Open a store, loading any previously persisted token record
    pub async fn open(
        credentials: OAuth2Credentials,
        cache: Box<dyn TokenCache>,
    ) -> Result<Self> {
        let record = cache.load().await?;
        if record.is_some() {
            debug!("loaded persisted token record");
        }
        Ok(Self {
            credentials,
            cache,
            record: RwLock::new(record),
            http: Client::new(),
        })
    }

    /// Return a valid access token, refreshing first when the cached one
    /// has passed its buffered expiry.
    pub async fn ensure_access_token(&self) -> Result<String> {
        {
            let record = self.record.read().await;
            if let Some(r) = record.as_ref() {
                if !r.is_expired() {
                    return Ok(r.access_token.clone());
                }
            }
        }

        let mut guard = self.record.write().await;

        // Another caller may have refreshed while we waited for the lock
        if let Some(r) = guard.as_ref() {
            if !r.is_expired() {
                return Ok(r.access_token.clone());
            }
        }

        self.refresh_locked(&mut guard).await
    }

    /// Force a refresh regardless of the cached expiry (e.g. after a 401)
    pub async fn refresh(&self) -> Result<()> {
        let mut guard = self.record.write().await;
        self.refresh_locked(&mut guard).await?;
        Ok(())
    }

    /// One-time exchange of an authorization code for the initial token pair.
    ///
    /// Merges in a previously stored refresh token when the response omits
    /// one, so a re-run of the exchange never loses the grant.
    pub async fn exchange_code(&self, code: &str) -> Result<()> {
        let mut form = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("redirect_uri", self.credentials.redirect_uri.clone()),
        ];
        if let Some(scope) = &self.credentials.scope {
            form.push(("scope", scope.clone()));
        }

        let response = self.post_token(&form).await?;

        let mut guard = self.record.write().await;
        let previous_refresh = guard.as_ref().and_then(|r| r.refresh_token.clone());
        let record = response.into_record(previous_refresh);
        self.cache.save(&record).await?;
        *guard = Some(record);

        info!("authorization code exchanged for initial token pair");
        Ok(())
    }

    /// Snapshot of the current token record
    pub async fn current(&self) -> Option<TokenRecord> {
        self.record.read().await.clone()
    }

    /// Refresh while holding the write lock; persists before publishing
    async fn refresh_locked(&self, guard: &mut Option<TokenRecord>) -> Result<String> {
        let refresh_token = guard
            .as_ref()
            .and_then(|r| r.refresh_token.clone())
            .ok_or_else(|| {
                Error::authentication(
                    "no refresh token stored; rerun the authorization-code exchange",
                )
            })?;

        debug!("refreshing access token");
        let form = vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token.clone()),
        ];
        let response = self.post_token(&form).await?;

        let record = response.into_record(Some(refresh_token));
        self.cache.save(&record).await?;
        let token = record.access_token.clone();
        *guard = Some(record);
        Ok(token)
    }

    /// POST to the token endpoint with HTTP Basic client authentication.
    ///
    /// 400/401 mean the grant is revoked or expired; that is an
    /// authentication failure, never retried.
    async fn post_token(&self, form: &[(&str, String)]) -> Result<TokenResponse> {
        let basic = BASE64.encode(format!(
            "{}:{}",
            self.credentials.client_id, self.credentials.client_secret
        ));

        let response = self
            .http
            .post(&self.credentials.token_url)
            .header("Authorization", format!("Basic {basic}"))
            .header("Accept", "application/json")
            .form(form)
            .send()
            .await
            .map_err(Error::Http)?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::authentication(format!(
                "token endpoint rejected the grant ({status}): {body}"
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::http_status(status.as_u16(), body));
        }

        response.json().await.map_err(Error::Http)
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("token_url", &self.credentials.token_url)
            .field("client_id", &self.credentials.client_id)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Request authentication
// ============================================================================

/// Materialized authentication, ready to apply to outgoing requests
pub enum AuthMethod {
    /// No authentication
    None,
    /// Bearer token
    Bearer {
        /// The token value
        token: String,
    },
    /// Static token in a custom header
    Header {
        /// Header name
        name: String,
        /// Token value
        value: String,
    },
    /// Static token in a query parameter
    Query {
        /// Query parameter name
        param: String,
        /// Token value
        value: String,
    },
    /// OAuth2 with transparent refresh
    OAuth2(Arc<TokenStore>),
}

impl AuthMethod {
    /// Materialize credentials for a spec, resolving environment variables.
    ///
    /// For OAuth2 this opens the token store with a file cache at the
    /// configured path (default `.secrets/tokens_{client_id}.json`).
    pub async fn materialize(spec: &AuthSpec) -> Result<Self> {
        match spec {
            AuthSpec::None => Ok(Self::None),
            AuthSpec::BearerEnv { token_var } => Ok(Self::Bearer {
                token: require_env(token_var)?,
            }),
            AuthSpec::HeaderToken { header, token_var } => Ok(Self::Header {
                name: header.clone(),
                value: require_env(token_var)?,
            }),
            AuthSpec::QueryToken { param, token_var } => Ok(Self::Query {
                param: param.clone(),
                value: require_env(token_var)?,
            }),
            AuthSpec::Oauth2 {
                token_url_var,
                client_id_var,
                client_secret_var,
                redirect_uri_var,
                scope_var,
                token_cache_path,
            } => {
                let credentials = OAuth2Credentials::from_env(
                    token_url_var,
                    client_id_var,
                    client_secret_var,
                    redirect_uri_var,
                    scope_var,
                )?;
                let cache_path = token_cache_path.clone().unwrap_or_else(|| {
                    format!(".secrets/tokens_{}.json", credentials.client_id)
                });
                let store =
                    TokenStore::open(credentials, Box::new(FileTokenCache::new(cache_path)))
                        .await?;
                Ok(Self::OAuth2(Arc::new(store)))
            }
        }
    }

    /// Wrap an already-open token store
    pub fn oauth2(store: Arc<TokenStore>) -> Self {
        Self::OAuth2(store)
    }

    /// Apply authentication to a request builder
    pub async fn apply(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        match self {
            Self::None => Ok(req),
            Self::Bearer { token } => Ok(req.bearer_auth(token)),
            Self::Header { name, value } => Ok(req.header(name.as_str(), value.as_str())),
            Self::Query { param, value } => Ok(req.query(&[(param.as_str(), value.as_str())])),
            Self::OAuth2(store) => {
                let token = store.ensure_access_token().await?;
                Ok(req.bearer_auth(token))
            }
        }
    }

    /// The token store, when this is OAuth2 auth
    pub fn token_store(&self) -> Option<&Arc<TokenStore>> {
        match self {
            Self::OAuth2(store) => Some(store),
            _ => None,
        }
    }
}

impl std::fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::None => "None",
            Self::Bearer { .. } => "Bearer",
            Self::Header { .. } => "Header",
            Self::Query { .. } => "Query",
            Self::OAuth2(_) => "OAuth2",
        };
        f.debug_tuple("AuthMethod").field(&kind).finish()
    }
}
