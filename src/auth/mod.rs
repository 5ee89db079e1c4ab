//! Authentication module
//!
//! Supports: bearer/header/query tokens sourced from the environment, and
//! the OAuth2 authorization-code + refresh flow with a persisted token
//! cache. The [`TokenStore`] serializes refreshes so concurrent callers
//! never trigger duplicate token requests.

mod cache;
mod store;
mod types;

pub use cache::{FileTokenCache, MemoryTokenCache, TokenCache};
pub use store::{AuthMethod, TokenStore};
pub use types::{
    require_env, AuthSpec, OAuth2Credentials, TokenRecord, TokenResponse, EXPIRY_BUFFER_SECS,
};
