//! Extractor configuration
//!
//! One [`ExtractorConfig`] fully describes a source: the endpoint, how it
//! pages, how it authenticates, the parameter matrix to sweep, and the
//! consolidation and enrichment behavior. Configs are built in code or
//! loaded from YAML/JSON, and a handful of tuning knobs can be overridden
//! through the environment.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::auth::{require_env, AuthSpec};
use crate::error::{Error, Result};
use crate::http::HttpExecutorConfig;
use crate::matrix::MatrixAxis;
use crate::pagination::{FetchOptions, PagingSpec};
use crate::types::{BackoffType, EnrichmentStrategy, JsonValue};

/// Environment variable overriding `max_retries`
pub const ENV_MAX_RETRIES: &str = "API_MAX_RETRIES";
/// Environment variable overriding `backoff_base_ms` (seconds, fractional allowed)
pub const ENV_BACKOFF_BASE: &str = "API_BACKOFF_BASE";
/// Environment variable overriding `timeout_secs`
pub const ENV_TIMEOUT: &str = "API_TIMEOUT";

/// Declarative description of one extraction source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractorConfig {
    /// Endpoint path or absolute URL
    pub endpoint: String,

    /// Environment variable holding the base URL to join `endpoint` onto
    #[serde(default)]
    pub base_url_env: Option<String>,

    /// Dot path to each record's identity
    #[serde(default = "default_identity_field")]
    pub identity_field: String,

    /// Paging mode for the endpoint
    #[serde(default)]
    pub paging: PagingSpec,

    /// Authentication scheme
    #[serde(default)]
    pub auth: AuthSpec,

    /// Query parameters sent on every request
    #[serde(default)]
    pub params: HashMap<String, JsonValue>,

    /// Axes expanded into the Cartesian set of parameter combinations
    #[serde(default)]
    pub param_matrix: Vec<MatrixAxis>,

    /// Fetch a detail record per unique identity after consolidation
    #[serde(default)]
    pub enrich_by_id: bool,

    /// How detail lookups are scheduled
    #[serde(default)]
    pub enrichment_strategy: EnrichmentStrategy,

    /// Worker tasks driving concurrent enrichment
    #[serde(default = "default_detail_workers")]
    pub detail_workers: usize,

    /// Detail requests allowed in flight at once
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,

    /// Rate budget for the primary fetch channel, `None` for unlimited
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: Option<u32>,

    /// Separate rate budget for the enrichment channel; falls back to
    /// `requests_per_minute` when unset
    #[serde(default)]
    pub enrichment_requests_per_minute: Option<u32>,

    /// Stop accumulating rows per combination once this many are collected
    #[serde(default)]
    pub row_limit: Option<usize>,

    /// Hard cap on pages fetched per combination
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Consolidation passes over the full sweep (1 disables multi-pass)
    #[serde(default = "default_max_passes")]
    pub max_passes: u32,

    /// Cooldown between consolidation passes
    #[serde(default = "default_pass_cooldown_secs")]
    pub pass_cooldown_secs: u64,

    /// Dot path selecting the record array inside list responses
    #[serde(default)]
    pub data_path: Option<String>,

    /// Dot path selecting the record inside detail responses
    #[serde(default)]
    pub detail_data_path: Option<String>,

    /// Pause between page requests, in milliseconds
    #[serde(default)]
    pub delay_between_pages_ms: Option<u64>,

    /// Retry attempts after the initial request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff delay, in milliseconds
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Shape of the backoff schedule
    #[serde(default)]
    pub backoff_type: BackoffType,

    /// Per-request timeout, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_identity_field() -> String {
    "id".to_string()
}

fn default_detail_workers() -> usize {
    5
}

fn default_concurrent_requests() -> usize {
    3
}

fn default_requests_per_minute() -> Option<u32> {
    Some(60)
}

fn default_max_pages() -> u32 {
    1000
}

fn default_max_passes() -> u32 {
    1
}

fn default_pass_cooldown_secs() -> u64 {
    5
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_timeout_secs() -> u64 {
    30
}

impl ExtractorConfig {
    /// Create a config for `endpoint` with every knob at its default
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            base_url_env: None,
            identity_field: default_identity_field(),
            paging: PagingSpec::default(),
            auth: AuthSpec::default(),
            params: HashMap::new(),
            param_matrix: Vec::new(),
            enrich_by_id: false,
            enrichment_strategy: EnrichmentStrategy::default(),
            detail_workers: default_detail_workers(),
            concurrent_requests: default_concurrent_requests(),
            requests_per_minute: default_requests_per_minute(),
            enrichment_requests_per_minute: None,
            row_limit: None,
            max_pages: default_max_pages(),
            max_passes: default_max_passes(),
            pass_cooldown_secs: default_pass_cooldown_secs(),
            data_path: None,
            detail_data_path: None,
            delay_between_pages_ms: None,
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_type: BackoffType::default(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Load a config from a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from an in-memory JSON value
    pub fn from_json_value(value: JsonValue) -> Result<Self> {
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    // ------------------------------------------------------------
    // Builder-style setters
    // ------------------------------------------------------------

    /// Set the paging mode
    pub fn with_paging(mut self, paging: PagingSpec) -> Self {
        self.paging = paging;
        self
    }

    /// Set the authentication scheme
    pub fn with_auth(mut self, auth: AuthSpec) -> Self {
        self.auth = auth;
        self
    }

    /// Add a query parameter sent on every request
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Append a matrix axis
    pub fn with_axis(mut self, axis: MatrixAxis) -> Self {
        self.param_matrix.push(axis);
        self
    }

    /// Enable detail enrichment with the given strategy
    pub fn with_enrichment(mut self, strategy: EnrichmentStrategy) -> Self {
        self.enrich_by_id = true;
        self.enrichment_strategy = strategy;
        self
    }

    /// Set the consolidation pass budget
    pub fn with_max_passes(mut self, max_passes: u32) -> Self {
        self.max_passes = max_passes;
        self
    }

    /// Cap rows collected per parameter combination
    pub fn with_row_limit(mut self, limit: usize) -> Self {
        self.row_limit = Some(limit);
        self
    }

    // ------------------------------------------------------------
    // Validation and derivation
    // ------------------------------------------------------------

    /// Check structural invariants; run before any network activity.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(Error::config("endpoint must not be empty"));
        }
        if self.identity_field.trim().is_empty() {
            return Err(Error::config("identity_field must not be empty"));
        }
        match &self.paging {
            PagingSpec::Page { page_size, .. } if *page_size == 0 => {
                return Err(Error::config("page_size must be positive"));
            }
            PagingSpec::Cursor {
                cursor_param,
                cursor_path,
                ..
            } if cursor_param.trim().is_empty() || cursor_path.trim().is_empty() => {
                return Err(Error::config(
                    "cursor paging requires cursor_param and cursor_path",
                ));
            }
            _ => {}
        }
        if self.max_passes == 0 {
            return Err(Error::config("max_passes must be at least 1"));
        }
        if self.max_pages == 0 {
            return Err(Error::config("max_pages must be at least 1"));
        }
        if self.enrich_by_id && (self.detail_workers == 0 || self.concurrent_requests == 0) {
            return Err(Error::config(
                "detail_workers and concurrent_requests must be positive",
            ));
        }
        Ok(())
    }

    /// Apply environment overrides for the retry and timeout knobs.
    ///
    /// Unparseable values are logged and ignored rather than failing the run.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(raw) = std::env::var(ENV_MAX_RETRIES) {
            match raw.trim().parse::<u32>() {
                Ok(value) => self.max_retries = value,
                Err(_) => warn!(var = ENV_MAX_RETRIES, value = %raw, "ignoring unparseable override"),
            }
        }
        if let Ok(raw) = std::env::var(ENV_BACKOFF_BASE) {
            match raw.trim().parse::<f64>() {
                Ok(seconds) if seconds >= 0.0 => {
                    self.backoff_base_ms = (seconds * 1000.0) as u64;
                }
                _ => warn!(var = ENV_BACKOFF_BASE, value = %raw, "ignoring unparseable override"),
            }
        }
        if let Ok(raw) = std::env::var(ENV_TIMEOUT) {
            match raw.trim().parse::<u64>() {
                Ok(value) if value > 0 => self.timeout_secs = value,
                _ => warn!(var = ENV_TIMEOUT, value = %raw, "ignoring unparseable override"),
            }
        }
    }

    /// Resolve the absolute URL requests go to.
    ///
    /// An absolute `endpoint` is used as-is; otherwise it is joined onto
    /// the base URL read from `base_url_env`.
    pub fn endpoint_url(&self) -> Result<String> {
        let full = if self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")
        {
            self.endpoint.clone()
        } else {
            let var = self.base_url_env.as_deref().ok_or_else(|| {
                Error::config("endpoint is relative and base_url_env is not set")
            })?;
            let base = require_env(var)?;
            format!(
                "{}/{}",
                base.trim_end_matches('/'),
                self.endpoint.trim_start_matches('/')
            )
        };
        Url::parse(&full)?;
        Ok(full)
    }

    /// Transport settings derived from this config
    pub fn executor_config(&self) -> HttpExecutorConfig {
        HttpExecutorConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            backoff_type: self.backoff_type,
            ..HttpExecutorConfig::default()
        }
    }

    /// Fetch-loop bounds derived from this config
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            max_pages: self.max_pages,
            row_limit: self.row_limit,
            data_path: self.data_path.clone(),
            identity_field: self.identity_field.clone(),
            delay_between_pages: self.delay_between_pages_ms.map(Duration::from_millis),
        }
    }

    /// Rate budget for the enrichment channel
    pub fn enrichment_rate(&self) -> Option<u32> {
        self.enrichment_requests_per_minute
            .or(self.requests_per_minute)
    }
}
