// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]

//! # Siphon
//!
//! A resilient data-acquisition engine for paginated, rate-limited,
//! OAuth2-protected HTTP APIs.
//!
//! ## Features
//!
//! - **Pagination**: Page-number and cursor modes with short-page,
//!   empty-streak, and page-cap termination
//! - **Rate Governance**: Per-channel request pacing from a
//!   requests-per-minute budget
//! - **Auth**: Bearer/header/query tokens and a full OAuth2
//!   authorization-code lifecycle with cached, auto-refreshing tokens
//! - **Parameter Matrix**: Cartesian sweeps over query-parameter axes
//! - **Consolidation**: Multi-pass, identity-keyed deduplication that
//!   repeats the sweep until the record set stops growing
//! - **Enrichment**: Sequential or concurrent per-record detail lookups
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use siphon::{Extractor, ExtractorConfig, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ExtractorConfig::from_yaml_str(
//!         r"
//!         endpoint: /v2/assets
//!         base_url_env: API_BASE_URL
//!         paging:
//!           mode: page
//!           page_size: 100
//!         max_passes: 3
//!         enrich_by_id: true
//!         ",
//!     )?;
//!
//!     let mut extractor = Extractor::new(config).await?;
//!     let records = extractor.extract().await?;
//!     println!("{} records ({})", records.len(), extractor.stats().summary());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Extractor                            │
//! │  expand matrix → sweep pages → consolidate → enrich         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌──────────┬───────────┬─────┴─────────┬───────────┬──────────┐
//! │   Auth   │   HTTP    │  Pagination   │  Matrix   │  Engine  │
//! ├──────────┼───────────┼───────────────┼───────────┼──────────┤
//! │ Bearer   │ GET       │ Page number   │ Cartesian │ Passes   │
//! │ OAuth2   │ Retry     │ Cursor        │ expansion │ Dedup    │
//! │ Token    │ Backoff   │ Safety bounds │           │ Detail   │
//! │ cache    │ Rate limit│               │           │ lookups  │
//! └──────────┴───────────┴───────────────┴───────────┴──────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(missing_docs)] // TODO: Add docs before 1.0 release

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Extractor configuration
pub mod config;

/// Authentication and the OAuth2 token lifecycle
pub mod auth;

/// HTTP executor with retry and rate governance
pub mod http;

/// Payload selection and record identity helpers
pub mod records;

/// Parameter-matrix expansion
pub mod matrix;

/// Pagination strategies and the page fetch loop
pub mod pagination;

/// Extraction engine: sweep, consolidate, enrich
pub mod engine;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

pub use auth::{AuthSpec, TokenStore};
pub use config::ExtractorConfig;
pub use engine::{ExtractStats, Extractor};
pub use matrix::{MatrixAxis, ParamMatrix};
pub use pagination::PagingSpec;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
