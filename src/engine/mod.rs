//! Extraction engine
//!
//! [`Extractor`] ties the layers together: it expands the parameter
//! matrix, sweeps every combination through the page fetcher, consolidates
//! rows by identity across passes until the set stops growing, and
//! optionally enriches each unique identity from a detail endpoint.

mod consolidate;
mod enrich;
mod types;

pub use consolidate::{dedup_rows, ConsolidatedSet};
pub use enrich::{EnrichmentEngine, EnrichmentOutcome};
pub use types::ExtractStats;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::auth::{AuthMethod, TokenStore};
use crate::config::ExtractorConfig;
use crate::error::Result;
use crate::http::{HttpExecutor, RateGovernor};
use crate::matrix;
use crate::pagination::PageFetcher;
use crate::records::{distinct_identities, param_value};
use crate::types::{JsonValue, StringMap};


/// Resilient extractor for one configured source
pub struct Extractor {
    config: ExtractorConfig,
    executor: HttpExecutor,
    fetch_governor: RateGovernor,
    enrich_governor: RateGovernor,
    stats: ExtractStats,
}

impl Extractor {
    /// Build an extractor, resolving credentials and opening the token
    /// cache where the config calls for OAuth2.
    pub async fn new(mut config: ExtractorConfig) -> Result<Self> {
        config.apply_env_overrides();
        config.validate()?;

        let auth = AuthMethod::materialize(&config.auth).await?;
        let executor = HttpExecutor::new(config.executor_config(), auth)?;
        let fetch_governor = RateGovernor::per_minute(config.requests_per_minute);
        let enrich_governor = RateGovernor::per_minute(config.enrichment_rate());

        Ok(Self {
            config,
            executor,
            fetch_governor,
            enrich_governor,
            stats: ExtractStats::default(),
        })
    }

    /// Counters from the most recent `extract()` run
    pub fn stats(&self) -> &ExtractStats {
        &self.stats
    }

    /// The OAuth2 token store, when the config uses OAuth2.
    ///
    /// Exposed so callers can run the one-time authorization-code
    /// exchange before the first extraction.
    pub fn token_store(&self) -> Option<&Arc<TokenStore>> {
        self.executor.auth().token_store()
    }

    /// Run the full extraction: sweep, consolidate, enrich.
    ///
    /// Request failures that survive the retry budget abort the run; rows
    /// from completed combinations are discarded with the error.
    pub async fn extract(&mut self) -> Result<Vec<JsonValue>> {
        let started = Instant::now();
        self.stats = ExtractStats::default();

        let url = self.config.endpoint_url()?;
        let base: StringMap = self
            .config
            .params
            .iter()
            .map(|(key, value)| (key.clone(), param_value(value)))
            .collect();
        let combinations = matrix::expand(&base, &self.config.param_matrix);

        info!(
            url = %url,
            combinations = combinations.len(),
            max_passes = self.config.max_passes,
            "starting extraction"
        );

        let first = self.run_pass(&url, &combinations).await?;
        self.stats.passes = 1;

        if first.is_empty() {
            warn!(url = %url, "first pass produced no rows");
            self.stats.duration_ms = started.elapsed().as_millis() as u64;
            return Ok(Vec::new());
        }

        let rows = if self.config.max_passes <= 1 {
            dedup_rows(first, &self.config.identity_field)
        } else {
            self.consolidate(&url, &combinations, first).await?
        };

        self.stats.unique_identities =
            distinct_identities(&rows, &self.config.identity_field).len();

        let rows = if self.config.enrich_by_id {
            self.enrich(&url, rows).await?
        } else {
            rows
        };

        self.stats.duration_ms = started.elapsed().as_millis() as u64;
        info!(summary = %self.stats.summary(), "extraction complete");
        Ok(rows)
    }

    /// Fetch every combination once, returning raw rows in sweep order
    async fn run_pass(&mut self, url: &str, combinations: &[StringMap]) -> Result<Vec<JsonValue>> {
        let options = self.config.fetch_options();
        let mut rows = Vec::new();

        for (index, combination) in combinations.iter().enumerate() {
            debug!(
                combination = index + 1,
                total = combinations.len(),
                params = ?combination,
                "fetching combination"
            );
            let fetcher = PageFetcher::new(
                &self.executor,
                &self.fetch_governor,
                &self.config.paging,
                &options,
            );
            let outcome = fetcher.fetch_all_pages(url, combination).await?;
            self.stats.pages += outcome.pages;
            self.stats.rows_fetched += outcome.rows.len();
            rows.extend(outcome.rows);
        }
        Ok(rows)
    }

    /// Repeat the sweep until no pass discovers a new identity or the
    /// pass budget runs out.
    async fn consolidate(
        &mut self,
        url: &str,
        combinations: &[StringMap],
        first: Vec<JsonValue>,
    ) -> Result<Vec<JsonValue>> {
        let mut set = ConsolidatedSet::new(self.config.identity_field.clone());
        let added = set.merge(first);
        info!(pass = 1, added, total = set.len(), "consolidation pass complete");

        let cooldown = Duration::from_secs(self.config.pass_cooldown_secs);
        for pass in 2..=self.config.max_passes {
            tokio::time::sleep(cooldown).await;

            let batch = self.run_pass(url, combinations).await?;
            self.stats.passes = pass;

            // A sweep that returned nothing after a non-empty first pass
            // is treated as transient rather than as convergence.
            if batch.is_empty() {
                warn!(pass, "pass produced no rows, not counting as convergence");
                continue;
            }

            let added = set.merge(batch);
            info!(pass, added, total = set.len(), "consolidation pass complete");
            if added == 0 {
                debug!(pass, "no new identities discovered, set has converged");
                break;
            }
        }
        Ok(set.into_rows())
    }

    /// Replace consolidated rows with their detail records
    async fn enrich(&mut self, url: &str, rows: Vec<JsonValue>) -> Result<Vec<JsonValue>> {
        let ids = distinct_identities(&rows, &self.config.identity_field);
        if ids.is_empty() {
            warn!(
                field = %self.config.identity_field,
                "enrichment enabled but no row carries an identity"
            );
            return Ok(rows);
        }

        let engine = EnrichmentEngine::new(
            &self.executor,
            self.enrich_governor.clone(),
            self.config.enrichment_strategy,
            self.config.detail_workers,
            self.config.concurrent_requests,
            self.config.detail_data_path.clone(),
        );
        let outcome = engine.enrich(url, &ids).await?;

        self.stats.enriched = outcome.succeeded;
        self.stats.enrichment_failures = outcome.failed;

        if outcome.rows.is_empty() {
            warn!("enrichment yielded no detail rows, keeping list rows");
            return Ok(rows);
        }
        Ok(outcome.rows)
    }
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor")
            .field("endpoint", &self.config.endpoint)
            .field("stats", &self.stats)
            .finish()
    }
}
