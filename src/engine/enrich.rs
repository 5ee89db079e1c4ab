//! Detail enrichment
//!
//! After consolidation, each unique identity can be re-fetched from a
//! per-record detail endpoint (`{base}/{id}`). Lookups run either
//! sequentially or through a bounded worker pool; individual failures are
//! logged and dropped rather than aborting the run.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::http::{HttpExecutor, RateGovernor};
use crate::records::{coerce_rows, select_payload};
use crate::types::{EnrichmentStrategy, JsonValue, StringMap};

/// Log progress after this many sequential lookups
const PROGRESS_INTERVAL: usize = 50;

/// Outcome of one enrichment sweep
#[derive(Debug, Default)]
pub struct EnrichmentOutcome {
    /// Detail rows collected, in completion order
    pub rows: Vec<JsonValue>,
    /// Lookups that returned a payload
    pub succeeded: usize,
    /// Lookups that failed after the retry budget
    pub failed: usize,
}

impl EnrichmentOutcome {
    /// Record one lookup result. A response whose payload resolves to no
    /// rows is dropped and counted as a failure, like a request error.
    fn tally(&mut self, id: &str, result: Result<Vec<JsonValue>>) {
        match result {
            Ok(rows) if !rows.is_empty() => {
                self.succeeded += 1;
                self.rows.extend(rows);
            }
            Ok(_) => {
                warn!(id = %id, "detail response carried no payload, dropping");
                self.failed += 1;
            }
            Err(err) => {
                warn!(id = %id, error = %err, "detail lookup failed, dropping");
                self.failed += 1;
            }
        }
    }
}

/// Runs detail lookups for a set of identities
pub struct EnrichmentEngine<'a> {
    executor: &'a HttpExecutor,
    governor: RateGovernor,
    strategy: EnrichmentStrategy,
    detail_workers: usize,
    concurrent_requests: usize,
    detail_data_path: Option<String>,
}

impl<'a> EnrichmentEngine<'a> {
    pub fn new(
        executor: &'a HttpExecutor,
        governor: RateGovernor,
        strategy: EnrichmentStrategy,
        detail_workers: usize,
        concurrent_requests: usize,
        detail_data_path: Option<String>,
    ) -> Self {
        Self {
            executor,
            governor,
            strategy,
            detail_workers,
            concurrent_requests,
            detail_data_path,
        }
    }

    /// Fetch the detail record for every identity in `ids`.
    pub async fn enrich(&self, base_url: &str, ids: &[String]) -> Result<EnrichmentOutcome> {
        info!(
            identities = ids.len(),
            strategy = ?self.strategy,
            "starting enrichment"
        );
        match self.strategy {
            EnrichmentStrategy::Sequential => self.enrich_sequential(base_url, ids).await,
            EnrichmentStrategy::Concurrent => self.enrich_concurrent(base_url, ids).await,
        }
    }

    async fn enrich_sequential(&self, base_url: &str, ids: &[String]) -> Result<EnrichmentOutcome> {
        let mut outcome = EnrichmentOutcome::default();

        for (done, id) in ids.iter().enumerate() {
            let result = self.fetch_detail(base_url, id).await;
            outcome.tally(id, result);
            if (done + 1) % PROGRESS_INTERVAL == 0 {
                info!(done = done + 1, total = ids.len(), "enrichment progress");
            }
        }
        Ok(outcome)
    }

    async fn enrich_concurrent(&self, base_url: &str, ids: &[String]) -> Result<EnrichmentOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.concurrent_requests));
        let mut outcome = EnrichmentOutcome::default();

        let mut results = stream::iter(ids.iter())
            .map(|id| {
                let semaphore = Arc::clone(&semaphore);
                async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|_| Error::extraction("enrichment semaphore closed"))?;
                    let rows = self.fetch_detail(base_url, id).await;
                    Ok::<_, Error>((id, rows))
                }
            })
            .buffer_unordered(self.detail_workers);

        while let Some(result) = results.next().await {
            let (id, rows) = result?;
            outcome.tally(id, rows);
        }
        Ok(outcome)
    }

    async fn fetch_detail(&self, base_url: &str, id: &str) -> Result<Vec<JsonValue>> {
        let url = format!("{}/{}", base_url.trim_end_matches('/'), id);
        debug!(url = %url, "fetching detail");
        let body = self
            .executor
            .get(&url, &StringMap::new(), &self.governor)
            .await?;
        let payload = select_payload(&body, self.detail_data_path.as_deref());
        Ok(coerce_rows(payload))
    }
}
