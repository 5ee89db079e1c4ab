//! Engine statistics

use serde::Serialize;

/// Counters collected over one `extract()` run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractStats {
    /// Consolidation passes executed
    pub passes: u32,
    /// Pages requested across all combinations and passes
    pub pages: u32,
    /// Raw rows received before consolidation
    pub rows_fetched: usize,
    /// Distinct identities in the consolidated set
    pub unique_identities: usize,
    /// Detail lookups that succeeded
    pub enriched: usize,
    /// Detail lookups that failed and were dropped
    pub enrichment_failures: usize,
    /// Wall-clock duration of the run
    pub duration_ms: u64,
}

impl ExtractStats {
    /// One-line human summary for end-of-run logging
    pub fn summary(&self) -> String {
        format!(
            "{} passes, {} pages, {} rows ({} unique), {} enriched ({} failed) in {}ms",
            self.passes,
            self.pages,
            self.rows_fetched,
            self.unique_identities,
            self.enriched,
            self.enrichment_failures,
            self.duration_ms
        )
    }
}
