//! Page fetch loop
//!
//! Drives a [`Paginator`] against one endpoint and one parameter
//! combination, accumulating rows until the strategy reports completion
//! or a safety bound trips (page cap, row limit, consecutive empty pages).

use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::Result;
use crate::http::{HttpExecutor, RateGovernor};
use crate::records::{identity_of, merge_params, select_payload};
use crate::types::{JsonValue, StringMap};

use super::types::{NextPage, PaginationState, PagingSpec};

/// Consecutive empty pages tolerated before the loop gives up
const MAX_EMPTY_STREAK: u32 = 3;

/// Bounds and shaping applied to one fetch loop
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Hard cap on pages fetched per combination
    pub max_pages: u32,
    /// Stop accumulating once this many rows are collected
    pub row_limit: Option<usize>,
    /// Dot path selecting the record array inside each response
    pub data_path: Option<String>,
    /// Field used for duplicate-identity diagnostics
    pub identity_field: String,
    /// Optional pause between page requests
    pub delay_between_pages: Option<Duration>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_pages: 1000,
            row_limit: None,
            data_path: None,
            identity_field: "id".to_string(),
            delay_between_pages: None,
        }
    }
}

/// What one fetch loop produced
#[derive(Debug, Default)]
pub struct PageFetchOutcome {
    /// Rows in arrival order
    pub rows: Vec<JsonValue>,
    /// Pages actually requested
    pub pages: u32,
}

/// Fetches every page of one endpoint/parameter combination
pub struct PageFetcher<'a> {
    executor: &'a HttpExecutor,
    governor: &'a RateGovernor,
    spec: &'a PagingSpec,
    options: &'a FetchOptions,
}

impl<'a> PageFetcher<'a> {
    pub fn new(
        executor: &'a HttpExecutor,
        governor: &'a RateGovernor,
        spec: &'a PagingSpec,
        options: &'a FetchOptions,
    ) -> Self {
        Self {
            executor,
            governor,
            spec,
            options,
        }
    }

    /// Walk every page for `base_params`, returning rows in arrival order.
    ///
    /// Request failures surface as errors after the executor's retry budget
    /// is spent; rows gathered on earlier pages are discarded with them.
    pub async fn fetch_all_pages(
        &self,
        url: &str,
        base_params: &StringMap,
    ) -> Result<PageFetchOutcome> {
        let paginator = self.spec.paginator();
        let mut state = PaginationState::with_page(self.spec.start_page());
        let mut page_params = paginator.initial_params(&state);

        let mut outcome = PageFetchOutcome::default();
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut empty_streak = 0u32;

        for page_number in 1..=self.options.max_pages {
            if let Some(limit) = self.options.row_limit {
                if outcome.rows.len() >= limit {
                    debug!(rows = outcome.rows.len(), limit, "row limit reached");
                    break;
                }
            }

            let params = merge_params(base_params, page_params.clone());
            let body = self.executor.get(url, &params, self.governor).await?;
            outcome.pages += 1;

            let payload = select_payload(&body, self.options.data_path.as_deref());
            let batch = match payload {
                JsonValue::Array(items) => items,
                other => {
                    warn!(
                        url = %url,
                        page = page_number,
                        kind = json_kind(&other),
                        "response payload is not an array, stopping"
                    );
                    break;
                }
            };

            if batch.is_empty() {
                empty_streak += 1;
                if empty_streak >= MAX_EMPTY_STREAK {
                    warn!(
                        url = %url,
                        page = page_number,
                        "{MAX_EMPTY_STREAK} consecutive empty pages, stopping"
                    );
                    break;
                }
            } else {
                empty_streak = 0;
            }

            let mut identified = 0usize;
            let mut fresh = 0usize;
            for row in &batch {
                if let Some(id) = identity_of(row, &self.options.identity_field) {
                    identified += 1;
                    if seen_ids.insert(id) {
                        fresh += 1;
                    }
                }
            }
            if fresh < identified {
                warn!(
                    page = page_number,
                    duplicates = identified - fresh,
                    "page repeated identities already seen this fetch"
                );
            }

            let count = batch.len();
            outcome.rows.extend(batch);
            debug!(
                page = page_number,
                records = count,
                total = outcome.rows.len(),
                "fetched page"
            );

            match paginator.process_response(&body, count, &mut state) {
                NextPage::Continue { query_params } => page_params = query_params,
                NextPage::Done => break,
            }

            if let Some(delay) = self.options.delay_between_pages {
                tokio::time::sleep(delay).await;
            }
        }

        if outcome.pages >= self.options.max_pages && !state.done {
            warn!(
                url = %url,
                max_pages = self.options.max_pages,
                "page cap reached before pagination completed"
            );
        }

        Ok(outcome)
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
