//! Pagination types and traits
//!
//! Defines the paging modes an endpoint can declare and the strategy
//! trait the fetch loop drives.

use serde::{Deserialize, Serialize};

use crate::types::StringMap;

use super::strategies::{CursorPaginator, PageNumberPaginator};

/// Paging mode declared by an endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PagingSpec {
    /// Page-number pagination (`?page=N&limit=M`)
    Page {
        /// Query parameter carrying the page number
        #[serde(default = "default_page_param")]
        page_param: String,
        /// Query parameter carrying the page size
        #[serde(default = "default_size_param")]
        size_param: String,
        /// Records requested per page
        #[serde(default = "default_page_size")]
        page_size: u32,
        /// First page number (some APIs start at 0)
        #[serde(default = "default_start_page")]
        start_page: u32,
    },

    /// Cursor pagination: a token from each response addresses the next page
    Cursor {
        /// Query parameter carrying the cursor
        cursor_param: String,
        /// Dot path to the cursor token in the response body
        cursor_path: String,
        /// Optional query parameter carrying the page size
        #[serde(default)]
        size_param: Option<String>,
        /// Records requested per page, sent only when `size_param` is set
        #[serde(default)]
        page_size: Option<u32>,
    },
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_size_param() -> String {
    "limit".to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_start_page() -> u32 {
    1
}

impl Default for PagingSpec {
    fn default() -> Self {
        Self::Page {
            page_param: default_page_param(),
            size_param: default_size_param(),
            page_size: default_page_size(),
            start_page: default_start_page(),
        }
    }
}

impl PagingSpec {
    /// Page size when declared, used for short-page detection
    pub fn page_size(&self) -> Option<u32> {
        match self {
            Self::Page { page_size, .. } => Some(*page_size),
            Self::Cursor { page_size, .. } => *page_size,
        }
    }

    /// Build the strategy for this spec
    pub fn paginator(&self) -> Box<dyn Paginator> {
        match self {
            Self::Page {
                page_param,
                size_param,
                page_size,
                start_page,
            } => Box::new(PageNumberPaginator::new(
                page_param.clone(),
                size_param.clone(),
                *page_size,
                *start_page,
            )),
            Self::Cursor {
                cursor_param,
                cursor_path,
                size_param,
                page_size,
            } => Box::new(CursorPaginator::new(
                cursor_param.clone(),
                cursor_path.clone(),
                size_param.clone(),
                *page_size,
            )),
        }
    }

    /// First page number, where the mode has one
    pub fn start_page(&self) -> u32 {
        match self {
            Self::Page { start_page, .. } => *start_page,
            Self::Cursor { .. } => 1,
        }
    }
}

/// Result of the next page computation
#[derive(Debug, Clone)]
pub enum NextPage {
    /// More pages available with these parameters
    Continue {
        /// Query parameters to add or replace
        query_params: StringMap,
    },
    /// No more pages
    Done,
}

impl NextPage {
    /// Create a continuation with query parameters
    pub fn with_params(params: StringMap) -> Self {
        Self::Continue {
            query_params: params,
        }
    }

    /// Check if this is a done result
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Tracks pagination progress during one fetch loop
#[derive(Debug, Clone, Default)]
pub struct PaginationState {
    /// Current page number (page mode)
    pub page: u32,
    /// Current cursor value (cursor mode)
    pub cursor: Option<String>,
    /// Total records fetched so far
    pub total_fetched: u64,
    /// Is pagination complete?
    pub done: bool,
}

impl PaginationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create state positioned at a starting page
    pub fn with_page(page: u32) -> Self {
        Self {
            page,
            ..Default::default()
        }
    }

    /// Mark pagination as complete
    pub fn mark_done(&mut self) {
        self.done = true;
    }

    /// Advance to the next page number
    pub fn next_page(&mut self) {
        self.page += 1;
    }

    /// Record the cursor addressing the next page
    pub fn set_cursor(&mut self, cursor: String) {
        self.cursor = Some(cursor);
    }

    /// Add to total fetched
    pub fn add_fetched(&mut self, count: u64) {
        self.total_fetched += count;
    }
}

/// Core trait for pagination strategies
pub trait Paginator: Send + Sync {
    /// Query parameters addressing the page the state currently points at
    fn initial_params(&self, state: &PaginationState) -> StringMap;

    /// Inspect a response and decide whether another page follows
    fn process_response(
        &self,
        body: &crate::types::JsonValue,
        records_count: usize,
        state: &mut PaginationState,
    ) -> NextPage;
}
