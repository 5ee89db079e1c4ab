//! Pagination strategy implementations
//!
//! Each strategy handles one paging pattern.

use tracing::debug;

use crate::records::path_string;
use crate::types::{JsonValue, StringMap};

use super::types::{NextPage, PaginationState, Paginator};

// ============================================================================
// Page-number pagination
// ============================================================================

/// Page-number pagination (`?page=2&limit=100`)
///
/// Stops on an empty page or a short page (fewer records than the
/// declared page size).
#[derive(Debug, Clone)]
pub struct PageNumberPaginator {
    /// Query parameter carrying the page number
    pub page_param: String,
    /// Query parameter carrying the page size
    pub size_param: String,
    /// Records requested per page
    pub page_size: u32,
    /// First page number
    pub start_page: u32,
}

impl PageNumberPaginator {
    pub fn new(
        page_param: impl Into<String>,
        size_param: impl Into<String>,
        page_size: u32,
        start_page: u32,
    ) -> Self {
        Self {
            page_param: page_param.into(),
            size_param: size_param.into(),
            page_size,
            start_page,
        }
    }

    fn params_for(&self, page: u32) -> StringMap {
        let mut params = StringMap::new();
        params.insert(self.page_param.clone(), page.to_string());
        params.insert(self.size_param.clone(), self.page_size.to_string());
        params
    }
}

impl Paginator for PageNumberPaginator {
    fn initial_params(&self, state: &PaginationState) -> StringMap {
        self.params_for(state.page.max(self.start_page))
    }

    fn process_response(
        &self,
        _body: &JsonValue,
        records_count: usize,
        state: &mut PaginationState,
    ) -> NextPage {
        state.add_fetched(records_count as u64);

        // A short or empty page means the server has no more records
        if records_count < self.page_size as usize {
            debug!(
                page = state.page,
                records = records_count,
                "short page, pagination complete"
            );
            state.mark_done();
            return NextPage::Done;
        }

        state.next_page();
        NextPage::with_params(self.params_for(state.page))
    }
}

// ============================================================================
// Cursor pagination
// ============================================================================

/// Cursor pagination: each response carries a token addressing the next page
///
/// Common patterns: `?starting_after=obj_123`, `?cursor=abc123`. Stops when
/// the cursor field is absent, null, or empty.
#[derive(Debug, Clone)]
pub struct CursorPaginator {
    /// Query parameter carrying the cursor
    pub cursor_param: String,
    /// Dot path to the cursor token in the response body
    pub cursor_path: String,
    /// Optional query parameter carrying the page size
    pub size_param: Option<String>,
    /// Records requested per page
    pub page_size: Option<u32>,
}

impl CursorPaginator {
    pub fn new(
        cursor_param: impl Into<String>,
        cursor_path: impl Into<String>,
        size_param: Option<String>,
        page_size: Option<u32>,
    ) -> Self {
        Self {
            cursor_param: cursor_param.into(),
            cursor_path: cursor_path.into(),
            size_param,
            page_size,
        }
    }

    fn size_params(&self) -> StringMap {
        let mut params = StringMap::new();
        if let (Some(param), Some(size)) = (&self.size_param, self.page_size) {
            params.insert(param.clone(), size.to_string());
        }
        params
    }
}

impl Paginator for CursorPaginator {
    fn initial_params(&self, state: &PaginationState) -> StringMap {
        let mut params = self.size_params();
        if let Some(cursor) = &state.cursor {
            params.insert(self.cursor_param.clone(), cursor.clone());
        }
        params
    }

    fn process_response(
        &self,
        body: &JsonValue,
        records_count: usize,
        state: &mut PaginationState,
    ) -> NextPage {
        state.add_fetched(records_count as u64);

        // An empty page is not terminal by itself; some APIs hand back
        // empty pages with a valid next cursor. The fetch loop bounds
        // consecutive empties separately.
        match path_string(body, &self.cursor_path) {
            Some(cursor) if !cursor.is_empty() => {
                debug!(cursor = %cursor, "next cursor");
                state.set_cursor(cursor.clone());
                state.next_page();
                let mut params = self.size_params();
                params.insert(self.cursor_param.clone(), cursor);
                NextPage::with_params(params)
            }
            _ => {
                state.mark_done();
                NextPage::Done
            }
        }
    }
}
