//! Pagination strategies and the page fetch loop
//!
//! [`PagingSpec`] declares how an endpoint pages, [`Paginator`] implements
//! the strategy, and [`PageFetcher`] drives it until completion or a
//! safety bound.

mod fetcher;
mod strategies;
mod types;

pub use fetcher::{FetchOptions, PageFetchOutcome, PageFetcher};
pub use strategies::{CursorPaginator, PageNumberPaginator};
pub use types::{NextPage, PaginationState, Paginator, PagingSpec};
