//! HTTP transport layer
//!
//! [`HttpExecutor`] is the single request path for the whole crate; every
//! page fetch and detail lookup goes through its retry loop. [`RateGovernor`]
//! paces requests per channel so primary pagination and enrichment can run
//! under independent rate budgets.

mod client;
mod rate_limit;

pub use client::{HttpExecutor, HttpExecutorConfig};
pub use rate_limit::RateGovernor;

#[cfg(test)]
mod tests;
