//! Common types used throughout siphon
//!
//! Shared type aliases and small utility types used across modules.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// Generic key-value map with string keys and values
///
/// Used for query parameters and parameter combinations.
pub type StringMap = HashMap<String, String>;

// ============================================================================
// Backoff
// ============================================================================

/// Backoff strategy between retry attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Same delay for every attempt
    Constant,
    /// Delay grows linearly with the attempt number
    Linear,
    /// Delay doubles with every attempt
    #[default]
    Exponential,
}

// ============================================================================
// Enrichment strategy
// ============================================================================

/// How detail enrichment requests are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentStrategy {
    /// One request at a time, paced by the enrichment rate channel
    #[default]
    Sequential,
    /// Fixed worker pool, additionally capped by an in-flight semaphore
    Concurrent,
}
