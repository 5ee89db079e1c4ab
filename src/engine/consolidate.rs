//! Record consolidation
//!
//! Deduplicates rows by identity while preserving the order identities
//! were first discovered in. Content is last-seen-wins: a later row with
//! a known identity replaces the earlier row in place, so rediscovery
//! never reorders the set.

use std::collections::HashMap;

use tracing::warn;

use crate::records::identity_of;
use crate::types::JsonValue;

/// Identity-keyed accumulator used across consolidation passes
#[derive(Debug)]
pub struct ConsolidatedSet {
    identity_field: String,
    rows: Vec<JsonValue>,
    index: HashMap<String, usize>,
}

impl ConsolidatedSet {
    pub fn new(identity_field: impl Into<String>) -> Self {
        Self {
            identity_field: identity_field.into(),
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Merge one pass worth of rows.
    ///
    /// Returns how many previously unseen identities the batch added;
    /// zero means the sweep has reached a fixed point. Rows without an
    /// identity cannot be matched across passes and are dropped.
    pub fn merge(&mut self, batch: Vec<JsonValue>) -> usize {
        let mut added = 0;
        let mut unidentified = 0;

        for row in batch {
            match identity_of(&row, &self.identity_field) {
                Some(id) => {
                    if let Some(&position) = self.index.get(&id) {
                        self.rows[position] = row;
                    } else {
                        self.index.insert(id, self.rows.len());
                        self.rows.push(row);
                        added += 1;
                    }
                }
                None => unidentified += 1,
            }
        }

        if unidentified > 0 {
            warn!(
                field = %self.identity_field,
                count = unidentified,
                "dropped rows without an identity during consolidation"
            );
        }
        added
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Consume the set, yielding rows in first-discovery order
    pub fn into_rows(self) -> Vec<JsonValue> {
        self.rows
    }
}

/// Deduplicate a single batch by identity.
///
/// Identified rows keep their first-occurrence position with last-seen
/// content; rows without an identity pass through untouched at the
/// position they arrived in.
pub fn dedup_rows(batch: Vec<JsonValue>, identity_field: &str) -> Vec<JsonValue> {
    let mut rows: Vec<JsonValue> = Vec::with_capacity(batch.len());
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut unidentified = 0;

    for row in batch {
        match identity_of(&row, identity_field) {
            Some(id) => {
                if let Some(&position) = index.get(&id) {
                    rows[position] = row;
                } else {
                    index.insert(id, rows.len());
                    rows.push(row);
                }
            }
            None => {
                unidentified += 1;
                rows.push(row);
            }
        }
    }

    if unidentified > 0 {
        warn!(
            field = %identity_field,
            count = unidentified,
            "rows without an identity were kept as-is"
        );
    }
    rows
}
