//! Parameter-matrix expansion
//!
//! Expands a matrix of candidate query-parameter values into the Cartesian
//! set of concrete parameter combinations, each merged over the job's base
//! parameters. Enumeration order is significant: axes in declared order,
//! values in list order, first axis varying slowest. That order determines
//! the sequence in which partial results are merged downstream.

use crate::records::param_value;
use crate::types::{JsonValue, StringMap};
use serde::{Deserialize, Serialize};

/// A full parameter matrix: axes in declared (enumeration) order
pub type ParamMatrix = Vec<MatrixAxis>;

/// One axis of a parameter matrix: a query parameter and its candidate values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixAxis {
    /// Query parameter name
    pub param: String,
    /// Candidate values, tried in list order
    pub values: Vec<JsonValue>,
}

impl MatrixAxis {
    /// Create a new axis
    pub fn new(param: impl Into<String>, values: Vec<JsonValue>) -> Self {
        Self {
            param: param.into(),
            values,
        }
    }
}

/// Expand a parameter matrix into concrete parameter combinations.
///
/// An empty matrix yields exactly one combination: the base parameters
/// unchanged. An axis with no values contributes nothing and collapses the
/// product to zero combinations, matching Cartesian semantics.
pub fn expand(base: &StringMap, matrix: &[MatrixAxis]) -> Vec<StringMap> {
    let mut combinations = vec![base.clone()];

    for axis in matrix {
        let mut next = Vec::with_capacity(combinations.len() * axis.values.len());
        for combo in &combinations {
            for value in &axis.values {
                let mut expanded = combo.clone();
                expanded.insert(axis.param.clone(), param_value(value));
                next.push(expanded);
            }
        }
        combinations = next;
    }

    combinations
}
