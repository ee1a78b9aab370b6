//! Graph configuration types.

use serde::{Deserialize, Serialize};

use crate::error::GraphError;

/// Controls the optimisation pipeline run by `build_graph`.
///
/// None of these settings change what the extracted equations compute, only
/// how they are arranged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Simplify node values, fold duplicate nodes and remove pure aliases.
    pub optimize: bool,
    /// Hoist repeated subexpressions into shared temporaries (requires `optimize`).
    pub eliminate_common_subexpressions: bool,
    /// Occurrences needed before a subexpression is hoisted.
    pub min_occurrences: usize,
    /// Simplify nodes on the rayon thread pool.
    pub parallel: bool,
}

impl GraphConfig {
    /// Configuration that leaves every node exactly as registered.
    pub fn unoptimized() -> Self {
        Self {
            optimize: false,
            eliminate_common_subexpressions: false,
            ..Self::default()
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), GraphError> {
        if self.min_occurrences < 2 {
            return Err(GraphError::InvalidConfig(
                "min_occurrences must be >= 2".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            optimize: true,
            eliminate_common_subexpressions: true,
            min_occurrences: 2,
            parallel: true,
        }
    }
}
