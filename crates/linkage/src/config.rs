//! Model configuration.

use linkage_graph::GraphConfig;
use linkage_loops::LoopConfig;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Settings for one model-generation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub graph: GraphConfig,
    pub loops: LoopConfig,
}

impl ModelConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), Error> {
        self.graph
            .validate()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        self.loops
            .validate()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        Ok(())
    }
}
