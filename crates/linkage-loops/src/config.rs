//! Loop solver configuration.

use serde::{Deserialize, Serialize};

use crate::error::LoopError;

/// Settings for the regularity check run when a loop is registered and again
/// after its inputs change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Evaluate `det Jv` and `v(u)` at the current configuration when every
    /// input they read is numerically bound.
    pub check_singularity: bool,
    /// `|det Jv|` at or below this value is treated as singular.
    pub singularity_tolerance: f64,
}

impl LoopConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), LoopError> {
        if !(self.singularity_tolerance.is_finite() && self.singularity_tolerance > 0.0) {
            return Err(LoopError::InvalidConfig(format!(
                "singularity_tolerance must be positive and finite, got {}",
                self.singularity_tolerance
            )));
        }
        Ok(())
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            check_singularity: true,
            singularity_tolerance: 1e-10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(LoopConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_positive_tolerance() {
        for tolerance in [0.0, -1.0, f64::NAN] {
            let config = LoopConfig {
                singularity_tolerance: tolerance,
                ..LoopConfig::default()
            };
            assert!(matches!(config.validate(), Err(LoopError::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: LoopConfig = serde_json::from_str(r#"{"check_singularity": false}"#).unwrap();
        assert!(!config.check_singularity);
        assert_eq!(config.singularity_tolerance, 1e-10);
    }
}
