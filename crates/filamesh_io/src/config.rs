//! # Assembler Configuration
//!
//! Loaded once from TOML; every field has a default, so an empty document
//! is a valid configuration.
//!
//! ```toml
//! max_instances = 128
//! default_material_key = "DefaultMaterial"
//! trace_material_resolution = true
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::registry::DEFAULT_MATERIAL_NAME;

/// Default upper bound on instances per assembly call.
pub const DEFAULT_MAX_INSTANCES: usize = 64;

/// Settings for [`MeshAssembler`](crate::assembler::MeshAssembler).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssemblerConfig {
    /// Largest instance count a single `assemble` call accepts.
    pub max_instances: usize,
    /// Registry name whose handle is used for parts with no matching
    /// material.
    pub default_material_key: String,
    /// Emit a trace event for every resolved part.
    pub trace_material_resolution: bool,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            max_instances: DEFAULT_MAX_INSTANCES,
            default_material_key: DEFAULT_MATERIAL_NAME.to_string(),
            trace_material_resolution: false,
        }
    }
}

impl AssemblerConfig {
    /// Sets the instance capacity.
    #[must_use]
    pub const fn with_max_instances(mut self, max_instances: usize) -> Self {
        self.max_instances = max_instances;
        self
    }

    /// Sets the registry name of the default material.
    #[must_use]
    pub fn with_default_material_key(mut self, key: impl Into<String>) -> Self {
        self.default_material_key = key.into();
        self
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys, and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration back to TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `max_instances` is zero or the
    /// default material key is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_instances == 0 {
            return Err(ConfigError::Invalid("max_instances must be at least 1".to_string()));
        }
        if self.default_material_key.is_empty() {
            return Err(ConfigError::Invalid(
                "default_material_key must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
