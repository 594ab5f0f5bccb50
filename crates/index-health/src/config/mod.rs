//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;
pub use validation::validate_settings;

use crate::core::EntityType;
use crate::error::{HealthError, Result};
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        let config = config.with_entity_defaults();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Layout of a configured entity.
    pub fn entity(&self, entity: EntityType) -> Result<&EntityConfig> {
        self.entities.get(&entity).ok_or_else(|| {
            HealthError::Config(format!("entity '{}' is not configured", entity))
        })
    }
}

impl PrimaryConfig {
    /// Connection URL for logs, without credentials.
    pub fn display_url(&self) -> String {
        format!("mysql://{}:{}/{}", self.host, self.port, self.database)
    }
}

impl IndexConfig {
    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.url.trim().trim_end_matches('/')
    }
}
