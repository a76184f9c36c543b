/// Personalizer configuration, loaded from RON.
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::store::{TriggerPath, MAX_BATCH_OPERATIONS};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Where profiles, templates and stories live, and how writes are batched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalizerConfig {
    /// Watched profile documents, e.g. `children/{childId}`.
    pub profile_trigger: String,
    pub templates_collection: String,
    pub stories_collection: String,
    /// Operations per batch commit, and page size of the deletion sweep.
    pub max_batch_size: usize,
}

impl Default for PersonalizerConfig {
    fn default() -> Self {
        Self {
            profile_trigger: "children/{childId}".to_string(),
            templates_collection: "storyTemplates".to_string(),
            stories_collection: "personalizedStories".to_string(),
            max_batch_size: MAX_BATCH_OPERATIONS,
        }
    }
}

impl PersonalizerConfig {
    /// Load a config from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<PersonalizerConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a config from a RON string. Missing fields take their defaults.
    pub fn parse_ron(input: &str) -> Result<PersonalizerConfig, ConfigError> {
        let config: PersonalizerConfig = ron::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch_size == 0 || self.max_batch_size > MAX_BATCH_OPERATIONS {
            return Err(ConfigError::Invalid(format!(
                "max_batch_size must be between 1 and {}, got {}",
                MAX_BATCH_OPERATIONS, self.max_batch_size
            )));
        }
        if self.templates_collection.is_empty() || self.stories_collection.is_empty() {
            return Err(ConfigError::Invalid("collection names must not be empty".to_string()));
        }
        self.trigger()?;
        Ok(())
    }

    pub fn trigger(&self) -> Result<TriggerPath, ConfigError> {
        TriggerPath::parse(&self.profile_trigger).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}
