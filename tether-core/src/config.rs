//! Store configuration.
//!
//! Every field has a default, so a config file only needs the keys it
//! changes:
//!
//! ```json
//! { "deep": false, "bindAttribute": "data-model" }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ReactiveError, Result};

/// Default number of snapshots a [`History`](crate::immutable::History) keeps.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Default marker attribute scanned by [`bind_all`](crate::bind::bind_all).
pub const DEFAULT_BIND_ATTRIBUTE: &str = "data-bind";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct StoreConfig {
    /// Whether `Store::wrap` creates deep proxies.
    pub deep: bool,

    /// Attribute carrying the model path for `bind_all`.
    pub bind_attribute: String,

    /// Snapshots kept by histories created from this config.
    pub history_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            deep: true,
            bind_attribute: DEFAULT_BIND_ATTRIBUTE.to_owned(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl StoreConfig {
    /// Parse a config from JSON and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: StoreConfig =
            serde_json::from_str(json).map_err(|e| ReactiveError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bind_attribute.trim().is_empty() {
            return Err(ReactiveError::Config(
                "bindAttribute must not be empty".into(),
            ));
        }
        if self.history_capacity == 0 {
            return Err(ReactiveError::Config(
                "historyCapacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
