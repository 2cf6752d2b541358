//! Engine configuration.
//!
//! Configuration is plain data with defaults for every field, loadable from
//! a JSON document:
//!
//! ```json
//! {
//!   "default_method": "FIFO",
//!   "default_negative_stock": "Reject",
//!   "checkpoint_interval": 64,
//!   "items": {
//!     "flour": { "method": "AVERAGE", "unit": "kg" },
//!     "oil":   { "negative_stock": "Allow" }
//!   }
//! }
//! ```

use kardex_core::{NegativeStockPolicy, ValuationMethod};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default number of ledger entries between cost layer checkpoints.
pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 64;

/// Error loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// The path that failed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid JSON for [`EngineConfig`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Per-item settings seeded into the item registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemSettings {
    /// Valuation method for the item.
    pub method: Option<ValuationMethod>,
    /// Negative stock policy for the item.
    pub negative_stock: Option<NegativeStockPolicy>,
    /// Unit of measure, for display.
    pub unit: Option<String>,
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Method for items the registry does not know.
    pub default_method: ValuationMethod,
    /// Negative stock policy for items the registry does not know.
    pub default_negative_stock: NegativeStockPolicy,
    /// Ledger entries between cost layer checkpoints. `0` disables them.
    pub checkpoint_interval: usize,
    /// Known items.
    pub items: BTreeMap<String, ItemSettings>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_method: ValuationMethod::default(),
            default_negative_stock: NegativeStockPolicy::default(),
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            items: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON.
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Set the default valuation method.
    #[must_use]
    pub const fn with_default_method(mut self, method: ValuationMethod) -> Self {
        self.default_method = method;
        self
    }

    /// Set the default negative stock policy.
    #[must_use]
    pub const fn with_negative_stock(mut self, policy: NegativeStockPolicy) -> Self {
        self.default_negative_stock = policy;
        self
    }

    /// Set the checkpoint interval.
    #[must_use]
    pub const fn with_checkpoint_interval(mut self, interval: usize) -> Self {
        self.checkpoint_interval = interval;
        self
    }

    /// Add or replace an item's settings.
    #[must_use]
    pub fn with_item(mut self, item_id: impl Into<String>, settings: ItemSettings) -> Self {
        self.items.insert(item_id.into(), settings);
        self
    }
}
