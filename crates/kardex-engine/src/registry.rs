//! Item registry: where the engine learns each item's costing rules.
//!
//! The registry belongs to the surrounding application. The engine only
//! reads from it.

use kardex_core::{NegativeStockPolicy, ValuationMethod};
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::config::{EngineConfig, ItemSettings};

/// Read-only view of item master data.
pub trait ItemRegistry: Send + Sync {
    /// The item's current valuation method, if the item is known.
    fn valuation_method(&self, item_id: &str) -> Option<ValuationMethod>;

    /// The item's negative stock policy, if the item is known.
    fn negative_stock_policy(&self, item_id: &str) -> Option<NegativeStockPolicy>;

    /// The item's unit of measure.
    fn unit(&self, _item_id: &str) -> Option<String> {
        None
    }
}

/// A registry held in memory.
///
/// # Examples
///
/// ```
/// use kardex_engine::{InMemoryRegistry, ItemRegistry};
/// use kardex_core::ValuationMethod;
///
/// let registry = InMemoryRegistry::new();
/// registry.set_method("flour", ValuationMethod::Fifo);
///
/// assert_eq!(registry.valuation_method("flour"), Some(ValuationMethod::Fifo));
/// assert_eq!(registry.valuation_method("sugar"), None);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    items: RwLock<HashMap<String, ItemSettings>>,
}

impl InMemoryRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a registry from the `items` table of a configuration.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            items: RwLock::new(
                config
                    .items
                    .iter()
                    .map(|(id, settings)| (id.clone(), settings.clone()))
                    .collect(),
            ),
        }
    }

    /// Set an item's valuation method.
    pub fn set_method(&self, item_id: &str, method: ValuationMethod) {
        self.items
            .write()
            .entry(item_id.to_string())
            .or_default()
            .method = Some(method);
    }

    /// Set an item's negative stock policy.
    pub fn set_negative_stock(&self, item_id: &str, policy: NegativeStockPolicy) {
        self.items
            .write()
            .entry(item_id.to_string())
            .or_default()
            .negative_stock = Some(policy);
    }

    /// Set an item's unit of measure.
    pub fn set_unit(&self, item_id: &str, unit: impl Into<String>) {
        self.items
            .write()
            .entry(item_id.to_string())
            .or_default()
            .unit = Some(unit.into());
    }

    /// Number of known items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Check if no item is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl ItemRegistry for InMemoryRegistry {
    fn valuation_method(&self, item_id: &str) -> Option<ValuationMethod> {
        self.items.read().get(item_id).and_then(|s| s.method)
    }

    fn negative_stock_policy(&self, item_id: &str) -> Option<NegativeStockPolicy> {
        self.items.read().get(item_id).and_then(|s| s.negative_stock)
    }

    fn unit(&self, item_id: &str) -> Option<String> {
        self.items.read().get(item_id).and_then(|s| s.unit.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        let config = EngineConfig::default().with_item(
            "oil",
            ItemSettings {
                method: Some(ValuationMethod::Lifo),
                negative_stock: Some(NegativeStockPolicy::Allow),
                unit: Some("l".to_string()),
            },
        );
        let registry = InMemoryRegistry::from_config(&config);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.valuation_method("oil"), Some(ValuationMethod::Lifo));
        assert_eq!(
            registry.negative_stock_policy("oil"),
            Some(NegativeStockPolicy::Allow)
        );
        assert_eq!(registry.unit("oil").as_deref(), Some("l"));
    }

    #[test]
    fn test_setters_keep_other_settings() {
        let registry = InMemoryRegistry::new();
        registry.set_unit("salt", "kg");
        registry.set_method("salt", ValuationMethod::Fifo);

        assert_eq!(registry.unit("salt").as_deref(), Some("kg"));
        assert_eq!(registry.valuation_method("salt"), Some(ValuationMethod::Fifo));
        assert_eq!(registry.negative_stock_policy("salt"), None);
    }
}
