use crate::core::adapters::PartnerAdapter;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

/// Builds the process-wide adapter registry at startup. Registration
/// failures are logged and skipped; a bad partner entry must never take
/// the process down.
pub struct AdapterRegistryBuilder {
    adapters: HashMap<String, Arc<dyn PartnerAdapter>>,
}

impl AdapterRegistryBuilder {
    pub fn new() -> Self {
        AdapterRegistryBuilder {
            adapters: HashMap::new(),
        }
    }

    pub fn register(&mut self, adapter: Arc<dyn PartnerAdapter>) {
        let code = adapter.partner().code.clone();

        if code.is_empty() {
            error!("Refusing to register adapter with empty partner code");
            return;
        }

        if adapter.partner().endpoint.is_empty() {
            error!("Refusing to register adapter {} with empty endpoint", code);
            return;
        }

        if self.adapters.contains_key(&code) {
            error!("Duplicate adapter registration for {}, keeping first", code);
            return;
        }

        info!("Registered adapter {}", code);
        self.adapters.insert(code, adapter);
    }

    pub fn build(self) -> AdapterRegistry {
        AdapterRegistry {
            adapters: Arc::new(self.adapters),
        }
    }
}

impl Default for AdapterRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only adapter lookup, frozen after startup.
#[derive(Clone)]
pub struct AdapterRegistry {
    adapters: Arc<HashMap<String, Arc<dyn PartnerAdapter>>>,
}

impl AdapterRegistry {
    pub fn get(&self, code: &str) -> Option<Arc<dyn PartnerAdapter>> {
        self.adapters.get(code).cloned()
    }

    pub fn all(&self) -> Vec<Arc<dyn PartnerAdapter>> {
        self.adapters.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::adapters::ortb::OrtbAdapter;
    use crate::core::models::partner::PartnerBuilder;

    fn adapter(code: &str, endpoint: &str) -> Arc<dyn PartnerAdapter> {
        Arc::new(OrtbAdapter::new(Arc::new(
            PartnerBuilder::default()
                .code(code.to_string())
                .endpoint(endpoint.to_string())
                .build()
                .unwrap(),
        )))
    }

    #[test]
    fn test_register_and_lookup() {
        let mut builder = AdapterRegistryBuilder::new();
        builder.register(adapter("x", "https://bid.x.test"));
        builder.register(adapter("y", "https://bid.y.test"));

        let registry = builder.build();

        assert_eq!(registry.len(), 2);
        assert!(registry.get("x").is_some());
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn test_bad_registrations_skip_without_panic() {
        let mut builder = AdapterRegistryBuilder::new();
        builder.register(adapter("", "https://bid.x.test"));
        builder.register(adapter("x", ""));
        builder.register(adapter("x", "https://bid.x.test"));
        builder.register(adapter("x", "https://bid.x2.test"));

        let registry = builder.build();

        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("x").unwrap().partner().endpoint,
            "https://bid.x.test"
        );
    }
}
