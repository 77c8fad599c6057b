//! Adapter registry - lifecycle and multiplexed lookup of search adapters.
//!
//! The registry holds initialized adapter instances keyed by name, in
//! registration order. The engine owns one registry per process.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use super::{AdapterHealth, SearchAdapter};
use crate::error::{Result, SiftError};

/// Registry of initialized search adapters.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: Vec<(String, Arc<dyn SearchAdapter>)>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize an adapter and add it to the registry.
    ///
    /// Re-registering a name replaces the previous instance with a warning.
    pub async fn register(&mut self, adapter: Arc<dyn SearchAdapter>) -> Result<()> {
        adapter.initialize().await?;
        let name = adapter.name().to_string();
        if let Some(slot) = self.adapters.iter_mut().find(|(n, _)| *n == name) {
            warn!(adapter = %name, "Overwriting existing adapter registration");
            slot.1 = adapter;
        } else {
            self.adapters.push((name.clone(), adapter));
        }
        info!(adapter = %name, "Adapter registered and initialized");
        Ok(())
    }

    /// Get one initialized adapter by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn SearchAdapter>> {
        self.adapters
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, a)| Arc::clone(a))
            .ok_or_else(|| {
                SiftError::AdapterConfig(format!(
                    "Adapter '{name}' is not initialized. Available: {:?}",
                    self.active_adapters()
                ))
            })
    }

    /// Get the requested subset of adapters, or all active instances when
    /// `names` is `None` or empty. Order is deterministic (registration
    /// order for "all"; request order for a subset).
    pub fn get_adapters(&self, names: &Option<Vec<String>>) -> Result<Vec<Arc<dyn SearchAdapter>>> {
        match names {
            Some(requested) if !requested.is_empty() => {
                requested.iter().map(|n| self.get(n)).collect()
            }
            _ => {
                if self.adapters.is_empty() {
                    return Err(SiftError::AdapterConfig(
                        "No search adapters are initialized".into(),
                    ));
                }
                Ok(self.adapters.iter().map(|(_, a)| Arc::clone(a)).collect())
            }
        }
    }

    /// Names of all initialized adapters, in registration order.
    pub fn active_adapters(&self) -> Vec<String> {
        self.adapters.iter().map(|(n, _)| n.clone()).collect()
    }

    /// Run health checks on all adapters concurrently.
    pub async fn health_check_all(&self) -> Vec<(String, AdapterHealth)> {
        let checks = self
            .adapters
            .iter()
            .map(|(name, adapter)| {
                let name = name.clone();
                let adapter = Arc::clone(adapter);
                async move { (name, adapter.health_check().await) }
            })
            .collect::<Vec<_>>();
        join_all(checks).await
    }

    /// Gracefully shut down all adapters, logging individual failures.
    pub async fn shutdown_all(&mut self) {
        for (name, adapter) in self.adapters.drain(..) {
            adapter.shutdown().await;
            info!(adapter = %name, "Adapter shut down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::RawResults;
    use crate::models::{SearchOptions, StandardDocument};
    use async_trait::async_trait;

    struct StubAdapter {
        name: &'static str,
        healthy: bool,
    }

    #[async_trait]
    impl SearchAdapter for StubAdapter {
        fn name(&self) -> &'static str {
            self.name
        }
        async fn initialize(&self) -> Result<()> {
            Ok(())
        }
        async fn shutdown(&self) {}
        async fn search(&self, _query: &str, _options: &SearchOptions) -> Result<RawResults> {
            Ok(RawResults::default())
        }
        async fn fetch_document(&self, doc_id: &str) -> Result<serde_json::Value> {
            Err(SiftError::DocumentNotFound(doc_id.to_string()))
        }
        fn map_to_standard_schema(&self, _raw: &serde_json::Value) -> StandardDocument {
            StandardDocument::new("1", "t", "c")
        }
        async fn health_check(&self) -> AdapterHealth {
            if self.healthy {
                AdapterHealth::healthy(1, "ok")
            } else {
                AdapterHealth::unhealthy("stub down")
            }
        }
    }

    async fn registry_with(names: &[&'static str]) -> AdapterRegistry {
        let mut registry = AdapterRegistry::new();
        for name in names {
            registry
                .register(Arc::new(StubAdapter {
                    name,
                    healthy: true,
                }))
                .await
                .expect("register");
        }
        registry
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let registry = registry_with(&["alpha", "beta"]).await;
        assert_eq!(registry.active_adapters(), vec!["alpha", "beta"]);
        assert_eq!(registry.get("beta").expect("get").name(), "beta");
        assert!(registry.get("gamma").is_err());
    }

    #[tokio::test]
    async fn test_get_adapters_all_preserves_order() {
        let registry = registry_with(&["alpha", "beta", "gamma"]).await;
        let all = registry.get_adapters(&None).expect("all");
        let names: Vec<_> = all.iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["alpha", "beta", "gamma"]);

        let empty = registry.get_adapters(&Some(vec![])).expect("empty = all");
        assert_eq!(empty.len(), 3);
    }

    #[tokio::test]
    async fn test_get_adapters_subset() {
        let registry = registry_with(&["alpha", "beta", "gamma"]).await;
        let subset = registry
            .get_adapters(&Some(vec!["gamma".into(), "alpha".into()]))
            .expect("subset");
        let names: Vec<_> = subset.iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["gamma", "alpha"]);

        let missing = registry.get_adapters(&Some(vec!["nope".into()]));
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn test_get_adapters_empty_registry() {
        let registry = AdapterRegistry::new();
        assert!(registry.get_adapters(&None).is_err());
    }

    #[tokio::test]
    async fn test_health_check_all() {
        let mut registry = registry_with(&["alpha"]).await;
        registry
            .register(Arc::new(StubAdapter {
                name: "broken",
                healthy: false,
            }))
            .await
            .expect("register");

        let health = registry.health_check_all().await;
        assert_eq!(health.len(), 2);
        assert_eq!(health[0].0, "alpha");
        assert_eq!(health[0].1.status, "healthy");
        assert_eq!(health[1].0, "broken");
        assert_eq!(health[1].1.status, "unhealthy");
    }

    #[tokio::test]
    async fn test_shutdown_all_drains() {
        let mut registry = registry_with(&["alpha", "beta"]).await;
        registry.shutdown_all().await;
        assert!(registry.active_adapters().is_empty());
    }

    #[tokio::test]
    async fn test_register_overwrites_same_name() {
        let mut registry = registry_with(&["alpha"]).await;
        registry
            .register(Arc::new(StubAdapter {
                name: "alpha",
                healthy: false,
            }))
            .await
            .expect("re-register");
        assert_eq!(registry.active_adapters(), vec!["alpha"]);
        let health = registry.health_check_all().await;
        assert_eq!(health[0].1.status, "unhealthy");
    }
}
