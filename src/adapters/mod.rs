//! Pluggable venue adapters.
//!
//! Mirrors the persistence-trait idiom used elsewhere in this problem
//! family: a small `async_trait` interface plus a registry keyed by venue
//! name, so `action @venue.method(...)` and expression-level
//! `@venue.method(...)` calls resolve to a concrete adapter at run time
//! without the scheduler knowing about any specific integration.

mod mock;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::types::{ChainId, Error, Result, Value};

pub use mock::MockAdapter;

/// A venue (DEX, lending market, bridge, …) a spell can call into.
#[async_trait]
pub trait VenueAdapter: Send + Sync {
    /// Stable name spells reference as `@name`.
    fn name(&self) -> &str;

    /// Chains this adapter can serve; used for skill-based venue
    /// auto-selection.
    fn supported_chains(&self) -> &[ChainId];

    /// Invokes `method` with positional `args`, returning its result value.
    async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value>;

    /// Dry-runs `method` without any on-chain effect — a quote, a gas
    /// estimate, a balance check. Defaults to `call`, since a read-only
    /// method (e.g. most advisory lookups) has no live/simulated
    /// distinction; adapters whose `call` has side effects should override
    /// this with a real quote path.
    async fn simulate(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        self.call(method, args).await
    }
}

/// Looks up adapters by venue name at evaluation/execution time.
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn VenueAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn VenueAdapter>) {
        self.adapters.insert(adapter.name().to_string(), adapter);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn VenueAdapter>> {
        self.adapters.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.adapters.keys().map(String::as_str).collect()
    }

    /// First adapter whose `supported_chains` contains `chain`; `TYPE_ERROR`
    /// if none of `skill_adapters` serves it.
    pub fn select_for_chain(&self, skill_adapters: &[String], chain: ChainId) -> Result<Arc<dyn VenueAdapter>> {
        for name in skill_adapters {
            if let Some(adapter) = self.get(name) {
                if adapter.supported_chains().contains(&chain) {
                    return Ok(adapter);
                }
            }
        }
        Err(Error::type_error(format!(
            "no adapter for skill on chain {chain}"
        )))
    }

    pub async fn invoke(&self, venue: &str, method: &str, args: Vec<Value>) -> Result<Value> {
        let adapter = self
            .get(venue)
            .ok_or_else(|| Error::type_error(format!("unknown venue @{venue}")))?;
        adapter.call(method, args).await
    }

    pub async fn invoke_simulated(&self, venue: &str, method: &str, args: Vec<Value>) -> Result<Value> {
        let adapter = self
            .get(venue)
            .ok_or_else(|| Error::type_error(format!("unknown venue @{venue}")))?;
        adapter.simulate(method, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registry_invokes_registered_adapter() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(MockAdapter::new("uniswap", vec![ChainId::new(1)])));
        let result = registry.invoke("uniswap", "quote", vec![]).await.unwrap();
        assert_eq!(result, Value::Bool(true));
    }

    #[test]
    fn select_for_chain_errors_with_type_error_when_no_match() {
        let registry = AdapterRegistry::new();
        let err = registry
            .select_for_chain(&["uniswap".to_string()], ChainId::new(1))
            .unwrap_err();
        assert_eq!(err.code(), "TYPE_ERROR");
    }
}
