//! A built-in adapter with no real venue behind it.
//!
//! Exists purely so `grimoire venues` and seed tests have something
//! concrete to list and simulate against — never a stand-in for a real
//! integration.

use async_trait::async_trait;

use crate::types::{ChainId, Result, Value};

use super::VenueAdapter;

pub struct MockAdapter {
    name: String,
    chains: Vec<ChainId>,
}

impl MockAdapter {
    pub fn new(name: impl Into<String>, chains: Vec<ChainId>) -> Self {
        Self {
            name: name.into(),
            chains,
        }
    }
}

#[async_trait]
impl VenueAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_chains(&self) -> &[ChainId] {
        &self.chains
    }

    async fn call(&self, _method: &str, _args: Vec<Value>) -> Result<Value> {
        Ok(Value::Bool(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_adapter_always_succeeds() {
        let adapter = MockAdapter::new("mock", vec![ChainId::new(1)]);
        let result = adapter.call("anything", vec![]).await.unwrap();
        assert_eq!(result, Value::Bool(true));
    }
}
