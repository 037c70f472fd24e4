//! The external access surface: the seam an out-of-scope RPC servicer would
//! sit behind. `AccessSurface` is the trait; [`RegistryAccessSurface`] is
//! the one concrete implementation, satisfying it directly against the
//! in-process [`crate::component::Registry`] with no network transport or
//! wire codec.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::component::Registry;
use crate::error::SynapseResult;

#[async_trait]
pub trait AccessSurface: Send + Sync {
    async fn list_components(&self) -> Vec<String>;
    async fn list_methods(&self, component: &str) -> SynapseResult<Vec<String>>;
    async fn list_variables(&self, component: &str) -> SynapseResult<Vec<String>>;
    async fn call_method(&self, component: &str, method: &str, args: Vec<Value>) -> SynapseResult<Value>;
    async fn get_variable(&self, component: &str, variable: &str) -> SynapseResult<Value>;
    async fn set_variable(&self, component: &str, variable: &str, value: Value) -> SynapseResult<()>;
}

pub struct RegistryAccessSurface {
    registry: Arc<Registry>,
}

impl RegistryAccessSurface {
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl AccessSurface for RegistryAccessSurface {
    async fn list_components(&self) -> Vec<String> {
        self.registry.list_names().await
    }

    async fn list_methods(&self, component: &str) -> SynapseResult<Vec<String>> {
        Ok(self.registry.describe(component).await?.methods)
    }

    async fn list_variables(&self, component: &str) -> SynapseResult<Vec<String>> {
        Ok(self.registry.describe(component).await?.variables)
    }

    async fn call_method(&self, component: &str, method: &str, args: Vec<Value>) -> SynapseResult<Value> {
        self.registry.call_method(component, method, args).await
    }

    async fn get_variable(&self, component: &str, variable: &str) -> SynapseResult<Value> {
        self.registry.get_variable(component, variable).await
    }

    async fn set_variable(&self, component: &str, variable: &str, value: Value) -> SynapseResult<()> {
        self.registry.set_variable(component, variable, value).await
    }
}
