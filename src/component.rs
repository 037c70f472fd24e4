//! Components: process-wide uniquely-named units that expose a small public
//! surface of methods and variables, and the [`Registry`] that tracks them.
//!
//! Unique names are enforced at registration; only public
//! (non-underscore-prefixed) attributes are observable; only writes
//! through the registry post a [`crate::event::VariableUpdateEvent`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::bus::EventBus;
use crate::error::{SynapseError, SynapseResult};

pub type ComponentHandle = Arc<dyn Component>;

/// What a component declares about itself. Replaces reflective discovery
/// (there is no `dir()` in Rust).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentDescriptor {
    pub methods: Vec<String>,
    pub variables: Vec<String>,
}

impl ComponentDescriptor {
    #[must_use]
    pub fn new(methods: Vec<String>, variables: Vec<String>) -> Self {
        Self { methods, variables }
    }
}

/// The contract every component implements. `get_variable`/`set_variable`/
/// `call_method` dispatch by name rather than through Rust's type system,
/// because the registry and the access surface need to reach any component
/// without knowing its concrete type ahead of time.
#[async_trait]
pub trait Component: Send + Sync {
    fn name(&self) -> &str;

    fn describe(&self) -> ComponentDescriptor;

    async fn get_variable(&self, variable: &str) -> SynapseResult<Value>;

    /// Performs the write itself. Does **not** post a `VariableUpdate` —
    /// that is the registry's responsibility (see [`Registry::set_variable`]),
    /// so that every registry-mediated write is observable uniformly and a
    /// component's own internal writes can stay silent.
    async fn set_variable(&self, variable: &str, value: Value) -> SynapseResult<()>;

    async fn call_method(&self, method: &str, args: Vec<Value>) -> SynapseResult<Value>;

    /// Stops any background activity the component owns. Idempotent.
    async fn stop(&self);
}

/// Process-wide registry of components, keyed by their unique name.
///
/// Enforces the uniqueness invariant at registration under a per-registry
/// lock (rather than a global static, so multiple `Application`s in one
/// process don't interfere) and owns the only code path that turns a
/// component write into a `VariableUpdate` event.
pub struct Registry {
    bus: Arc<EventBus>,
    names: std::sync::Mutex<HashSet<String>>,
    components: RwLock<HashMap<String, ComponentHandle>>,
}

impl Registry {
    #[must_use]
    pub fn new(bus: Arc<EventBus>) -> Arc<Self> {
        Arc::new(Self {
            bus,
            names: std::sync::Mutex::new(HashSet::new()),
            components: RwLock::new(HashMap::new()),
        })
    }

    /// Registers `component`. Fails with [`SynapseError::DuplicateRegistration`]
    /// if a component with the same name is already registered.
    pub async fn register(&self, component: ComponentHandle) -> SynapseResult<()> {
        let name = component.name().to_string();
        {
            let mut names = self.names.lock().unwrap();
            if !names.insert(name.clone()) {
                return Err(SynapseError::duplicate_registration(name));
            }
        }
        self.components.write().await.insert(name, component);
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Option<ComponentHandle> {
        self.components.read().await.get(name).cloned()
    }

    pub async fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.components.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn get_variable(&self, component: &str, variable: &str) -> SynapseResult<Value> {
        let handle = self
            .get(component)
            .await
            .ok_or_else(|| SynapseError::unknown_component(component))?;
        handle.get_variable(variable).await
    }

    /// Writes `variable` on `component`, then — if the write succeeded and
    /// the variable is public (does not start with `_`) — posts a
    /// `VariableUpdate` event. This is the single path every external
    /// writer must use to mutate a variable observably.
    pub async fn set_variable(&self, component: &str, variable: &str, value: Value) -> SynapseResult<()> {
        let handle = self
            .get(component)
            .await
            .ok_or_else(|| SynapseError::unknown_component(component))?;
        handle.set_variable(variable, value.clone()).await?;
        if !variable.starts_with('_') {
            self.bus.publish_variable_update(component, variable, value).await;
        }
        Ok(())
    }

    pub async fn call_method(&self, component: &str, method: &str, args: Vec<Value>) -> SynapseResult<Value> {
        let handle = self
            .get(component)
            .await
            .ok_or_else(|| SynapseError::unknown_component(component))?;
        handle.call_method(method, args).await
    }

    pub async fn describe(&self, component: &str) -> SynapseResult<ComponentDescriptor> {
        let handle = self
            .get(component)
            .await
            .ok_or_else(|| SynapseError::unknown_component(component))?;
        Ok(handle.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        name: String,
        value: std::sync::Mutex<i64>,
    }

    #[async_trait]
    impl Component for Counter {
        fn name(&self) -> &str {
            &self.name
        }

        fn describe(&self) -> ComponentDescriptor {
            ComponentDescriptor::new(vec!["increment".into()], vec!["value".into()])
        }

        async fn get_variable(&self, variable: &str) -> SynapseResult<Value> {
            match variable {
                "value" => Ok(Value::from(*self.value.lock().unwrap())),
                other => Err(SynapseError::attribute_fault(&self.name, other, "no such variable")),
            }
        }

        async fn set_variable(&self, variable: &str, value: Value) -> SynapseResult<()> {
            match variable {
                "value" => {
                    *self.value.lock().unwrap() = value.as_i64().unwrap_or_default();
                    Ok(())
                }
                other => Err(SynapseError::attribute_fault(&self.name, other, "no such variable")),
            }
        }

        async fn call_method(&self, method: &str, _args: Vec<Value>) -> SynapseResult<Value> {
            match method {
                "increment" => {
                    let mut value = self.value.lock().unwrap();
                    *value += 1;
                    Ok(Value::from(*value))
                }
                other => Err(SynapseError::bad_parameters(format!("no such method: {other}"))),
            }
        }

        async fn stop(&self) {}
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let registry = Registry::new(EventBus::new());
        let a = Arc::new(Counter {
            name: "c".into(),
            value: std::sync::Mutex::new(0),
        });
        let b = Arc::new(Counter {
            name: "c".into(),
            value: std::sync::Mutex::new(0),
        });
        registry.register(a).await.unwrap();
        let result = registry.register(b).await;
        assert!(matches!(result, Err(SynapseError::DuplicateRegistration(_))));
    }

    #[tokio::test]
    async fn set_variable_through_registry_publishes_update() {
        let bus = EventBus::new();
        let registry = Registry::new(bus.clone());
        let component = Arc::new(Counter {
            name: "c".into(),
            value: std::sync::Mutex::new(0),
        });
        registry.register(component).await.unwrap();

        let received = Arc::new(std::sync::Mutex::new(None));
        let received_clone = received.clone();
        bus.register_handler(
            crate::event::EventClass::VariableUpdate,
            crate::bus::handler_fn(move |event| {
                let received = received_clone.clone();
                async move {
                    if let crate::event::Event::VariableUpdate(update) = event {
                        *received.lock().unwrap() = Some(update.value);
                    }
                    Ok(())
                }
            }),
        )
        .await;

        registry.set_variable("c", "value", Value::from(42)).await.unwrap();
        bus.stop().await;
        assert_eq!(received.lock().unwrap().clone(), Some(Value::from(42)));
    }

    #[tokio::test]
    async fn unknown_component_is_reported() {
        let registry = Registry::new(EventBus::new());
        let result = registry.get_variable("nope", "x").await;
        assert!(matches!(result, Err(SynapseError::UnknownComponent(_))));
    }
}
