//! `Set`: writes one or more public variables on a named component, in
//! order, stopping early if `stop()` is called mid-write.
//!
//! `Set` only holds a bus handle, not a registry handle, so it cannot
//! route its writes through `Registry::set_variable`. It instead performs
//! the same write-then-conditionally-post pair itself against the
//! resolved component, so a write through `Set` is just as observable as
//! one made through the registry directly.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::bus::{get_component, EventBus};
use crate::cancel::StopFlag;
use crate::error::SynapseResult;

use super::{Instruction, RunOutcome};

pub struct Set {
    component: String,
    attributes: Vec<(String, Value)>,
    stop_flag: Arc<StopFlag>,
}

impl Set {
    #[must_use]
    pub fn new(component: impl Into<String>, attributes: Vec<(String, Value)>) -> Self {
        Self {
            component: component.into(),
            attributes,
            stop_flag: StopFlag::new(),
        }
    }
}

#[async_trait]
impl Instruction for Set {
    fn description(&self) -> String {
        format!("Set: component={} attrs={:?}", self.component, self.attributes)
    }

    async fn run(&self, bus: Arc<EventBus>) -> SynapseResult<RunOutcome> {
        let instance = get_component(&bus, &self.component).await?;
        for (attribute, value) in &self.attributes {
            if self.stop_flag.is_set() {
                tracing::info!(component = %self.component, "Set stopping early");
                break;
            }
            tracing::info!(component = %self.component, %attribute, ?value, "Set");
            instance.set_variable(attribute, value.clone()).await?;
            if !attribute.starts_with('_') {
                bus.publish_variable_update(&self.component, attribute.clone(), value.clone()).await;
            }
        }
        Ok(RunOutcome::completed(Value::Null))
    }

    async fn stop(&self) {
        self.stop_flag.set();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, ComponentDescriptor, Registry};
    use crate::error::SynapseError;
    use async_trait::async_trait;

    struct Pair {
        foo: std::sync::Mutex<i64>,
        bar: std::sync::Mutex<i64>,
    }

    #[async_trait]
    impl Component for Pair {
        fn name(&self) -> &str {
            "pair"
        }

        fn describe(&self) -> ComponentDescriptor {
            ComponentDescriptor::new(vec![], vec!["foo".into(), "bar".into()])
        }

        async fn get_variable(&self, variable: &str) -> SynapseResult<Value> {
            match variable {
                "foo" => Ok(Value::from(*self.foo.lock().unwrap())),
                "bar" => Ok(Value::from(*self.bar.lock().unwrap())),
                other => Err(SynapseError::attribute_fault("pair", other, "missing")),
            }
        }

        async fn set_variable(&self, variable: &str, value: Value) -> SynapseResult<()> {
            match variable {
                "foo" => {
                    *self.foo.lock().unwrap() = value.as_i64().unwrap_or_default();
                    Ok(())
                }
                "bar" => {
                    *self.bar.lock().unwrap() = value.as_i64().unwrap_or_default();
                    Ok(())
                }
                other => Err(SynapseError::attribute_fault("pair", other, "missing")),
            }
        }

        async fn call_method(&self, method: &str, _args: Vec<Value>) -> SynapseResult<Value> {
            Err(SynapseError::bad_parameters(format!("no such method: {method}")))
        }

        async fn stop(&self) {}
    }

    async fn bus_with_registry() -> (Arc<EventBus>, Arc<Registry>) {
        let bus = EventBus::new();
        let registry = Registry::new(bus.clone());
        bus.register_handler(
            crate::event::EventClass::GetComponent,
            crate::bus::handler_fn({
                let registry = registry.clone();
                move |event| {
                    let registry = registry.clone();
                    async move {
                        if let crate::event::Event::GetComponent(get) = event {
                            get.invoke(registry.get(&get.name).await);
                        }
                        Ok(())
                    }
                }
            }),
        )
        .await;
        (bus, registry)
    }

    #[tokio::test]
    async fn set_writes_every_attribute_and_publishes_updates() {
        let (bus, registry) = bus_with_registry().await;
        registry
            .register(Arc::new(Pair {
                foo: std::sync::Mutex::new(0),
                bar: std::sync::Mutex::new(0),
            }))
            .await
            .unwrap();

        let updates = Arc::new(std::sync::Mutex::new(Vec::new()));
        let updates_clone = updates.clone();
        bus.register_handler(
            crate::event::EventClass::VariableUpdate,
            crate::bus::handler_fn(move |event| {
                let updates = updates_clone.clone();
                async move {
                    if let crate::event::Event::VariableUpdate(update) = event {
                        updates.lock().unwrap().push((update.variable, update.value));
                    }
                    Ok(())
                }
            }),
        )
        .await;

        let set = Set::new("pair", vec![("foo".into(), Value::from(1)), ("bar".into(), Value::from(2))]);
        let outcome = set.run(bus.clone()).await.unwrap();
        assert_eq!(outcome, RunOutcome::Completed(Value::Null));
        bus.stop().await;

        let updates = updates.lock().unwrap();
        assert_eq!(updates.len(), 2);
        assert!(updates.contains(&("foo".to_string(), Value::from(1))));
        assert!(updates.contains(&("bar".to_string(), Value::from(2))));
    }

    #[tokio::test]
    async fn stop_before_run_skips_all_writes() {
        let (bus, registry) = bus_with_registry().await;
        registry
            .register(Arc::new(Pair {
                foo: std::sync::Mutex::new(0),
                bar: std::sync::Mutex::new(0),
            }))
            .await
            .unwrap();
        let set = Set::new("pair", vec![("foo".into(), Value::from(9))]);
        set.stop().await;
        set.run(bus).await.unwrap();
        let foo = registry.get("pair").await.unwrap().get_variable("foo").await.unwrap();
        assert_eq!(foo.as_i64().unwrap(), 0);
    }
}
