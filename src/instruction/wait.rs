//! The three leaf `Wait*` instructions: `WaitSeconds`, `WaitAttributesWithinRange`,
//! and `WaitAttributesGreaterThan`.
//!
//! `WaitSeconds` always reports `true`, whether it finished because the
//! duration elapsed or because it was stopped early. The two attribute
//! waits report whichever racer in [`crate::instruction::wait_support`]
//! actually won — stopping an in-flight wait always yields `true`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::bus::{get_component, EventBus};
use crate::cancel::StopFlag;
use crate::error::{SynapseError, SynapseResult};

use super::wait_support::{
    validate_watched_attributes, AttributesWatcher, BlockingWait, StopEventWatcher, TimeoutWait, WaitRunner,
    WatchedAttribute,
};
use super::{Instruction, RunOutcome};

/// Blocks for a fixed number of seconds, unless stopped first.
pub struct WaitSeconds {
    seconds: f64,
    stop_flag: Arc<StopFlag>,
}

impl WaitSeconds {
    #[must_use]
    pub fn new(seconds: f64) -> Self {
        Self {
            seconds,
            stop_flag: StopFlag::new(),
        }
    }
}

#[async_trait]
impl Instruction for WaitSeconds {
    fn description(&self) -> String {
        format!("WaitSeconds: waiting {:.2}s", self.seconds)
    }

    async fn run(&self, _bus: Arc<EventBus>) -> SynapseResult<RunOutcome> {
        tracing::info!(seconds = self.seconds, "WaitSeconds: waiting");
        let duration = Duration::from_secs_f64(self.seconds.max(0.0));
        let result = super::wait_support::execute_wait(vec![
            Arc::new(BlockingWait { duration }),
            Arc::new(StopEventWatcher {
                stop_flag: self.stop_flag.clone(),
            }),
        ])
        .await;
        tracing::info!(result, "WaitSeconds: finished");
        Ok(RunOutcome::completed(Value::Bool(result)))
    }

    async fn stop(&self) {
        self.stop_flag.set();
    }
}

fn range_test(minimum: f64, maximum: f64) -> Arc<dyn Fn(f64) -> bool + Send + Sync> {
    Arc::new(move |value| value >= minimum && value <= maximum)
}

fn threshold_test(threshold: f64) -> Arc<dyn Fn(f64) -> bool + Send + Sync> {
    Arc::new(move |value| value >= threshold)
}

async fn resolve_watched_attributes(
    bus: &EventBus,
    component: &str,
    attributes: &[String],
    in_range: Arc<dyn Fn(f64) -> bool + Send + Sync>,
) -> SynapseResult<Vec<WatchedAttribute>> {
    let instance = get_component(bus, component).await?;
    validate_watched_attributes(&instance, attributes).await?;
    Ok(attributes
        .iter()
        .map(|name| WatchedAttribute {
            component: instance.clone(),
            name: name.clone(),
            in_range: in_range.clone(),
        })
        .collect())
}

/// Waits for a set of attributes to enter `[minimum, maximum]` and remain
/// there for `stable_for` seconds, up to `timeout` seconds.
pub struct WaitAttributesWithinRange {
    component: String,
    attributes: Vec<String>,
    stable_for: f64,
    timeout: f64,
    minimum: f64,
    maximum: f64,
    stop_flag: Arc<StopFlag>,
}

impl WaitAttributesWithinRange {
    /// # Errors
    /// Returns [`SynapseError::BadParameters`] if `attributes` is empty.
    pub fn new(
        component: impl Into<String>,
        attributes: Vec<String>,
        stable_for: f64,
        timeout: f64,
        minimum: f64,
        maximum: f64,
    ) -> SynapseResult<Self> {
        if attributes.is_empty() {
            return Err(SynapseError::bad_parameters("attributes must not be empty"));
        }
        Ok(Self {
            component: component.into(),
            attributes,
            stable_for,
            timeout,
            minimum,
            maximum,
            stop_flag: StopFlag::new(),
        })
    }
}

#[async_trait]
impl Instruction for WaitAttributesWithinRange {
    fn description(&self) -> String {
        format!(
            "WaitAttributesWithinRange: waiting for {:.2} <= {}.{:?} <= {:.2}",
            self.minimum, self.component, self.attributes, self.maximum
        )
    }

    async fn run(&self, bus: Arc<EventBus>) -> SynapseResult<RunOutcome> {
        let watched =
            resolve_watched_attributes(&bus, &self.component, &self.attributes, range_test(self.minimum, self.maximum))
                .await?;
        let result = super::wait_support::execute_wait(vec![
            Arc::new(TimeoutWait {
                duration: Duration::from_secs_f64(self.timeout.max(0.0)),
            }) as Arc<dyn WaitRunner>,
            Arc::new(StopEventWatcher {
                stop_flag: self.stop_flag.clone(),
            }),
            Arc::new(AttributesWatcher {
                attributes: watched,
                stable_for: Duration::from_secs_f64(self.stable_for.max(0.0)),
            }),
        ])
        .await;
        Ok(RunOutcome::completed(Value::Bool(result)))
    }

    async fn stop(&self) {
        self.stop_flag.set();
    }
}

/// Waits for a set of attributes to rise to (or above) `threshold` and
/// remain there for `stable_for` seconds, up to `timeout` seconds.
pub struct WaitAttributesGreaterThan {
    component: String,
    attributes: Vec<String>,
    stable_for: f64,
    timeout: f64,
    threshold: f64,
    stop_flag: Arc<StopFlag>,
}

impl WaitAttributesGreaterThan {
    /// # Errors
    /// Returns [`SynapseError::BadParameters`] if `attributes` is empty.
    pub fn new(
        component: impl Into<String>,
        attributes: Vec<String>,
        stable_for: f64,
        timeout: f64,
        threshold: f64,
    ) -> SynapseResult<Self> {
        if attributes.is_empty() {
            return Err(SynapseError::bad_parameters("attributes must not be empty"));
        }
        Ok(Self {
            component: component.into(),
            attributes,
            stable_for,
            timeout,
            threshold,
            stop_flag: StopFlag::new(),
        })
    }
}

#[async_trait]
impl Instruction for WaitAttributesGreaterThan {
    fn description(&self) -> String {
        format!(
            "WaitAttributesGreaterThan: waiting for {}.{:?} >= {:.2}",
            self.component, self.attributes, self.threshold
        )
    }

    async fn run(&self, bus: Arc<EventBus>) -> SynapseResult<RunOutcome> {
        let watched =
            resolve_watched_attributes(&bus, &self.component, &self.attributes, threshold_test(self.threshold)).await?;
        let result = super::wait_support::execute_wait(vec![
            Arc::new(TimeoutWait {
                duration: Duration::from_secs_f64(self.timeout.max(0.0)),
            }) as Arc<dyn WaitRunner>,
            Arc::new(StopEventWatcher {
                stop_flag: self.stop_flag.clone(),
            }),
            Arc::new(AttributesWatcher {
                attributes: watched,
                stable_for: Duration::from_secs_f64(self.stable_for.max(0.0)),
            }),
        ])
        .await;
        Ok(RunOutcome::completed(Value::Bool(result)))
    }

    async fn stop(&self) {
        self.stop_flag.set();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, ComponentDescriptor, Registry};
    use async_trait::async_trait;

    struct Gauge {
        value: std::sync::Mutex<i64>,
    }

    #[async_trait]
    impl Component for Gauge {
        fn name(&self) -> &str {
            "gauge"
        }

        fn describe(&self) -> ComponentDescriptor {
            ComponentDescriptor::new(vec![], vec!["value".into()])
        }

        async fn get_variable(&self, variable: &str) -> SynapseResult<Value> {
            match variable {
                "value" => Ok(Value::from(*self.value.lock().unwrap())),
                other => Err(SynapseError::attribute_fault("gauge", other, "missing")),
            }
        }

        async fn set_variable(&self, variable: &str, value: Value) -> SynapseResult<()> {
            match variable {
                "value" => {
                    *self.value.lock().unwrap() = value.as_i64().unwrap_or_default();
                    Ok(())
                }
                other => Err(SynapseError::attribute_fault("gauge", other, "missing")),
            }
        }

        async fn call_method(&self, method: &str, _args: Vec<Value>) -> SynapseResult<Value> {
            Err(SynapseError::bad_parameters(format!("no such method: {method}")))
        }

        async fn stop(&self) {}
    }

    async fn bus_with_gauge(initial: i64) -> (Arc<EventBus>, Arc<Gauge>) {
        let bus = EventBus::new();
        let registry = Registry::new(bus.clone());
        let gauge = Arc::new(Gauge {
            value: std::sync::Mutex::new(initial),
        });
        registry.register(gauge.clone()).await.unwrap();
        bus.register_handler(
            crate::event::EventClass::GetComponent,
            crate::bus::handler_fn(move |event| {
                let registry = registry.clone();
                async move {
                    if let crate::event::Event::GetComponent(get) = event {
                        get.invoke(registry.get(&get.name).await);
                    }
                    Ok(())
                }
            }),
        )
        .await;
        (bus, gauge)
    }

    #[tokio::test]
    async fn wait_seconds_returns_true_when_elapsed() {
        let wait = WaitSeconds::new(0.02);
        let outcome = wait.run(EventBus::new()).await.unwrap();
        assert_eq!(outcome, RunOutcome::Completed(Value::Bool(true)));
    }

    #[tokio::test]
    async fn wait_seconds_returns_true_when_stopped_early() {
        let wait = Arc::new(WaitSeconds::new(5.0));
        let wait_clone = wait.clone();
        let handle = tokio::spawn(async move { wait_clone.run(EventBus::new()).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        wait.stop().await;
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome, RunOutcome::Completed(Value::Bool(true)));
    }

    #[tokio::test]
    async fn within_range_times_out_when_never_stable() {
        let (bus, _gauge) = bus_with_gauge(0).await;
        let wait = WaitAttributesWithinRange::new("gauge", vec!["value".into()], 0.1, 0.1, 100.0, 110.0).unwrap();
        let outcome = wait.run(bus).await.unwrap();
        assert_eq!(outcome, RunOutcome::Completed(Value::Bool(false)));
    }

    #[tokio::test]
    async fn within_range_succeeds_once_stable() {
        let (bus, gauge) = bus_with_gauge(105).await;
        let wait = WaitAttributesWithinRange::new("gauge", vec!["value".into()], 0.05, 2.0, 100.0, 110.0).unwrap();
        let _ = &gauge;
        let outcome = wait.run(bus).await.unwrap();
        assert_eq!(outcome, RunOutcome::Completed(Value::Bool(true)));
    }

    #[tokio::test]
    async fn greater_than_requires_non_empty_attributes() {
        let result = WaitAttributesGreaterThan::new("gauge", vec![], 0.0, 1.0, 10.0);
        assert!(matches!(result, Err(SynapseError::BadParameters(_))));
    }

    #[tokio::test]
    async fn missing_attribute_is_an_attribute_fault() {
        let (bus, _gauge) = bus_with_gauge(0).await;
        let wait = WaitAttributesWithinRange::new("gauge", vec!["no_such".into()], 0.1, 0.1, 0.0, 1.0).unwrap();
        let result = wait.run(bus).await;
        assert!(matches!(result, Err(SynapseError::AttributeFault { .. })));
    }
}
