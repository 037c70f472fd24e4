//! `Application`: wires together the event bus, the component registry,
//! and the scheduler, and blocks until a `Stop` event is posted.
//!
//! Registers its own handlers for `GetComponentEvent` (answering from the
//! registry), `VariableUpdateEvent` (logged), and every `StopEvent` kind;
//! `run()` blocks on the stop flag and, on the way out, stops every
//! registered component.

use std::sync::Arc;

use crate::bus::{handler_fn, EventBus};
use crate::cancel::StopFlag;
use crate::component::Registry;
use crate::event::{Event, EventClass, StopKind};
use crate::scheduler::SchedulerComponent;

pub const SCHEDULER_NAME: &str = "scheduler";

/// Ties the event bus, the component registry, and the scheduler together
/// into one runnable unit.
pub struct Application {
    pub bus: Arc<EventBus>,
    pub registry: Arc<Registry>,
    pub scheduler: Arc<SchedulerComponent>,
    stop_flag: Arc<StopFlag>,
}

impl Application {
    /// Builds an application with a fresh event bus and registry, and
    /// registers the scheduler component under [`SCHEDULER_NAME`].
    pub async fn new(worker_pool_size: usize) -> Arc<Self> {
        let bus = EventBus::with_pool_size(worker_pool_size);
        let registry = Registry::new(bus.clone());
        let scheduler = SchedulerComponent::new(SCHEDULER_NAME, bus.clone());
        registry
            .register(scheduler.clone())
            .await
            .expect("scheduler name is reserved and registered exactly once");

        let stop_flag = StopFlag::new();

        // Each handler below is bound to its event class explicitly, by name,
        // at this call site — there is no tagging mechanism that lets a
        // handler declare which events it wants at its own definition site.
        let registry_for_lookup = registry.clone();
        bus.register_handler(
            EventClass::GetComponent,
            handler_fn(move |event| {
                let registry = registry_for_lookup.clone();
                async move {
                    if let Event::GetComponent(get) = event {
                        get.invoke(registry.get(&get.name).await);
                    }
                    Ok(())
                }
            }),
        )
        .await;

        bus.register_handler(
            EventClass::VariableUpdate,
            handler_fn(|event| async move {
                if let Event::VariableUpdate(update) = event {
                    tracing::info!(component = %update.component, variable = %update.variable, value = %update.value, "variable update");
                }
                Ok(())
            }),
        )
        .await;

        for kind in [StopKind::Generic, StopKind::Exception, StopKind::User] {
            let stop_flag = stop_flag.clone();
            bus.register_handler(
                EventClass::Stop(kind),
                handler_fn(move |_event| {
                    let stop_flag = stop_flag.clone();
                    async move {
                        stop_flag.set();
                        Ok(())
                    }
                }),
            )
            .await;
        }

        Arc::new(Self {
            bus,
            registry,
            scheduler,
            stop_flag,
        })
    }

    /// Registers an arbitrary component alongside the scheduler.
    pub async fn register(&self, component: crate::component::ComponentHandle) -> crate::error::SynapseResult<()> {
        self.registry.register(component).await
    }

    /// Blocks until a `Stop` event is posted to the bus, then stops every
    /// registered component, including the scheduler.
    pub async fn run(&self) {
        tracing::info!("application started");
        self.stop_flag.wait().await;
        tracing::info!("stopping application");
        for name in self.registry.list_names().await {
            if let Some(component) = self.registry.get(&name).await {
                tracing::debug!(component = %name, "stopping component");
                component.stop().await;
            }
        }
        tracing::info!("application stopped");
    }
}
