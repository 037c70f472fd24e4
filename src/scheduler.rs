//! `SchedulerComponent`: loads named [`Schedule`] instructions and runs them
//! one after another, exposing a component surface (`load`/`run`/`stop`/
//! `wait`/`reset`).
//!
//! Keeps its own run-next-step loop rather than building a nested
//! `Schedule` out of the loaded schedules, because this type holds a
//! *mutable*, growable list schedules can be `load()`-ed into again
//! between runs, where `Schedule`'s own instruction list is fixed at
//! construction.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use crate::bus::EventBus;
use crate::component::{Component, ComponentDescriptor};
use crate::error::{SynapseError, SynapseResult};
use crate::instruction::schedule::Schedule;
use crate::instruction::Instruction;

pub struct SchedulerComponent {
    name: String,
    bus: Arc<EventBus>,
    schedules: Mutex<Vec<Arc<Schedule>>>,
    index: AtomicUsize,
    started: AtomicBool,
    stopped: AtomicBool,
    finished_flag: Arc<AtomicBool>,
    finished_notify: Arc<Notify>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SchedulerComponent {
    #[must_use]
    pub fn new(name: impl Into<String>, bus: Arc<EventBus>) -> Arc<Self> {
        tracing::info!("starting scheduler component");
        Arc::new(Self {
            name: name.into(),
            bus,
            schedules: Mutex::new(Vec::new()),
            index: AtomicUsize::new(0),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            finished_flag: Arc::new(AtomicBool::new(true)),
            finished_notify: Arc::new(Notify::new()),
            handle: Mutex::new(None),
        })
    }

    /// Appends `schedule` to the list to run, in order. Schedules already
    /// loaded stay loaded; a second `load()` call grows the list rather
    /// than replacing it.
    pub async fn load(&self, schedule: Arc<Schedule>) {
        self.schedules.lock().await.push(schedule);
    }

    /// Starts running every loaded schedule in order, beginning with the
    /// first. Returns immediately. Fails if already running.
    pub fn run(self: &Arc<Self>) -> SynapseResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(SynapseError::logic_fault("cannot run the scheduler whilst already running"));
        }
        self.stopped.store(false, Ordering::SeqCst);
        self.finished_flag.store(false, Ordering::SeqCst);
        self.index.store(0, Ordering::SeqCst);

        let this = self.clone();
        let handle = tokio::spawn(async move {
            tracing::info!("running all steps of loaded schedule(s)");
            let schedules = this.schedules.lock().await.clone();
            for (index, schedule) in schedules.iter().enumerate() {
                this.index.store(index, Ordering::SeqCst);
                if this.stopped.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(error) = schedule.run(this.bus.clone()).await {
                    tracing::error!(%error, "schedule run failed");
                    break;
                }
            }
            tracing::info!("finished running loaded schedules");
            this.started.store(false, Ordering::SeqCst);
            this.stopped.store(false, Ordering::SeqCst);
            this.finished_flag.store(true, Ordering::SeqCst);
            this.finished_notify.notify_waiters();
        });
        *self.handle.try_lock().expect("run is not reentrant") = Some(handle);
        Ok(())
    }

    /// Stops whichever schedule is currently running.
    pub async fn stop_running(&self) {
        let schedules = self.schedules.lock().await;
        let index = self.index.load(Ordering::SeqCst);
        if let Some(schedule) = schedules.get(index) {
            schedule.stop().await;
        }
        self.stopped.store(true, Ordering::SeqCst);
        self.started.store(false, Ordering::SeqCst);
    }

    /// Blocks until the scheduler finishes running every loaded schedule,
    /// up to `timeout` if given.
    pub async fn wait(&self, timeout: Option<Duration>) {
        let wait_for_finish = async {
            loop {
                if self.finished_flag.load(Ordering::SeqCst) {
                    return;
                }
                let notified = self.finished_notify.notified();
                tokio::pin!(notified);
                if self.finished_flag.load(Ordering::SeqCst) {
                    return;
                }
                notified.await;
            }
        };
        match timeout {
            Some(duration) => {
                let _ = tokio::time::timeout(duration, wait_for_finish).await;
            }
            None => wait_for_finish.await,
        }
    }

    /// Clears every loaded schedule. Fails if the scheduler is currently
    /// running.
    pub fn reset(&self) -> SynapseResult<()> {
        if self.started.load(Ordering::SeqCst) {
            return Err(SynapseError::logic_fault("cannot reset scheduler whilst running a schedule"));
        }
        tracing::info!("reset scheduler component");
        self.schedules.try_lock().expect("reset is not reentrant").clear();
        self.stopped.store(false, Ordering::SeqCst);
        self.finished_flag.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl Component for SchedulerComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn describe(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(
            vec!["run".into(), "stop".into(), "reset".into()],
            vec!["running".into(), "schedule_index".into()],
        )
    }

    async fn get_variable(&self, variable: &str) -> SynapseResult<Value> {
        match variable {
            "running" => Ok(Value::Bool(self.started.load(Ordering::SeqCst))),
            "schedule_index" => Ok(Value::from(self.index.load(Ordering::SeqCst))),
            other => Err(SynapseError::attribute_fault(&self.name, other, "no such variable")),
        }
    }

    async fn set_variable(&self, variable: &str, _value: Value) -> SynapseResult<()> {
        Err(SynapseError::attribute_fault(&self.name, variable, "variable is read-only"))
    }

    async fn call_method(&self, method: &str, _args: Vec<Value>) -> SynapseResult<Value> {
        match method {
            "stop" => {
                self.stop_running().await;
                Ok(Value::Null)
            }
            "reset" => {
                self.reset()?;
                Ok(Value::Null)
            }
            other => Err(SynapseError::bad_parameters(format!("no such method: {other}"))),
        }
    }

    async fn stop(&self) {
        self.stop_running().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::wait::WaitSeconds;

    #[tokio::test]
    async fn running_twice_is_a_logic_fault() {
        let bus = EventBus::new();
        let scheduler = SchedulerComponent::new("sched", bus);
        scheduler
            .load(Arc::new(Schedule::new("s1", vec![Arc::new(WaitSeconds::new(0.01))])))
            .await;
        scheduler.run().unwrap();
        let result = scheduler.run();
        assert!(matches!(result, Err(SynapseError::LogicFault(_))));
        scheduler.wait(None).await;
    }

    #[tokio::test]
    async fn runs_loaded_schedules_in_order() {
        let bus = EventBus::new();
        let scheduler = SchedulerComponent::new("sched", bus);
        scheduler
            .load(Arc::new(Schedule::new("s1", vec![Arc::new(WaitSeconds::new(0.001))])))
            .await;
        scheduler
            .load(Arc::new(Schedule::new("s2", vec![Arc::new(WaitSeconds::new(0.001))])))
            .await;
        scheduler.run().unwrap();
        scheduler.wait(None).await;
        assert_eq!(scheduler.get_variable("running").await.unwrap(), Value::Bool(false));
    }

    #[tokio::test]
    async fn reset_while_running_is_rejected() {
        let bus = EventBus::new();
        let scheduler = SchedulerComponent::new("sched", bus);
        scheduler
            .load(Arc::new(Schedule::new("s1", vec![Arc::new(WaitSeconds::new(5.0))])))
            .await;
        scheduler.run().unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(matches!(scheduler.reset(), Err(SynapseError::LogicFault(_))));
        scheduler.stop_running().await;
    }
}
