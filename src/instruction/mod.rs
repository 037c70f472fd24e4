//! Instructions: the unit of work the scheduler runs, and the [`Runner`]
//! state machine (idle → running → finished, resettable back to idle) that
//! wraps one, capturing and re-raising its error on `result()`.

pub mod call;
pub mod parallel;
pub mod repeat;
pub mod schedule;
pub mod set;
pub mod wait;
pub mod wait_support;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::bus::EventBus;
use crate::error::{SynapseError, SynapseResult};

/// What a composite instruction's run loop actually did, distinguishing a
/// run that was stopped early from one that ran to completion. Only
/// `Schedule`, `Repeat*`, and `Parallel` use this distinction; the `Wait*`
/// instructions keep a plain `bool` result wrapped as `Completed`.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(Value),
    Stopped,
}

impl RunOutcome {
    #[must_use]
    pub fn completed(value: impl Into<Value>) -> Self {
        Self::Completed(value.into())
    }

    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

/// The contract every instruction implements. `run` executes the
/// instruction to completion (or until stopped); `stop` requests early
/// termination and must be safe to call at any point, including before
/// `run` has started or after it has finished.
#[async_trait]
pub trait Instruction: Send + Sync {
    fn description(&self) -> String;

    async fn run(&self, bus: Arc<EventBus>) -> SynapseResult<RunOutcome>;

    async fn stop(&self);
}

enum RunnerState {
    Idle,
    Running,
    Finished,
}

/// Runs one [`Instruction`] on its own `tokio` task and exposes a
/// non-blocking `start`/blocking `wait`/`stop`/`result`/`reset` surface.
pub struct Runner {
    bus: Arc<EventBus>,
    instruction: Arc<dyn Instruction>,
    state: Mutex<RunnerState>,
    finished_flag: Arc<AtomicBool>,
    finished_notify: Arc<Notify>,
    result: Mutex<Option<SynapseResult<RunOutcome>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Runner {
    #[must_use]
    pub fn new(bus: Arc<EventBus>, instruction: Arc<dyn Instruction>) -> Arc<Self> {
        Arc::new(Self {
            bus,
            instruction,
            state: Mutex::new(RunnerState::Idle),
            finished_flag: Arc::new(AtomicBool::new(false)),
            finished_notify: Arc::new(Notify::new()),
            result: Mutex::new(None),
            handle: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn description(&self) -> String {
        self.instruction.description()
    }

    #[must_use]
    pub fn finished(&self) -> bool {
        self.finished_flag.load(Ordering::SeqCst)
    }

    /// Starts the instruction running in the background. Returns
    /// immediately. Fails with [`SynapseError::LogicFault`] if this runner
    /// was already started.
    pub fn start(self: &Arc<Self>) -> SynapseResult<()> {
        {
            let mut state = self.state.lock().unwrap();
            if !matches!(*state, RunnerState::Idle) {
                return Err(SynapseError::logic_fault(format!(
                    "already started: {}",
                    self.instruction.description()
                )));
            }
            *state = RunnerState::Running;
        }

        let instruction = self.instruction.clone();
        let bus = self.bus.clone();
        let this = self.clone();
        let handle = tokio::spawn(async move {
            let outcome = instruction.run(bus).await;
            *this.result.lock().unwrap() = Some(outcome);
            *this.state.lock().unwrap() = RunnerState::Finished;
            this.finished_flag.store(true, Ordering::SeqCst);
            this.finished_notify.notify_waiters();
        });
        *self.handle.lock().unwrap() = Some(handle);
        Ok(())
    }

    async fn wait_for_finish(&self) {
        loop {
            if self.finished() {
                return;
            }
            let notified = self.finished_notify.notified();
            tokio::pin!(notified);
            if self.finished() {
                return;
            }
            notified.await;
        }
    }

    /// Blocks until the instruction finishes, or `timeout` elapses (if
    /// given). Fails with [`SynapseError::LogicFault`] if the runner was
    /// never started.
    pub async fn wait(&self, timeout: Option<Duration>) -> SynapseResult<()> {
        if matches!(*self.state.lock().unwrap(), RunnerState::Idle) {
            return Err(SynapseError::logic_fault("instruction was not started"));
        }
        match timeout {
            Some(duration) => {
                let _ = tokio::time::timeout(duration, self.wait_for_finish()).await;
            }
            None => self.wait_for_finish().await,
        }
        Ok(())
    }

    /// Blocks until the instruction finishes, then returns (a clone of) its
    /// result, propagating an error if `run` returned one.
    pub async fn result(&self) -> SynapseResult<RunOutcome> {
        self.wait(None).await?;
        self.result
            .lock()
            .unwrap()
            .clone()
            .expect("finished runner always has a result")
    }

    /// Requests the instruction stop, then blocks until it actually has and
    /// returns its result — even though it was stopped early.
    pub async fn stop(&self) -> SynapseResult<RunOutcome> {
        self.instruction.stop().await;
        self.result().await
    }

    /// Resets the runner back to idle so the same instruction can be run
    /// again. Fails if the instruction is currently running.
    pub fn reset(&self) -> SynapseResult<()> {
        let mut state = self.state.lock().unwrap();
        if matches!(*state, RunnerState::Running) {
            return Err(SynapseError::logic_fault("cannot reset whilst running"));
        }
        *state = RunnerState::Idle;
        *self.result.lock().unwrap() = None;
        *self.handle.lock().unwrap() = None;
        self.finished_flag.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::wait::WaitSeconds;

    #[tokio::test]
    async fn cannot_start_twice() {
        let bus = EventBus::new();
        let runner = Runner::new(bus, Arc::new(WaitSeconds::new(1.0)));
        runner.start().unwrap();
        let second = runner.start();
        assert!(matches!(second, Err(SynapseError::LogicFault(_))));
        runner.stop().await.unwrap();
    }

    #[tokio::test]
    async fn wait_before_start_is_a_logic_fault() {
        let bus = EventBus::new();
        let runner = Runner::new(bus, Arc::new(WaitSeconds::new(1.0)));
        let result = runner.wait(None).await;
        assert!(matches!(result, Err(SynapseError::LogicFault(_))));
    }

    #[tokio::test]
    async fn reset_while_running_is_rejected() {
        let bus = EventBus::new();
        let runner = Runner::new(bus, Arc::new(WaitSeconds::new(5.0)));
        runner.start().unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let result = runner.reset();
        assert!(matches!(result, Err(SynapseError::LogicFault(_))));
        runner.stop().await.unwrap();
    }

    #[tokio::test]
    async fn reset_after_finish_allows_rerun() {
        let bus = EventBus::new();
        let instruction = Arc::new(WaitSeconds::new(0.01));
        let runner = Runner::new(bus, instruction);
        runner.start().unwrap();
        runner.result().await.unwrap();
        runner.reset().unwrap();
        runner.start().unwrap();
        let outcome = runner.result().await.unwrap();
        assert_eq!(outcome, RunOutcome::Completed(Value::Bool(true)));
    }
}
