//! `RepeatFor`, `RepeatTimes`, `RepeatForever`: loop a single instruction,
//! optionally gated by a `repeat_every` cadence.
//!
//! All three run the wrapped instruction through a fresh [`super::Runner`]
//! each iteration. When `repeat_every` is set and the instruction has not
//! finished by the time the interval elapses, the instruction is stopped
//! and — for `RepeatFor`/`RepeatTimes` only — a [`SynapseError::LogicFault`]
//! is raised *unless* the loop was itself told to stop. `RepeatForever`
//! raises unconditionally in that situation, with no such guard; that
//! asymmetry between the three is preserved deliberately rather than
//! "fixed" to be consistent.
//!
//! Whether the loop exited because it was stopped or because it ran its
//! course (elapsed/iterations) is reported via [`RunOutcome`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use crate::bus::EventBus;
use crate::cancel::StopFlag;
use crate::error::{SynapseError, SynapseResult};

use super::{Instruction, RunOutcome, Runner};

async fn run_one_iteration(
    bus: &Arc<EventBus>,
    instruction: &Arc<dyn Instruction>,
    repeat_every: Option<Duration>,
    stop_flag: &Arc<StopFlag>,
    panic_on_overrun_even_if_stopped: bool,
) -> SynapseResult<()> {
    let runner = Runner::new(bus.clone(), instruction.clone());
    runner.start()?;
    if let Some(interval) = repeat_every {
        tokio::select! {
            () = tokio::time::sleep(interval) => {},
            () = stop_flag.wait() => {},
        }
        if !runner.finished() {
            runner.stop().await?;
            if panic_on_overrun_even_if_stopped || !stop_flag.is_set() {
                return Err(SynapseError::logic_fault(format!(
                    "{}: still running! unable to repeat every {:?}",
                    instruction.description(),
                    interval
                )));
            }
        }
    }
    runner.result().await?;
    Ok(())
}

/// Repeats `instruction` until `seconds` have elapsed (checked after each
/// iteration completes, not preemptively).
pub struct RepeatFor {
    instruction: Arc<dyn Instruction>,
    seconds: f64,
    repeat_every: Option<Duration>,
    stop_flag: Arc<StopFlag>,
}

impl RepeatFor {
    #[must_use]
    pub fn new(instruction: Arc<dyn Instruction>, seconds: f64, repeat_every: Option<f64>) -> Self {
        Self {
            instruction,
            seconds,
            repeat_every: repeat_every.map(Duration::from_secs_f64),
            stop_flag: StopFlag::new(),
        }
    }
}

#[async_trait]
impl Instruction for RepeatFor {
    fn description(&self) -> String {
        format!(
            "RepeatFor: repeat {}for {}s: {}",
            self.repeat_every.map(|d| format!("every {d:?} ")).unwrap_or_default(),
            self.seconds,
            self.instruction.description()
        )
    }

    async fn run(&self, bus: Arc<EventBus>) -> SynapseResult<RunOutcome> {
        let start = Instant::now();
        loop {
            if self.stop_flag.is_set() {
                return Ok(RunOutcome::Stopped);
            }
            run_one_iteration(&bus, &self.instruction, self.repeat_every, &self.stop_flag, false).await?;
            if self.stop_flag.is_set() {
                return Ok(RunOutcome::Stopped);
            }
            if start.elapsed().as_secs_f64() >= self.seconds {
                return Ok(RunOutcome::completed(Value::Null));
            }
        }
    }

    async fn stop(&self) {
        self.instruction.stop().await;
        self.stop_flag.set();
    }
}

/// Repeats `instruction` a fixed number of `iterations`.
pub struct RepeatTimes {
    instruction: Arc<dyn Instruction>,
    iterations: u64,
    repeat_every: Option<Duration>,
    stop_flag: Arc<StopFlag>,
}

impl RepeatTimes {
    #[must_use]
    pub fn new(instruction: Arc<dyn Instruction>, iterations: u64, repeat_every: Option<f64>) -> Self {
        Self {
            instruction,
            iterations,
            repeat_every: repeat_every.map(Duration::from_secs_f64),
            stop_flag: StopFlag::new(),
        }
    }
}

#[async_trait]
impl Instruction for RepeatTimes {
    fn description(&self) -> String {
        format!(
            "RepeatTimes: repeat({}iterations{}): {}",
            self.iterations,
            self.repeat_every.map(|d| format!(", {d:?}")).unwrap_or_default(),
            self.instruction.description()
        )
    }

    async fn run(&self, bus: Arc<EventBus>) -> SynapseResult<RunOutcome> {
        let mut counter: u64 = 1;
        loop {
            if self.stop_flag.is_set() {
                return Ok(RunOutcome::Stopped);
            }
            run_one_iteration(&bus, &self.instruction, self.repeat_every, &self.stop_flag, false).await?;
            if self.stop_flag.is_set() {
                return Ok(RunOutcome::Stopped);
            }
            if counter < self.iterations {
                counter += 1;
            } else {
                return Ok(RunOutcome::completed(Value::Null));
            }
        }
    }

    async fn stop(&self) {
        self.instruction.stop().await;
        self.stop_flag.set();
    }
}

/// Repeats `instruction` indefinitely; only `stop()` ends the loop.
pub struct RepeatForever {
    instruction: Arc<dyn Instruction>,
    repeat_every: Option<Duration>,
    stop_flag: Arc<StopFlag>,
}

impl RepeatForever {
    #[must_use]
    pub fn new(instruction: Arc<dyn Instruction>, repeat_every: Option<f64>) -> Self {
        Self {
            instruction,
            repeat_every: repeat_every.map(Duration::from_secs_f64),
            stop_flag: StopFlag::new(),
        }
    }
}

#[async_trait]
impl Instruction for RepeatForever {
    fn description(&self) -> String {
        format!(
            "RepeatForever: repeat{}: {}",
            self.repeat_every.map(|d| format!("(every {d:?})")).unwrap_or_default(),
            self.instruction.description()
        )
    }

    async fn run(&self, bus: Arc<EventBus>) -> SynapseResult<RunOutcome> {
        loop {
            if self.stop_flag.is_set() {
                return Ok(RunOutcome::Stopped);
            }
            run_one_iteration(&bus, &self.instruction, self.repeat_every, &self.stop_flag, true).await?;
        }
    }

    async fn stop(&self) {
        self.instruction.stop().await;
        self.stop_flag.set();
    }
}
