//! `Schedule`: a named, ordered list of instructions run strictly in
//! sequence. `stop()` stops whichever instruction is currently running;
//! the current index is an `AtomicUsize` since `stop()` can race `run()`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::bus::EventBus;
use crate::cancel::StopFlag;
use crate::error::SynapseResult;

use super::{Instruction, RunOutcome};

pub struct Schedule {
    description: String,
    instructions: Vec<Arc<dyn Instruction>>,
    index: AtomicUsize,
    stop_flag: Arc<StopFlag>,
}

impl Schedule {
    #[must_use]
    pub fn new(description: impl Into<String>, instructions: Vec<Arc<dyn Instruction>>) -> Self {
        Self {
            description: description.into(),
            instructions,
            index: AtomicUsize::new(0),
            stop_flag: StopFlag::new(),
        }
    }
}

#[async_trait]
impl Instruction for Schedule {
    fn description(&self) -> String {
        self.description.clone()
    }

    async fn run(&self, bus: Arc<EventBus>) -> SynapseResult<RunOutcome> {
        tracing::info!(schedule = %self.description, "running schedule");
        self.index.store(0, Ordering::SeqCst);
        loop {
            let index = self.index.load(Ordering::SeqCst);
            let instruction = &self.instructions[index];
            instruction.run(bus.clone()).await?;
            let next = index + 1;
            self.index.store(next, Ordering::SeqCst);
            if next >= self.instructions.len() || self.stop_flag.is_set() {
                break;
            }
        }
        let outcome = if self.stop_flag.is_set() {
            RunOutcome::Stopped
        } else {
            RunOutcome::completed(Value::Null)
        };
        tracing::info!(schedule = %self.description, "finished running schedule");
        Ok(outcome)
    }

    async fn stop(&self) {
        if self.instructions.is_empty() {
            return;
        }
        tracing::info!(schedule = %self.description, index = self.index.load(Ordering::SeqCst), "stopping schedule");
        self.stop_flag.set();
        let index = self.index.load(Ordering::SeqCst).min(self.instructions.len() - 1);
        self.instructions[index].stop().await;
    }
}
