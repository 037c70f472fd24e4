//! `Parallel`: runs one master instruction and zero or more slave
//! instructions concurrently. The master finishing stops every slave; any
//! slave erroring stops the master and every other slave too, and that
//! error overrides the master's eventual result. A slave finishing
//! successfully before the master does not stop anything.
//!
//! `stop()` stops the master **and** every slave directly, rather than
//! relying on the master's own termination to cascade to the slaves.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinSet;

use crate::bus::EventBus;
use crate::error::{SynapseError, SynapseResult};

use super::{Instruction, RunOutcome};

pub struct Parallel {
    master: Arc<dyn Instruction>,
    slaves: Vec<Arc<dyn Instruction>>,
}

impl Parallel {
    #[must_use]
    pub fn new(master: Arc<dyn Instruction>, slaves: Vec<Arc<dyn Instruction>>) -> Self {
        Self { master, slaves }
    }
}

#[async_trait]
impl Instruction for Parallel {
    fn description(&self) -> String {
        format!(
            "Parallel: master={} slaves={:?}",
            self.master.description(),
            self.slaves.iter().map(|s| s.description()).collect::<Vec<_>>()
        )
    }

    async fn run(&self, bus: Arc<EventBus>) -> SynapseResult<RunOutcome> {
        tracing::info!(
            master = %self.master.description(),
            slaves = ?self.slaves.iter().map(|s| s.description()).collect::<Vec<_>>(),
            "Parallel: running"
        );

        let mut master_task = {
            let master = self.master.clone();
            let bus = bus.clone();
            tokio::spawn(async move { master.run(bus).await })
        };

        let mut slaves = JoinSet::new();
        for slave in &self.slaves {
            let slave = slave.clone();
            let bus = bus.clone();
            slaves.spawn(async move { slave.run(bus).await });
        }

        let mut master_result: Option<SynapseResult<RunOutcome>> = None;
        let mut slave_error: Option<SynapseError> = None;

        while master_result.is_none() || !slaves.is_empty() {
            tokio::select! {
                biased;
                result = &mut master_task, if master_result.is_none() => {
                    master_result = Some(result.expect("master task panicked"));
                    for slave in &self.slaves {
                        slave.stop().await;
                    }
                }
                next = slaves.join_next(), if !slaves.is_empty() => {
                    if let Some(outcome) = next {
                        if let Err(error) = outcome.expect("slave task panicked") {
                            if slave_error.is_none() {
                                slave_error = Some(error);
                                self.master.stop().await;
                                for slave in &self.slaves {
                                    slave.stop().await;
                                }
                            }
                        }
                    }
                }
            }
        }

        tracing::info!(master = %self.master.description(), "Parallel: finished");
        if let Some(error) = slave_error {
            return Err(error);
        }
        master_result.expect("loop only exits once the master has a result")
    }

    async fn stop(&self) {
        self.master.stop().await;
        for slave in &self.slaves {
            slave.stop().await;
        }
    }
}
