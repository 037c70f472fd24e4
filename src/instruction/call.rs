//! `Call`: invokes one public method on a named component.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::bus::{get_component, EventBus};
use crate::cancel::StopFlag;
use crate::error::SynapseResult;

use super::{Instruction, RunOutcome};

pub struct Call {
    component: String,
    method: String,
    args: Vec<Value>,
    stop_flag: Arc<StopFlag>,
}

impl Call {
    #[must_use]
    pub fn new(component: impl Into<String>, method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            component: component.into(),
            method: method.into(),
            args,
            stop_flag: StopFlag::new(),
        }
    }
}

#[async_trait]
impl Instruction for Call {
    fn description(&self) -> String {
        format!("Call {}.{}(args={:?})", self.component, self.method, self.args)
    }

    async fn run(&self, bus: Arc<EventBus>) -> SynapseResult<RunOutcome> {
        let instance = get_component(&bus, &self.component).await?;
        tracing::info!(component = %self.component, method = %self.method, "calling");
        let result = instance.call_method(&self.method, self.args.clone()).await?;
        tracing::info!(component = %self.component, method = %self.method, ?result, "called");
        Ok(RunOutcome::Completed(result))
    }

    // TODO: a method call that blocks for a long time cannot currently be
    // interrupted once started.
    async fn stop(&self) {
        self.stop_flag.set();
    }
}
