//! The pluggable "wait runner" racers shared by every `Wait*` instruction,
//! and the race executor that runs them concurrently and returns whichever
//! finishes first.
//!
//! `BlockingWait`/`TimeoutWait` are inverse timers, `StopEventWatcher`
//! races the instruction's own stop flag against the race-control flag,
//! and `AttributesWatcher` polls watched attributes, starting a stability
//! timer once they enter range and cancelling it the moment they leave.
//! `execute_wait` awaits every spawned racer task after the winner is
//! known, even though only the first result is used, so no racer is ever
//! left running in the background.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::cancel::StopFlag;
use crate::component::ComponentHandle;
use crate::error::SynapseError;

/// Default interval `AttributesWatcher` polls watched attributes at.
pub const ATTRIBUTE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// One participant in a wait race. `run` must return once either the wait
/// condition is satisfied, or `stop_running` becomes set by a faster racer.
#[async_trait]
pub trait WaitRunner: Send + Sync {
    async fn run(&self, stop_running: Arc<StopFlag>) -> bool;
}

/// Runs every racer in `runners` concurrently; returns the boolean result of
/// whichever finishes first, after setting `stop_running` (unblocking the
/// rest) and waiting for all of them to actually return.
pub async fn execute_wait(runners: Vec<Arc<dyn WaitRunner>>) -> bool {
    let stop_running = StopFlag::new();
    let (tx, mut rx) = tokio::sync::mpsc::channel(runners.len().max(1));

    let mut handles = Vec::with_capacity(runners.len());
    for runner in runners {
        let stop_running = stop_running.clone();
        let tx = tx.clone();
        handles.push(tokio::spawn(async move {
            let result = runner.run(stop_running).await;
            let _ = tx.send(result).await;
        }));
    }
    drop(tx);

    let winner = rx.recv().await.unwrap_or(false);
    stop_running.set();
    for handle in handles {
        let _ = handle.await;
    }
    winner
}

/// Blocks for `duration`; returns `true` if the full duration elapsed
/// without `stop_running` becoming set, `false` if interrupted early.
pub struct BlockingWait {
    pub duration: Duration,
}

#[async_trait]
impl WaitRunner for BlockingWait {
    async fn run(&self, stop_running: Arc<StopFlag>) -> bool {
        !stop_running.wait_timeout(self.duration).await
    }
}

/// The mirror image of [`BlockingWait`]: returns `true` if `stop_running`
/// becomes set before `duration` elapses, `false` if the timeout wins.
pub struct TimeoutWait {
    pub duration: Duration,
}

#[async_trait]
impl WaitRunner for TimeoutWait {
    async fn run(&self, stop_running: Arc<StopFlag>) -> bool {
        stop_running.wait_timeout(self.duration).await
    }
}

/// Races the instruction's own exposed stop flag against the race-control
/// flag. Returns whether the instruction's own flag is the one that got set.
pub struct StopEventWatcher {
    pub stop_flag: Arc<StopFlag>,
}

#[async_trait]
impl WaitRunner for StopEventWatcher {
    async fn run(&self, stop_running: Arc<StopFlag>) -> bool {
        tokio::select! {
            () = stop_running.wait() => {},
            () = self.stop_flag.wait() => {},
        }
        self.stop_flag.is_set()
    }
}

/// One attribute being watched by [`AttributesWatcher`]: a resolved
/// component handle, the attribute's name, and the range test to apply to
/// its (numeric) value.
pub struct WatchedAttribute {
    pub component: ComponentHandle,
    pub name: String,
    pub in_range: Arc<dyn Fn(f64) -> bool + Send + Sync>,
}

impl WatchedAttribute {
    async fn is_in_range(&self) -> bool {
        match self.component.get_variable(&self.name).await {
            Ok(value) => value.as_f64().is_some_and(|number| (self.in_range)(number)),
            Err(_) => false,
        }
    }
}

/// Validates that `attributes` exist and are currently readable on
/// `component` before the wait race starts, rather than failing silently
/// partway through polling.
pub async fn validate_watched_attributes(
    component: &ComponentHandle,
    attributes: &[String],
) -> Result<(), SynapseError> {
    for attribute in attributes {
        component.get_variable(attribute).await?;
    }
    Ok(())
}

/// Polls the watched attributes; once all of them enter range, starts a
/// stability timer of `stable_for`. Leaving range before the timer fires
/// cancels it. Returns `true` once the timer has run uninterrupted for the
/// full `stable_for` duration.
pub struct AttributesWatcher {
    pub attributes: Vec<WatchedAttribute>,
    pub stable_for: Duration,
}

#[async_trait]
impl WaitRunner for AttributesWatcher {
    async fn run(&self, stop_running: Arc<StopFlag>) -> bool {
        let mut entered_range_at: Option<Instant> = None;
        loop {
            if stop_running.is_set() {
                return false;
            }
            let mut all_in_range = true;
            for attribute in &self.attributes {
                if !attribute.is_in_range().await {
                    all_in_range = false;
                    break;
                }
            }
            if all_in_range {
                match entered_range_at {
                    Some(since) if since.elapsed() >= self.stable_for => return true,
                    Some(_) => {}
                    None => entered_range_at = Some(Instant::now()),
                }
            } else {
                entered_range_at = None;
            }
            tokio::select! {
                () = stop_running.wait() => return false,
                () = tokio::time::sleep(ATTRIBUTE_POLL_INTERVAL) => {},
            }
        }
    }
}
