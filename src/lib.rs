//! Synapse: an embeddable component/event/scheduler core for composing
//! small cooperating units of work — components that expose named
//! variables and methods, an event bus that routes updates between them,
//! and a library of instructions (wait, call, set, repeat, schedule,
//! parallel) a scheduler runs against them.

pub mod access;
pub mod app;
pub mod bus;
pub mod cancel;
pub mod component;
pub mod config;
pub mod error;
pub mod event;
pub mod instruction;
pub mod logging;
pub mod scheduler;

pub use access::{AccessSurface, RegistryAccessSurface};
pub use app::Application;
pub use bus::EventBus;
pub use component::{Component, ComponentDescriptor, ComponentHandle, Registry};
pub use error::{SynapseError, SynapseResult};
pub use event::{Event, EventClass};
pub use instruction::{Instruction, RunOutcome, Runner};
pub use scheduler::SchedulerComponent;
