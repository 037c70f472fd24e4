//! Event types routed through the [`crate::bus::EventBus`].
//!
//! Events are a family: a recordable sub-family (variable updates) that
//! every "record everything" handler also receives, a request/reply kind
//! (get-component), and a stop family, modeled as a single enum
//! dispatched by discriminant rather than a class hierarchy.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::component::ComponentHandle;

/// The discriminant used for handler registration. `Recordable` is not a
/// concrete event kind; it is the family every recordable event also
/// dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventClass {
    VariableUpdate,
    GetComponent,
    Stop(StopKind),
    Recordable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopKind {
    /// A generic request to stop, not attributable to a fault or a user.
    Generic,
    /// Raised because a fire-and-forget handler returned an error.
    Exception,
    /// Raised by an operator/user action.
    User,
}

/// A variable on a component has been written via [`crate::component::Registry::set_variable`].
#[derive(Debug, Clone)]
pub struct VariableUpdateEvent {
    pub component: String,
    pub variable: String,
    pub value: Value,
}

/// Request/reply event used to resolve a component by name without handing
/// every instruction a direct registry reference.
#[derive(Clone)]
pub struct GetComponentEvent {
    pub name: String,
    callback: Arc<dyn Fn(Option<ComponentHandle>) + Send + Sync>,
}

impl fmt::Debug for GetComponentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GetComponentEvent")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl GetComponentEvent {
    pub fn new(
        name: impl Into<String>,
        callback: impl Fn(Option<ComponentHandle>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            callback: Arc::new(callback),
        }
    }

    pub fn invoke(&self, component: Option<ComponentHandle>) {
        (self.callback)(component);
    }
}

#[derive(Debug, Clone)]
pub struct StopEvent {
    pub kind: StopKind,
    pub reason: Option<String>,
}

impl StopEvent {
    #[must_use]
    pub fn generic(reason: impl Into<String>) -> Self {
        Self {
            kind: StopKind::Generic,
            reason: Some(reason.into()),
        }
    }

    #[must_use]
    pub fn user(reason: impl Into<String>) -> Self {
        Self {
            kind: StopKind::User,
            reason: Some(reason.into()),
        }
    }

    #[must_use]
    pub fn exception(reason: impl Into<String>) -> Self {
        Self {
            kind: StopKind::Exception,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Event {
    VariableUpdate(VariableUpdateEvent),
    GetComponent(GetComponentEvent),
    Stop(StopEvent),
}

impl Event {
    #[must_use]
    pub fn class(&self) -> EventClass {
        match self {
            Self::VariableUpdate(_) => EventClass::VariableUpdate,
            Self::GetComponent(_) => EventClass::GetComponent,
            Self::Stop(stop) => EventClass::Stop(stop.kind),
        }
    }

    /// Whether this event also dispatches to handlers registered against
    /// the [`EventClass::Recordable`] family.
    #[must_use]
    pub const fn is_recordable(&self) -> bool {
        matches!(self, Self::VariableUpdate(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_update_is_recordable() {
        let event = Event::VariableUpdate(VariableUpdateEvent {
            component: "c".into(),
            variable: "v".into(),
            value: Value::Null,
        });
        assert!(event.is_recordable());
        assert_eq!(event.class(), EventClass::VariableUpdate);
    }

    #[test]
    fn get_component_is_not_recordable() {
        let event = Event::GetComponent(GetComponentEvent::new("c", |_| {}));
        assert!(!event.is_recordable());
        assert_eq!(event.class(), EventClass::GetComponent);
    }

    #[test]
    fn stop_kinds_are_distinct_classes() {
        let generic = Event::Stop(StopEvent::generic("bye"));
        let user = Event::Stop(StopEvent::user("bye"));
        assert_ne!(generic.class(), user.class());
    }
}
