//! Error types shared across the crate.
//!
//! One enum, grouped by concern rather than by module: a single
//! `thiserror` enum with `is_transient`/`is_permanent` helpers where the
//! distinction is meaningful to a caller deciding whether to retry.

use thiserror::Error;

/// The crate-wide error type.
///
/// Variant choice follows the six error kinds named by the component design:
/// bad parameters, logic faults (state-machine misuse), attribute faults
/// (bad reads/writes against a component), unknown components, duplicate
/// registration, and handler faults raised from inside an event handler.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SynapseError {
    #[error("bad parameters: {0}")]
    BadParameters(String),

    #[error("logic fault: {0}")]
    LogicFault(String),

    #[error("attribute fault on {component}.{attribute}: {reason}")]
    AttributeFault {
        component: String,
        attribute: String,
        reason: String,
    },

    #[error("unknown component: {0}")]
    UnknownComponent(String),

    #[error("component already registered: {0}")]
    DuplicateRegistration(String),

    #[error("handler fault: {0}")]
    HandlerFault(String),
}

impl SynapseError {
    pub fn bad_parameters(msg: impl Into<String>) -> Self {
        Self::BadParameters(msg.into())
    }

    pub fn logic_fault(msg: impl Into<String>) -> Self {
        Self::LogicFault(msg.into())
    }

    pub fn attribute_fault(
        component: impl Into<String>,
        attribute: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::AttributeFault {
            component: component.into(),
            attribute: attribute.into(),
            reason: reason.into(),
        }
    }

    pub fn unknown_component(name: impl Into<String>) -> Self {
        Self::UnknownComponent(name.into())
    }

    pub fn duplicate_registration(name: impl Into<String>) -> Self {
        Self::DuplicateRegistration(name.into())
    }

    pub fn handler_fault(msg: impl Into<String>) -> Self {
        Self::HandlerFault(msg.into())
    }

    /// Whether a caller might reasonably retry the operation that produced
    /// this error. Attribute faults and logic faults are not transient: the
    /// caller asked for something that does not exist or is in the wrong
    /// state, and retrying without changing anything will fail the same way.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::HandlerFault(_))
    }

    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        !self.is_transient()
    }
}

pub type SynapseResult<T> = Result<T, SynapseError>;
