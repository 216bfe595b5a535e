//! Error types for topology declaration, validation and plan resolution

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{AddressError, ResourceKind};
use crate::validation::ValidationReport;

/// Broad class of a [`TopologyError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Caller mistake while assembling the model
    Declaration,
    /// The topology is internally inconsistent
    Structural,
    /// Binding table misuse or a blocked deferred value
    Resolution,
}

/// Errors that can occur while building, validating or resolving a topology
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    /// An entity with this name was already declared
    #[error("Duplicate name: {name} is already declared as {existing}")]
    DuplicateName { name: String, existing: ResourceKind },

    /// A reference names an entity that was never declared
    #[error("Unknown reference: {from} refers to undeclared {to}")]
    UnknownReference { from: String, to: String },

    /// A reference names an entity of the wrong kind
    #[error("Kind mismatch: {from} expects {to} to be a {expected}, found {found}")]
    KindMismatch {
        from: String,
        to: String,
        expected: ResourceKind,
        found: ResourceKind,
    },

    /// An address block could not be parsed
    #[error("Invalid address: {0}")]
    InvalidAddress(#[from] AddressError),

    /// The dependency graph contains a cycle
    #[error("Cycle detected: {}", path.join(" -> "))]
    CycleDetected { path: Vec<String> },

    /// The validator rejected the topology
    #[error("Topology rejected: {0}")]
    Validation(ValidationReport),

    /// A deferred attribute was resolved a second time
    #[error("Already resolved: {name}")]
    AlreadyResolved { name: String },

    /// A deferred attribute or output was read before it was resolved
    #[error("Unresolved at read: {name}")]
    UnresolvedAtRead { name: String },

    /// The name is not a deferred attribute or output promised by the plan
    #[error("Unknown deferred attribute: {name}")]
    UnknownDeferred { name: String },

    /// A dependency of this entity was marked failed by the engine
    #[error("Dependency failed: {entity} depends on failed {failed}")]
    DependencyFailed { entity: String, failed: String },
}

impl TopologyError {
    /// Classify the error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::DuplicateName { .. }
            | Self::UnknownReference { .. }
            | Self::KindMismatch { .. }
            | Self::InvalidAddress(_) => ErrorCategory::Declaration,
            Self::CycleDetected { .. } | Self::Validation(_) => ErrorCategory::Structural,
            Self::AlreadyResolved { .. }
            | Self::UnresolvedAtRead { .. }
            | Self::UnknownDeferred { .. }
            | Self::DependencyFailed { .. } => ErrorCategory::Resolution,
        }
    }
}

/// Result type for topology operations
pub type TopologyResult<T> = Result<T, TopologyError>;
