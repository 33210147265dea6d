//! Domain errors raised while assembling and formulating a model.
//!
//! These are wrapped in [`anyhow::Error`] as they propagate, so callers that need to react to a
//! particular kind of failure can use [`anyhow::Error::downcast_ref`].
use thiserror::Error;

/// Errors raised while building an energy system or its optimisation problem
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// An attribute of an entity violates one of its invariants
    #[error("Invalid value for {field} of {entity}: {reason}")]
    Validation {
        /// The offending entity (e.g. an inertia source)
        entity: String,
        /// The attribute which failed validation
        field: &'static str,
        /// What is wrong with the value
        reason: String,
    },

    /// A node has more connections of one kind than it supports
    #[error("Only one {direction} flow allowed in the storage {node}")]
    Cardinality {
        /// The offending node
        node: String,
        /// Either "input" or "output"
        direction: &'static str,
    },

    /// A quantity needed to write a constraint is missing or invalid
    #[error("Error in constraint creation for {location}: {reason}")]
    Formulation {
        /// The node or edge for which the constraint was being created
        location: String,
        /// What is missing or invalid
        reason: String,
    },

    /// An inertia source has no flow leaving the same node
    #[error("Inertia source {edge} has no correlated flow")]
    MissingCorrelatedFlow {
        /// The inertia source
        edge: String,
    },

    /// The solver did not find an optimal solution
    #[error("Could not solve: {status}")]
    Solve {
        /// The model status reported by the solver
        status: String,
    },
}

impl ModelError {
    /// Shorthand for a [`ModelError::Validation`] error
    pub fn validation(
        entity: impl ToString,
        field: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::Validation {
            entity: entity.to_string(),
            field,
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`ModelError::Formulation`] error
    pub fn formulation(location: impl ToString, reason: impl Into<String>) -> Self {
        Self::Formulation {
            location: location.to_string(),
            reason: reason.into(),
        }
    }
}
