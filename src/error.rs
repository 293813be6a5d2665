//! Error taxonomy for object acquisition and invocation.
//!
//! Two distinct families: configuration errors are surfaced immediately at
//! acquisition time and are never retried; invocation errors are produced by
//! the call protocol itself. Application-level failures thrown by a replicated
//! method travel inside the response envelope and are re-raised unchanged as
//! `InvocationError::Application`.

use crate::object::types::CallId;
use thiserror::Error;

/// Errors raised while acquiring an object through the factory.
#[derive(Debug, Error)]
pub enum FactoryError {
    /// The requested type was never registered with the type registry.
    #[error("unknown object type: {0}")]
    UnknownType(String),

    /// The type cannot be constructed with the supplied init args.
    #[error("{type_name} cannot be constructed with the given init args: {reason}")]
    Constructor { type_name: String, reason: String },
}

/// Errors raised by a proxy method invocation.
#[derive(Debug, Error)]
pub enum InvocationError {
    /// The attempt budget was exhausted with no response. Safe to retry at the
    /// application level: the applier suppresses duplicate call ids.
    #[error("call {call_id} timed out after {attempts} attempts")]
    Timeout { call_id: CallId, attempts: u32 },

    /// The replicated method itself failed. Deterministic, not retried.
    #[error("{0}")]
    Application(String),

    /// The store rejected or lost the call. Infrastructure-level failure.
    #[error("store error: {0}")]
    Store(String),
}

impl InvocationError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, InvocationError::Timeout { .. })
    }
}
