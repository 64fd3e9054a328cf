//! Error types for the context layer.

use crate::backend::ObjectKind;
use crate::identity::{ContextId, SharingGroupId};
use thiserror::Error;

/// Errors produced by rendering-context operations.
///
/// Driver failures keep their own variants so a caller can tell a refused
/// context creation apart from a refused activation. Usage violations are
/// logic errors in the calling layer and are never worth retrying; see
/// [`ContextError::is_usage_violation`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// The driver refused to create a native context.
    #[error("failed to create rendering context: {reason}")]
    Creation { reason: String },

    /// The driver refused to make a context current. The registry is unchanged.
    #[error("failed to make {context} current: {reason}")]
    Activation { context: ContextId, reason: String },

    /// The driver refused to release the current context. The registry is unchanged.
    #[error("failed to release the current context: {reason}")]
    Release { reason: String },

    /// The context is current on a different thread.
    #[error("{context} is already current on another thread")]
    CurrentElsewhere { context: ContextId },

    /// The operation needs the context to be current on the calling thread.
    #[error("{context} is not current on the calling thread")]
    NotCurrent { context: ContextId },

    /// Two contexts from different platforms were combined.
    #[error("contexts belong to different platforms and cannot share objects")]
    ForeignPlatform,

    /// An object was used with a context outside its sharing group.
    #[error("{kind} object belongs to {object_group}, but {context} is in {context_group}")]
    ForeignObject {
        kind: ObjectKind,
        object_group: SharingGroupId,
        context: ContextId,
        context_group: SharingGroupId,
    },

    /// The identity generator ran out of values.
    #[error("identity space exhausted")]
    IdentityExhausted,

    /// The driver refused to allocate a GPU object.
    #[error("failed to create {kind} object: {reason}")]
    ObjectCreation { kind: ObjectKind, reason: String },

    /// A pixel format description was malformed or unsupported.
    #[error("invalid pixel format: {0}")]
    InvalidFormat(String),
}

impl ContextError {
    /// Returns `true` for precondition violations caused by the caller.
    pub fn is_usage_violation(&self) -> bool {
        matches!(
            self,
            ContextError::CurrentElsewhere { .. }
                | ContextError::NotCurrent { .. }
                | ContextError::ForeignPlatform
                | ContextError::ForeignObject { .. }
        )
    }

    /// Returns `true` if retrying the same call may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ContextError::Activation { .. } | ContextError::Release { .. }
        )
    }
}
