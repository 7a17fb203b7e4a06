//! Error taxonomy for the call-forwarding runtime.
//!
//! Three families cross the worker boundary inside a failure reply:
//! [`ResolutionError`] (a name did not resolve), [`InvokeError`] (the
//! resolved operation raised), and [`ProtocolError`] (a malformed request).
//! All are folded into
//! [`DispatchError`], which is cloneable and serializable so the worker can
//! hand it back to the blocked caller instead of leaving it waiting.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Malformed request data, caught before any backend work happens.
///
/// Category mismatches cannot occur: each channel carries its own request
/// type, so only structurally invalid payloads remain.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ProtocolError {
    /// A function path must name at least one segment.
    #[error("function path must have at least one segment")]
    EmptyPath,
    /// A path segment was empty (e.g. from a stray `.` in a dotted path).
    #[error("function path contains an empty segment")]
    EmptySegment,
}

/// Handle registry failures.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum RegistryError {
    /// An explicit store name collided with an existing handle.
    #[error("handle name `{0}` is already in use")]
    DuplicateName(String),
    /// The named handle was never stored (or was removed).
    #[error("unknown handle `{0}`")]
    UnknownHandle(String),
    /// A handle reference outlived the object it pointed at.
    #[error("stale handle reference `{0}`")]
    StaleHandle(String),
}

/// A function path failed to resolve to a callable.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ResolutionError {
    /// The method target did not resolve in the registry.
    #[error(transparent)]
    Handle(#[from] RegistryError),
    /// A non-final path segment named a member the object does not have.
    #[error("`{owner}` has no member `{name}`")]
    NoSuchMember { owner: String, name: String },
    /// The final path segment named a method the object does not have.
    #[error("`{owner}` has no method `{name}`")]
    NoSuchMethod { owner: String, name: String },
    /// The backend namespace has no function with this name.
    #[error("backend has no function `{0}`")]
    NoSuchFunction(String),
}

/// A resolved backend operation raised during execution.
///
/// Backends report failures as a message; the worker never inspects it.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct InvokeError {
    /// Backend-provided description of the failure.
    pub message: String,
}

impl InvokeError {
    /// Creates an invocation error from any displayable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Everything that can go wrong while the worker executes one call.
///
/// This is the payload of a failure reply. It stays string-based so it can
/// cross the reply channel by value.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum DispatchError {
    /// The function path or target handle did not resolve.
    #[error("resolution failed: {0}")]
    Resolution(#[from] ResolutionError),
    /// The resolved operation raised.
    #[error("invocation failed: {0}")]
    Invocation(#[from] InvokeError),
    /// The request itself was malformed.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),
    /// Storing the produced object failed (duplicate name).
    #[error("store failed: {0}")]
    Store(RegistryError),
    /// A store policy was requested but the operation produced no object.
    #[error("`{0}` returned no object to store")]
    NotStorable(String),
    /// The operation produced an object under a return policy. Objects never
    /// cross the channel; request a store policy and receive a handle.
    #[error("`{0}` produced an object; use a store policy to receive a handle")]
    ObjectRequiresStore(String),
}

/// The backend's own event servicing reported that it is gone.
///
/// This is the dispatch loop's only natural exit condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("backend servicing unavailable: {message}")]
pub struct ServiceError {
    /// Backend-provided description (e.g. "display closed").
    pub message: String,
}

impl ServiceError {
    /// Creates a service error from any displayable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Caller-side failures surfaced by [`CallProxy`](crate::CallProxy) methods.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    /// The worker thread has exited; no further calls can be serviced.
    #[error("worker disconnected")]
    Disconnected,
    /// No reply arrived within the proxy's call timeout.
    #[error("timed out waiting for reply")]
    Timeout,
    /// The proxy's cancel token was triggered while waiting.
    #[error("call cancelled")]
    Cancelled,
    /// The worker executed the call and it failed.
    #[error(transparent)]
    Call(#[from] DispatchError),
    /// The reply arrived but did not have the expected shape.
    #[error("unexpected reply shape: {0}")]
    UnexpectedReply(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_errors_fold_into_dispatch() {
        let err: DispatchError = ResolutionError::from(RegistryError::UnknownHandle("o9".into())).into();
        assert_eq!(
            err.to_string(),
            "resolution failed: unknown handle `o9`"
        );
    }

    #[test]
    fn invoke_error_message_passthrough() {
        let err = DispatchError::from(InvokeError::new("division by zero"));
        assert_eq!(err.to_string(), "invocation failed: division by zero");
    }

    #[test]
    fn dispatch_error_survives_serde() {
        let err = DispatchError::NotStorable("plot".into());
        let json = serde_json::to_string(&err).unwrap();
        let back: DispatchError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}
