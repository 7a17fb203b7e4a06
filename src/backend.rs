//! Capability interface the wrapped backend must implement.
//!
//! The worker never inspects operation names; it resolves them through these
//! traits and forwards the opaque argument list. Resolution failures are
//! typed ([`ResolutionError`]) rather than generic lookup failures, and the
//! member/invoke split makes multi-segment path walking explicit.

use std::time::Duration;

use serde_json::Value;

use crate::error::{DispatchError, ResolutionError, ServiceError};
use crate::protocol::Args;

/// Result of one backend operation.
pub enum Outcome {
    /// The operation produced nothing.
    Unit,
    /// A plain value, forwarded to the caller verbatim.
    Value(Value),
    /// A new backend object. Only meaningful under a store policy; it never
    /// leaves the worker.
    Object(Box<dyn BackendObject>),
}

impl std::fmt::Debug for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unit => f.write_str("Unit"),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Object(object) => f.debug_tuple("Object").field(&object.kind()).finish(),
        }
    }
}

/// A backend-produced object held in the worker's registry.
///
/// Method calls walk the function path through `member` for every non-final
/// segment and finish with `invoke`.
pub trait BackendObject: Send {
    /// Short type label used in handles' error messages (e.g. `"canvas"`).
    fn kind(&self) -> &str;

    /// Resolves a nested member for a non-final path segment.
    ///
    /// The default implementation has no members.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::NoSuchMember`] if the object has no such
    /// member.
    fn member(&mut self, name: &str) -> Result<&mut dyn BackendObject, ResolutionError> {
        Err(ResolutionError::NoSuchMember {
            owner: self.kind().to_owned(),
            name: name.to_owned(),
        })
    }

    /// Invokes the final path segment as a method.
    ///
    /// # Errors
    ///
    /// [`ResolutionError::NoSuchMethod`] (via [`DispatchError::Resolution`])
    /// for unknown methods; [`DispatchError::Invocation`] if the method
    /// itself raised.
    fn invoke(&mut self, method: &str, args: &Args) -> Result<Outcome, DispatchError>;
}

/// The single-threaded, stateful service the runtime wraps.
///
/// Exactly one worker thread ever calls these methods; implementations need
/// no internal synchronization. `Send` is required only to move the backend
/// onto the worker thread at spawn.
pub trait Backend: Send + 'static {
    /// Calls a function on the backend's primary top-level namespace.
    ///
    /// # Errors
    ///
    /// [`ResolutionError::NoSuchFunction`] for unknown names, or an
    /// invocation failure from the function itself.
    fn call(&mut self, name: &str, args: &Args) -> Result<Outcome, DispatchError>;

    /// Calls a function on the backend's secondary, stateless namespace
    /// (the style-setting family). These functions can return values but
    /// never produce objects, matching the no-store rule on that channel.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`Backend::call`].
    fn call_style(&mut self, name: &str, args: &Args) -> Result<Value, DispatchError>;

    /// Cooperatively yields to the backend's own event machinery for up to
    /// `budget`. Called once per dispatch-loop iteration.
    ///
    /// # Errors
    ///
    /// A [`ServiceError`] means the backend is gone (e.g. its display was
    /// closed); the dispatch loop exits on it.
    fn service(&mut self, budget: Duration) -> Result<(), ServiceError>;
}
