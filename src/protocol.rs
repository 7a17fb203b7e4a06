//! Call and reply types for caller↔worker communication.
//!
//! Each call category travels on its own request channel and has its own
//! request type, so the per-category protocol rules (the namespaced channel
//! admits no store policy, method calls always address a handle) are encoded
//! in the types rather than checked at dispatch time.
//!
//! Replies travel on a per-call one-shot channel carried inside the request.
//! A call that expects no reply carries no channel at all, which is what
//! makes discard-policy calls fire-and-forget.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DispatchError, ProtocolError};

/// The three call categories, each with its own channel and resolution rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallCategory {
    /// Function on the backend's primary top-level namespace.
    Primitive,
    /// Function on the backend's secondary stateless namespace.
    Namespaced,
    /// Method chain on a previously stored backend object.
    Method,
}

impl fmt::Display for CallCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive => write!(f, "primitive"),
            Self::Namespaced => write!(f, "namespaced"),
            Self::Method => write!(f, "method"),
        }
    }
}

/// Opaque name of a stored backend object.
///
/// Handles are the only way callers address backend objects; the objects
/// themselves never cross the channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandleName(String);

impl HandleName {
    /// Creates a handle name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HandleName {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl From<String> for HandleName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Ordered, non-empty sequence of name segments.
///
/// For method calls, non-final segments are resolved as nested members and
/// the final segment is invoked (e.g. `["canvas", "connect"]` resolves the
/// `canvas` member, then invokes `connect` on it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionPath(Vec<String>);

impl FunctionPath {
    /// Builds a path from segments.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::EmptyPath`] for zero segments and
    /// [`ProtocolError::EmptySegment`] if any segment is empty.
    pub fn new<I, S>(segments: I) -> Result<Self, ProtocolError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(ProtocolError::EmptyPath);
        }
        if segments.iter().any(String::is_empty) {
            return Err(ProtocolError::EmptySegment);
        }
        Ok(Self(segments))
    }

    /// Builds a single-segment path (the common case).
    pub fn single(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    /// Parses a dotted path like `"canvas.connect"`.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] for empty input or empty segments.
    pub fn dotted(path: &str) -> Result<Self, ProtocolError> {
        Self::new(path.split('.'))
    }

    /// Returns the path segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Splits the path into `(final method, leading members)`.
    #[must_use]
    pub fn split_last(&self) -> (&str, &[String]) {
        // Invariant: paths are never empty.
        let (last, members) = self.0.split_last().expect("path is non-empty");
        (last, members)
    }
}

impl fmt::Display for FunctionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// Positional and keyword arguments, opaque to the runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Args {
    /// Positional arguments, forwarded in order.
    pub positional: Vec<Value>,
    /// Keyword arguments, forwarded by name.
    pub keyword: BTreeMap<String, Value>,
}

impl Args {
    /// No arguments.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Builds positional-only arguments.
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            positional: values.into_iter().map(Into::into).collect(),
            keyword: BTreeMap::new(),
        }
    }

    /// Adds a keyword argument (builder style).
    #[must_use]
    pub fn with_keyword(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.insert(name.into(), value.into());
        self
    }

    /// Inserts a keyword argument only if it is not already present.
    pub fn default_keyword(&mut self, name: &str, value: impl Into<Value>) {
        if !self.keyword.contains_key(name) {
            self.keyword.insert(name.to_owned(), value.into());
        }
    }

    /// Looks up a keyword argument.
    #[must_use]
    pub fn keyword(&self, name: &str) -> Option<&Value> {
        self.keyword.get(name)
    }
}

/// What the worker should do with an operation's result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultPolicy {
    /// Drop the result; the caller does not wait.
    Discard,
    /// Send the plain value back to the caller.
    Return,
    /// Place the produced object in the registry and reply with its handle.
    /// With no name, the registry assigns the next generated one.
    Store {
        /// Explicit handle name; must be unused at storage time.
        name: Option<String>,
    },
}

impl ResultPolicy {
    /// Store under a generated name.
    #[must_use]
    pub fn store() -> Self {
        Self::Store { name: None }
    }

    /// Store under an explicit name.
    pub fn store_as(name: impl Into<String>) -> Self {
        Self::Store {
            name: Some(name.into()),
        }
    }

    /// Whether the caller blocks for a reply under this policy.
    #[must_use]
    pub fn expects_reply(&self) -> bool {
        !matches!(self, Self::Discard)
    }
}

/// Result policy for the namespaced channel, which admits no store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnPolicy {
    /// Drop the result; the caller does not wait.
    Discard,
    /// Send the plain value back to the caller.
    Return,
}

impl ReturnPolicy {
    /// Whether the caller blocks for a reply under this policy.
    #[must_use]
    pub fn expects_reply(self) -> bool {
        matches!(self, Self::Return)
    }
}

/// Successful outcome of a call, as seen by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReturnValue {
    /// The operation produced nothing (or the value was not requested).
    Unit,
    /// A plain value.
    Value(Value),
    /// An object was stored; this is its handle.
    Stored {
        /// Registry name of the stored object.
        handle: HandleName,
    },
}

impl ReturnValue {
    /// Returns the stored handle, if any.
    #[must_use]
    pub fn handle(&self) -> Option<&HandleName> {
        match self {
            Self::Stored { handle } => Some(handle),
            _ => None,
        }
    }

    /// Returns the plain value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }
}

/// What the worker sends back for a call that expects a reply.
pub type CallReply = Result<ReturnValue, DispatchError>;

/// One-shot sender for a single call's reply.
pub(crate) type ReplyTx = crossbeam_channel::Sender<CallReply>;

/// Request on the primitive channel: a function on the backend's primary
/// namespace.
pub(crate) struct PrimitiveRequest {
    pub name: String,
    pub args: Args,
    pub policy: ResultPolicy,
    pub reply: Option<ReplyTx>,
}

/// Request on the namespaced channel: a stateless function on the backend's
/// secondary namespace. Note the narrower policy type.
pub(crate) struct NamespacedRequest {
    pub name: String,
    pub args: Args,
    pub policy: ReturnPolicy,
    pub reply: Option<ReplyTx>,
}

/// Request on the method channel: a path invoked on a stored object.
pub(crate) struct MethodRequest {
    pub target: HandleName,
    pub path: FunctionPath,
    pub args: Args,
    pub policy: ResultPolicy,
    pub reply: Option<ReplyTx>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_path_rejected() {
        let segments: Vec<String> = Vec::new();
        assert_eq!(FunctionPath::new(segments), Err(ProtocolError::EmptyPath));
    }

    #[test]
    fn empty_segment_rejected() {
        assert_eq!(
            FunctionPath::dotted("canvas..connect"),
            Err(ProtocolError::EmptySegment)
        );
    }

    #[test]
    fn split_last_separates_members_from_method() {
        let path = FunctionPath::dotted("canvas.events.connect").unwrap();
        let (method, members) = path.split_last();
        assert_eq!(method, "connect");
        assert_eq!(members, ["canvas".to_owned(), "events".to_owned()]);
    }

    #[test]
    fn single_segment_path_has_no_members() {
        let path = FunctionPath::single("plot");
        let (method, members) = path.split_last();
        assert_eq!(method, "plot");
        assert!(members.is_empty());
    }

    #[test]
    fn discard_policies_expect_no_reply() {
        assert!(!ResultPolicy::Discard.expects_reply());
        assert!(ResultPolicy::Return.expects_reply());
        assert!(ResultPolicy::store().expects_reply());
        assert!(!ReturnPolicy::Discard.expects_reply());
        assert!(ReturnPolicy::Return.expects_reply());
    }

    #[test]
    fn default_keyword_does_not_override() {
        let mut args = Args::none().with_keyword("lw", 5.0);
        args.default_keyword("lw", 3.0);
        args.default_keyword("label", "series");
        assert_eq!(args.keyword("lw"), Some(&Value::from(5.0)));
        assert_eq!(args.keyword("label"), Some(&Value::from("series")));
    }
}
