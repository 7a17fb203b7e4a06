//! Caller-facing call proxy.
//!
//! A [`CallProxy`] marshals a call into a request message, enqueues it on
//! the category's channel, and — when the policy expects a result — blocks
//! on the call's own one-shot reply channel. Because every reply channel
//! belongs to exactly one call, each caller receives exactly the reply for
//! its own request, no matter how many callers are in flight.
//!
//! Ordering: calls on one category execute in enqueue order. There is no
//! ordering guarantee across categories; callers that need one must
//! serialize by waiting for each call's result. Discard-policy calls forgo
//! the guarantee entirely.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use minstant::Instant;

use crate::error::ProxyError;
use crate::protocol::{
    Args, CallReply, FunctionPath, HandleName, MethodRequest, NamespacedRequest, PrimitiveRequest,
    ReplyTx, ResultPolicy, ReturnPolicy, ReturnValue,
};
use crate::runtime::ChannelSet;

/// Interval at which a blocked caller re-checks its cancel token.
const WAIT_SLICE: Duration = Duration::from_millis(10);

/// Timeout specification for blocking waits.
#[derive(Debug, Clone, Copy)]
pub enum Timeout {
    /// Wait indefinitely.
    Infinite,
    /// Wait for at most the specified duration.
    Duration(Duration),
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Self::Duration(d)
    }
}

/// Cooperative cancellation for blocked proxy calls.
///
/// Cancelling only unblocks the wait; the call itself still executes on the
/// worker and its reply is dropped.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates an untriggered token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Triggers the token; all proxies holding it stop waiting.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether the token has been triggered.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Caller-facing entry point to the runtime.
///
/// Proxies are cheap to clone and share one injected channel set, so every
/// call from every proxy of one runtime is executed by the same worker, in
/// per-category order. Proxies hold no other state than their wait policy.
#[derive(Clone)]
pub struct CallProxy {
    channels: Arc<ChannelSet>,
    timeout: Timeout,
    cancel: CancelToken,
}

impl CallProxy {
    pub(crate) fn new(channels: Arc<ChannelSet>, timeout: Timeout) -> Self {
        Self {
            channels,
            timeout,
            cancel: CancelToken::new(),
        }
    }

    /// Replaces the wait timeout for calls made through this proxy.
    #[must_use]
    pub fn with_timeout(mut self, timeout: impl Into<Timeout>) -> Self {
        self.timeout = timeout.into();
        self
    }

    /// Returns the token that cancels waits on this proxy.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Spawns a subordinate proxy sharing this proxy's channel set (and so
    /// its worker and global per-category ordering) with a fresh cancel
    /// token.
    #[must_use]
    pub fn subordinate(&self) -> Self {
        Self {
            channels: Arc::clone(&self.channels),
            timeout: self.timeout,
            cancel: CancelToken::new(),
        }
    }

    /// Calls a function on the backend's primary namespace.
    ///
    /// Discard policy returns `Ok(None)` immediately after enqueueing;
    /// otherwise blocks for the reply.
    ///
    /// # Errors
    ///
    /// [`ProxyError::Disconnected`] if the worker is gone, `Timeout` /
    /// `Cancelled` from the wait, or `Call` if the worker reports failure.
    pub fn call_primitive(
        &self,
        name: impl Into<String>,
        args: Args,
        policy: ResultPolicy,
    ) -> Result<Option<ReturnValue>, ProxyError> {
        let (reply, waiter) = reply_pair(policy.expects_reply());
        let request = PrimitiveRequest {
            name: name.into(),
            args,
            policy,
            reply,
        };
        self.channels
            .primitive
            .send(request)
            .map_err(|_| ProxyError::Disconnected)?;
        self.wait(waiter)
    }

    /// Calls a function on the backend's secondary stateless namespace.
    /// The policy type statically rules out storing.
    ///
    /// # Errors
    ///
    /// Same as [`CallProxy::call_primitive`].
    pub fn call_namespaced(
        &self,
        name: impl Into<String>,
        args: Args,
        policy: ReturnPolicy,
    ) -> Result<Option<ReturnValue>, ProxyError> {
        let (reply, waiter) = reply_pair(policy.expects_reply());
        let request = NamespacedRequest {
            name: name.into(),
            args,
            policy,
            reply,
        };
        self.channels
            .namespaced
            .send(request)
            .map_err(|_| ProxyError::Disconnected)?;
        self.wait(waiter)
    }

    /// Invokes a function path on a stored object.
    ///
    /// # Errors
    ///
    /// Same as [`CallProxy::call_primitive`]; resolution failures (unknown
    /// handle, missing member or method) arrive as `Call` errors.
    pub fn call_on_target(
        &self,
        target: impl Into<HandleName>,
        path: FunctionPath,
        args: Args,
        policy: ResultPolicy,
    ) -> Result<Option<ReturnValue>, ProxyError> {
        let (reply, waiter) = reply_pair(policy.expects_reply());
        let request = MethodRequest {
            target: target.into(),
            path,
            args,
            policy,
            reply,
        };
        self.channels
            .method
            .send(request)
            .map_err(|_| ProxyError::Disconnected)?;
        self.wait(waiter)
    }

    /// Single-segment convenience over [`CallProxy::call_on_target`].
    ///
    /// # Errors
    ///
    /// Same as [`CallProxy::call_on_target`].
    pub fn call_method(
        &self,
        target: impl Into<HandleName>,
        method: impl Into<String>,
        args: Args,
        policy: ResultPolicy,
    ) -> Result<Option<ReturnValue>, ProxyError> {
        self.call_on_target(target, FunctionPath::single(method), args, policy)
    }

    /// Blocks on the call's one-shot reply with deadline slicing, checking
    /// the cancel token between slices.
    fn wait(&self, waiter: Option<Receiver<CallReply>>) -> Result<Option<ReturnValue>, ProxyError> {
        let Some(rx) = waiter else {
            return Ok(None);
        };

        let deadline = match self.timeout {
            Timeout::Infinite => None,
            Timeout::Duration(d) => Some(Instant::now() + d),
        };

        loop {
            if self.cancel.is_cancelled() {
                return Err(ProxyError::Cancelled);
            }

            let slice = match deadline {
                None => WAIT_SLICE,
                Some(dl) => match dl.checked_duration_since(Instant::now()) {
                    Some(remaining) => remaining.min(WAIT_SLICE),
                    None => return Err(ProxyError::Timeout),
                },
            };

            match rx.recv_timeout(slice) {
                Ok(reply) => return reply.map(Some).map_err(ProxyError::Call),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Err(ProxyError::Disconnected),
            }
        }
    }
}

/// Builds the one-shot reply pair for a call, or nothing for fire-and-forget.
fn reply_pair(expects_reply: bool) -> (Option<ReplyTx>, Option<Receiver<CallReply>>) {
    if expects_reply {
        let (tx, rx) = bounded(1);
        (Some(tx), Some(rx))
    } else {
        (None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn discard_calls_take_no_reply_channel() {
        let (tx, rx) = reply_pair(false);
        assert!(tx.is_none());
        assert!(rx.is_none());

        let (tx, rx) = reply_pair(true);
        assert!(tx.is_some());
        assert!(rx.is_some());
    }
}
