//! courier: a call-forwarding runtime for single-threaded stateful backends.
//!
//! # Architecture
//!
//! Many caller threads drive one backend that must never be touched from
//! more than one thread. Calls are marshaled onto categorized request
//! channels and executed by a single worker thread running the dispatch
//! loop; objects the backend produces stay inside the worker, addressed by
//! opaque handle names.
//!
//! ```text
//! caller threads                         worker thread
//!
//! CallProxy ──┐   primitive channel   ┌─> dispatch loop ─> Backend::call
//! CallProxy ──┼─> namespaced channel ─┼─> dispatch loop ─> Backend::call_style
//! CallProxy ──┘   method channel      └─> dispatch loop ─> Registry ─> BackendObject
//!      ^                                        │
//!      └──────── one-shot reply per call ───────┘
//! ```
//!
//! - **Call categories**: `Primitive` (backend's primary namespace),
//!   `Namespaced` (secondary stateless namespace, no store policy), and
//!   `Method` (a path invoked on a stored object). Each category has its own
//!   channel and FIFO order; there is no order across categories.
//! - **Handles**: a store-policy call places the produced object in the
//!   worker-owned [`Registry`] and replies with a [`HandleName`]. Raw
//!   objects never cross the channel. Chained calls address handles.
//! - **Blocking contract**: discard-policy calls are fire-and-forget.
//!   Return/store calls block on a per-call one-shot reply with a timeout
//!   and a cancel token, and failed calls produce an explicit failure reply,
//!   so a caller is never left waiting on a call that already failed.
//! - **Cooperative yield**: each loop iteration gives the backend's own
//!   event machinery time via [`Backend::service`], with an interval that
//!   adapts to load. A failed yield is the loop's exit condition.
//!
//! # Example
//!
//! ```ignore
//! use courier::{Args, ResultPolicy, Runtime, RuntimeConfig};
//!
//! let runtime = Runtime::spawn(my_backend, RuntimeConfig::default())?;
//! let proxy = runtime.proxy();
//!
//! let canvas = proxy
//!     .call_primitive("figure", Args::none(), ResultPolicy::store())?
//!     .unwrap();
//! let handle = canvas.handle().unwrap().clone();
//! proxy.call_method(handle, "draw", Args::positional([1, 2, 3]), ResultPolicy::Discard)?;
//! ```

pub mod backend;
pub mod compose;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod trace;

mod proxy;
mod runtime;
mod worker;

pub use backend::{Backend, BackendObject, Outcome};
pub use compose::{DrawOptions, Surface};
pub use error::{
    DispatchError, InvokeError, ProtocolError, ProxyError, RegistryError, ResolutionError,
    ServiceError,
};
pub use protocol::{
    Args, CallCategory, CallReply, FunctionPath, HandleName, ResultPolicy, ReturnPolicy,
    ReturnValue,
};
pub use proxy::{CallProxy, CancelToken, Timeout};
pub use registry::{HandleRef, Registry};
pub use runtime::{Runtime, RuntimeConfig, RuntimeError};
