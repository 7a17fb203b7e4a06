//! Dispatch loop: the sole thread permitted to invoke backend operations.
//!
//! The loop alternates between a cooperative yield to the backend's own
//! event machinery and a bounded drain of the three request channels. The
//! yield interval adapts to load: it starts at the configured minimum,
//! grows additively while every channel stays idle, and snaps back to the
//! minimum the instant any channel yields work, so latency under load stays
//! bounded by the minimum and idle CPU by the maximum.
//!
//! Failure policy: a call that fails to resolve or raises during execution
//! is logged and answered with a failure reply (when the caller expects
//! one); the loop itself never exits because a call failed. Its only exit
//! conditions are a failed cooperative yield (the backend is gone), the
//! shutdown flag, or every request sender having been dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, TryRecvError};

use crate::backend::{Backend, Outcome};
use crate::error::{DispatchError, ResolutionError};
use crate::protocol::{
    Args, CallCategory, CallReply, FunctionPath, HandleName, MethodRequest, NamespacedRequest,
    PrimitiveRequest, ReplyTx, ResultPolicy, ReturnPolicy, ReturnValue,
};
use crate::registry::Registry;
use crate::trace::{debug, info, warn};

/// Number of request channel categories.
const CHANNEL_COUNT: usize = 3;

/// Dispatch loop tuning, derived from the runtime configuration.
pub(crate) struct WorkerConfig {
    /// Initial and post-work cooperative yield interval.
    pub min_pause: Duration,
    /// Cap on the yield interval under sustained idleness.
    pub max_pause: Duration,
    /// Drain rounds per yield; each round pops at most one message per
    /// category.
    pub drain_rounds: usize,
}

/// Outcome of one drain round.
struct RoundStatus {
    /// At least one message was executed.
    worked: bool,
    /// How many of the three channels reported disconnection.
    disconnected: usize,
}

/// Worker state: the backend, its registry, and the three request consumers.
pub(crate) struct Worker<B: Backend> {
    backend: B,
    registry: Registry,
    primitive_rx: Receiver<PrimitiveRequest>,
    namespaced_rx: Receiver<NamespacedRequest>,
    method_rx: Receiver<MethodRequest>,
    shutdown: Arc<AtomicBool>,
    config: WorkerConfig,
}

impl<B: Backend> Worker<B> {
    pub fn new(
        backend: B,
        primitive_rx: Receiver<PrimitiveRequest>,
        namespaced_rx: Receiver<NamespacedRequest>,
        method_rx: Receiver<MethodRequest>,
        shutdown: Arc<AtomicBool>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            backend,
            registry: Registry::new(),
            primitive_rx,
            namespaced_rx,
            method_rx,
            shutdown,
            config,
        }
    }

    /// Runs the dispatch loop until the backend is gone, shutdown is
    /// requested, or all proxies have been dropped.
    pub fn run(&mut self) {
        info!("dispatch loop started");
        let mut pause = self.config.min_pause;

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                info!("shutdown requested, dispatch loop exiting");
                break;
            }

            // Cooperative yield; remaining channel contents are not drained
            // once the backend's servicing primitive reports failure.
            if let Err(_e) = self.backend.service(pause) {
                info!(error = %_e, "backend servicing gone, dispatch loop exiting");
                break;
            }

            let mut worked = false;
            let mut all_disconnected = false;
            for _ in 0..self.config.drain_rounds {
                let round = self.drain_round();
                worked |= round.worked;
                all_disconnected = round.disconnected == CHANNEL_COUNT;
                if !round.worked {
                    break;
                }
            }

            if all_disconnected {
                info!("all proxies dropped, dispatch loop exiting");
                break;
            }

            pause = next_pause(pause, worked, self.config.min_pause, self.config.max_pause);
        }
    }

    /// Pops at most one message per category, in a fixed category order.
    /// FIFO holds within each category; no order is promised across them.
    fn drain_round(&mut self) -> RoundStatus {
        let mut status = RoundStatus {
            worked: false,
            disconnected: 0,
        };

        match self.namespaced_rx.try_recv() {
            Ok(request) => {
                status.worked = true;
                self.handle_namespaced(request);
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => status.disconnected += 1,
        }

        match self.primitive_rx.try_recv() {
            Ok(request) => {
                status.worked = true;
                self.handle_primitive(request);
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => status.disconnected += 1,
        }

        match self.method_rx.try_recv() {
            Ok(request) => {
                status.worked = true;
                self.handle_method(request);
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => status.disconnected += 1,
        }

        status
    }

    fn handle_primitive(&mut self, request: PrimitiveRequest) {
        let PrimitiveRequest {
            name,
            args,
            policy,
            reply,
        } = request;
        debug!(operation = %name, "primitive call");
        let outcome = self.backend.call(&name, &args);
        let payload = outcome.and_then(|outcome| self.settle(&name, outcome, &policy));
        self.send_reply(CallCategory::Primitive, &name, payload, reply);
    }

    fn handle_namespaced(&mut self, request: NamespacedRequest) {
        let NamespacedRequest {
            name,
            args,
            policy,
            reply,
        } = request;
        debug!(operation = %name, "namespaced call");
        let payload = self.backend.call_style(&name, &args).map(|value| match policy {
            ReturnPolicy::Discard => ReturnValue::Unit,
            ReturnPolicy::Return => ReturnValue::Value(value),
        });
        self.send_reply(CallCategory::Namespaced, &name, payload, reply);
    }

    fn handle_method(&mut self, request: MethodRequest) {
        let MethodRequest {
            target,
            path,
            args,
            policy,
            reply,
        } = request;
        debug!(target = %target, path = %path, "method call");
        let outcome = self.invoke_method(&target, &path, &args);
        let (method, _) = path.split_last();
        let payload = outcome.and_then(|outcome| self.settle(method, outcome, &policy));
        self.send_reply(CallCategory::Method, method, payload, reply);
    }

    /// Resolves the target handle, walks non-final path segments as nested
    /// members, and invokes the final segment.
    fn invoke_method(
        &mut self,
        target: &HandleName,
        path: &FunctionPath,
        args: &Args,
    ) -> Result<Outcome, DispatchError> {
        let mut object = self
            .registry
            .get_mut(target)
            .map_err(|e| DispatchError::Resolution(ResolutionError::Handle(e)))?;

        let (method, members) = path.split_last();
        for segment in members {
            object = object.member(segment).map_err(DispatchError::Resolution)?;
        }
        object.invoke(method, args)
    }

    /// Applies the result policy to a successful outcome. Objects are only
    /// ever stored; a handle name crosses the channel in their place.
    fn settle(
        &mut self,
        operation: &str,
        outcome: Outcome,
        policy: &ResultPolicy,
    ) -> CallReply {
        match policy {
            ResultPolicy::Discard => {
                if let Outcome::Object(_object) = outcome {
                    debug!(operation = %operation, kind = _object.kind(), "discarding object result");
                }
                Ok(ReturnValue::Unit)
            }
            ResultPolicy::Return => match outcome {
                Outcome::Unit => Ok(ReturnValue::Unit),
                Outcome::Value(value) => Ok(ReturnValue::Value(value)),
                Outcome::Object(_) => Err(DispatchError::ObjectRequiresStore(operation.to_owned())),
            },
            ResultPolicy::Store { name } => match outcome {
                Outcome::Object(object) => self
                    .registry
                    .insert(name.clone(), object)
                    .map(|handle| ReturnValue::Stored { handle })
                    .map_err(DispatchError::Store),
                _ => Err(DispatchError::NotStorable(operation.to_owned())),
            },
        }
    }

    /// Logs failures and answers the caller if one is waiting. A reply that
    /// cannot be delivered (the caller gave up) is dropped silently; the
    /// loop is unaffected either way.
    fn send_reply(
        &self,
        _category: CallCategory,
        _operation: &str,
        payload: CallReply,
        reply: Option<ReplyTx>,
    ) {
        if let Err(_e) = &payload {
            warn!(category = %_category, operation = %_operation, error = %_e, "call failed");
        }
        if let Some(tx) = reply {
            if tx.send(payload).is_err() {
                debug!(category = %_category, operation = %_operation, "caller gone, dropping reply");
            }
        }
    }
}

/// Adaptive yield schedule: additive growth while idle, capped at `max`,
/// reset to `min` on any work.
fn next_pause(current: Duration, worked: bool, min: Duration, max: Duration) -> Duration {
    if worked {
        min
    } else {
        (current + min).min(max)
    }
}
