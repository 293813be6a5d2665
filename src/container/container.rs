use super::pending::PendingCalls;
use crate::config::ProtocolConfig;
use crate::error::InvocationError;
use crate::object::registry::ObjectTypeRegistry;
use crate::object::types::{Call, CallFlags, CallId, CallResult, Reference};
use crate::store::api::ObjectStore;

use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// Consistency mode flags chosen at acquisition time.
#[derive(Debug, Clone, Copy)]
pub struct Modes {
    /// Serve read-only calls from a local copy (sequential consistency) instead
    /// of the strict atomic default.
    pub read_optimization: bool,
    /// Suppress duplicate execution of retried calls server-side. On by
    /// default: retries are always possible.
    pub idempotent: bool,
    /// Discard any existing backing state for the key.
    pub force_new: bool,
}

impl Default for Modes {
    fn default() -> Self {
        Self {
            read_optimization: false,
            idempotent: true,
            force_new: false,
        }
    }
}

/// Client-side runtime for one replicated object.
///
/// Holds the invocation machinery for its reference: pending-call registration,
/// the retry loop, and the optional cached state copy. Containers are created
/// and owned exclusively by the factory.
pub struct Container {
    reference: Reference,
    store: Arc<dyn ObjectStore>,
    registry: Arc<ObjectTypeRegistry>,
    pending: Arc<PendingCalls>,
    config: ProtocolConfig,
    /// Effective only when the type declares read-only methods.
    read_optimization: bool,
    idempotent: bool,
    /// Consumed by the first call this container sends.
    force_new: AtomicBool,
    init_args: Vec<Value>,
    /// Last state snapshot carried by a forwarded-call response. May be stale
    /// relative to the authoritative replica.
    local_state: RwLock<Option<Vec<u8>>>,
}

impl Container {
    pub(crate) fn new(
        reference: Reference,
        store: Arc<dyn ObjectStore>,
        registry: Arc<ObjectTypeRegistry>,
        pending: Arc<PendingCalls>,
        config: ProtocolConfig,
        modes: Modes,
        init_args: Vec<Value>,
    ) -> Arc<Self> {
        let read_optimization =
            modes.read_optimization && registry.has_read_only_methods(&reference.type_name);

        Arc::new(Self {
            reference,
            store,
            registry,
            pending,
            config,
            read_optimization,
            idempotent: modes.idempotent,
            force_new: AtomicBool::new(modes.force_new),
            init_args,
            local_state: RwLock::new(None),
        })
    }

    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    /// Invokes one method on the replicated object.
    ///
    /// Read-only calls may be served locally when read optimization is active
    /// and a state copy exists; everything else goes through the full protocol.
    pub async fn invoke(
        &self,
        method: &str,
        arguments: Vec<Value>,
    ) -> Result<Value, InvocationError> {
        if self.read_optimization
            && self.registry.is_read_only(&self.reference.type_name, method)
            && let Some(result) = self.try_local(method, &arguments).await
        {
            return result;
        }

        let call = self.build_call(method, arguments);
        self.execute(call).await
    }

    /// Speculative execution of a read-only call against the cached copy.
    /// Returns `None` when no copy exists yet or the copy cannot be used, in
    /// which case the call is forwarded through the full protocol.
    async fn try_local(
        &self,
        method: &str,
        arguments: &[Value],
    ) -> Option<Result<Value, InvocationError>> {
        let snapshot = self.local_state.read().await.clone()?;

        match self
            .registry
            .execute(&self.reference.type_name, &snapshot, method, arguments)
        {
            Ok((_state, CallResult::Value(value))) => {
                tracing::trace!("{} served {} from local copy", self.reference, method);
                Some(Ok(value))
            }
            Ok((_state, CallResult::Failed { error })) => {
                Some(Err(InvocationError::Application(error)))
            }
            Err(e) => {
                tracing::debug!(
                    "Local execution of {} on {} failed, forwarding: {}",
                    method,
                    self.reference,
                    e
                );
                None
            }
        }
    }

    fn build_call(&self, method: &str, arguments: Vec<Value>) -> Call {
        Call {
            call_id: CallId::new(),
            reference: self.reference.clone(),
            method: method.to_string(),
            arguments,
            init_args: self.init_args.clone(),
            flags: CallFlags {
                read_optimization: self.read_optimization,
                idempotent: self.idempotent,
                force_new: self.force_new.swap(false, Ordering::SeqCst),
            },
        }
    }

    /// Drives one logical invocation to a terminal outcome.
    ///
    /// Registers the pending future first, then submits; on timeout the same
    /// call (same id) is resubmitted until the attempt budget runs out. The
    /// pending entry is gone on every exit path: the notification thread
    /// removes it on completion, this task removes it on abandonment.
    pub(crate) async fn execute(&self, call: Call) -> Result<Value, InvocationError> {
        tracing::trace!("{} executing {} ({})", self.reference, call.method, call.call_id);

        let mut receiver = self.pending.register(call.call_id.clone());
        let mut attempts = 0u32;

        let response = loop {
            attempts += 1;

            if let Err(e) = self.store.submit(call.clone()) {
                self.pending.unregister(&call.call_id);
                return Err(InvocationError::Store(e.to_string()));
            }

            match tokio::time::timeout(self.config.call_timeout, &mut receiver).await {
                Ok(Ok(response)) => break response,
                Ok(Err(_)) => {
                    // Sender dropped without completing; the entry is already gone.
                    return Err(InvocationError::Store(
                        "response channel closed".to_string(),
                    ));
                }
                Err(_) => {
                    tracing::warn!(
                        "Call {} on {} timed out (attempt {}/{})",
                        call.call_id,
                        self.reference,
                        attempts,
                        self.config.max_attempts
                    );

                    if attempts >= self.config.max_attempts {
                        self.pending.unregister(&call.call_id);
                        return Err(InvocationError::Timeout {
                            call_id: call.call_id.clone(),
                            attempts,
                        });
                    }

                    // Brief jitter before the resend, to keep racing clients
                    // from hammering the owner in lockstep.
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(jitter)).await;
                }
            }
        };

        if self.read_optimization
            && let Some(state) = &response.state
        {
            *self.local_state.write().await = Some(state.clone());
        }

        match response.result {
            CallResult::Value(value) => Ok(value),
            CallResult::Failed { error } => Err(InvocationError::Application(error)),
        }
    }

    /// Accessor for tests: whether a local state copy is currently cached.
    pub(crate) async fn has_local_state(&self) -> bool {
        self.local_state.read().await.is_some()
    }
}

/// Caller-facing handle for a replicated object.
///
/// Clones share the underlying container. Typed client stubs are thin wrappers
/// over [`ObjectProxy::invoke`].
#[derive(Clone)]
pub struct ObjectProxy {
    container: Arc<Container>,
}

impl ObjectProxy {
    pub(crate) fn new(container: Arc<Container>) -> Self {
        Self { container }
    }

    pub fn reference(&self) -> &Reference {
        self.container.reference()
    }

    /// Invokes a method on the replicated object, returning its declared
    /// result or re-raising its declared failure.
    pub async fn invoke(
        &self,
        method: &str,
        arguments: Vec<Value>,
    ) -> Result<Value, InvocationError> {
        self.container.invoke(method, arguments).await
    }
}
