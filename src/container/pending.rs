use crate::object::types::{CallId, CallResponse};

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Concurrent table of in-flight calls, shared by every container of one
/// factory.
///
/// The invoking task inserts before submitting and removes on terminal
/// outcomes; the store's notification path removes-and-completes. Both go
/// through `DashMap`'s atomic per-key operations, so a future is completed at
/// most once and no entry leaks.
pub struct PendingCalls {
    calls: DashMap<CallId, oneshot::Sender<CallResponse>>,
}

impl PendingCalls {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: DashMap::new(),
        })
    }

    /// Registers a future for a call id and returns its receiving half.
    /// Must be called before the call is submitted.
    pub fn register(&self, call_id: CallId) -> oneshot::Receiver<CallResponse> {
        let (sender, receiver) = oneshot::channel();
        self.calls.insert(call_id, sender);
        receiver
    }

    /// Drops the pending entry for an abandoned call. Returns whether an entry
    /// was still present.
    pub fn unregister(&self, call_id: &CallId) -> bool {
        self.calls.remove(call_id).is_some()
    }

    /// Completes the matching future, if any. Runs on the notification path:
    /// it must never block, and a response without a pending entry is a
    /// duplicate of an already-resolved or abandoned call.
    pub fn complete(&self, response: CallResponse) {
        match self.calls.remove(&response.call_id) {
            Some((call_id, sender)) => {
                if sender.send(response).is_err() {
                    // Caller gave up between our remove and this send; ignored race.
                    tracing::trace!("Caller abandoned call {}", call_id);
                }
            }
            None => {
                tracing::trace!("Response {} ignored", response.call_id);
            }
        }
    }

    pub fn contains(&self, call_id: &CallId) -> bool {
        self.calls.contains_key(call_id)
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}
