//! The interface consumed from the distributed store collaborator.

use crate::object::types::{Call, CallResponse, Reference};
use anyhow::Result;
use std::sync::Arc;

/// Callback invoked once per response the store propagates back to this
/// process. Runs on the store's notification path and must never block on
/// application-level work; completing a pending future is all it may do.
pub type ResponseListener = Arc<dyn Fn(CallResponse) + Send + Sync>;

/// What the replication protocol needs from the backing store.
///
/// Implementations route each call to the single current owner of the target
/// reference, apply it there through the state-machine applier, and propagate
/// the response back to every registered listener. Submission is asynchronous:
/// `submit` only hands the call over, the response arrives via the listener.
pub trait ObjectStore: Send + Sync {
    /// Hands a call to the store for application on the entry's owner.
    ///
    /// An `Ok` return means accepted for delivery, not applied; failures after
    /// this point surface as a missing response (and the container's retry).
    fn submit(&self, call: Call) -> Result<()>;

    /// Reads the encoded authoritative state for a reference, if the entry
    /// exists.
    fn read_entry(&self, reference: &Reference) -> Option<Vec<u8>>;

    /// Removes the entry for a reference. This is the explicit, terminal
    /// disposal of the object's authoritative state.
    fn remove_entry(&self, reference: &Reference);

    /// Registers a response listener. All listeners see every response; a
    /// listener that does not recognize a call id drops it.
    fn register_listener(&self, listener: ResponseListener);
}
