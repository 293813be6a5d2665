//! Client Container Module
//!
//! One container exists per live reference per factory. It owns the client half
//! of the invocation protocol:
//!
//! 1. Register a pending future for the call id, *then* submit the call, so a
//!    response racing ahead of registration is never lost.
//! 2. Wait with a bounded timeout; on expiry, resubmit the identical call (same
//!    id) up to the attempt budget, then fail with a timeout error.
//! 3. Resolve the future from the store's notification path; duplicate and
//!    orphan responses are dropped silently.
//!
//! With read optimization enabled, calls to methods the type declared read-only
//! are served from a cached local copy without contacting the store, trading
//! linearizability for sequential consistency.

pub mod container;
pub mod pending;
