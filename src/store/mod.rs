//! Store Boundary Module
//!
//! The distributed key/value store is an external collaborator; this module
//! defines the narrow interface the protocol needs from it and provides one
//! in-process implementation of that interface.
//!
//! ## Required guarantees
//! - **Per-key single writer**: no two calls targeting the same reference are
//!   ever applied concurrently. This serialization *is* the ordering mechanism;
//!   no consensus round runs above it.
//! - **Delivery**: each submitted call reaches the applier on the entry's owner
//!   exactly once per write, and the resulting response is propagated back to
//!   the registered listeners.
//! - **Marshalling**: an opaque encode/decode pair applied to payloads crossing
//!   the boundary.

pub mod api;
pub mod marshalling;
pub mod memory;
