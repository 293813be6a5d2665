//! Object Data Model Module
//!
//! Defines what a replicated object *is* on the wire: its identity, the
//! envelope carrying one method invocation, and the matching result envelope.
//!
//! ## Core Concepts
//! - **Reference**: (type name, key) pair identifying one object across the
//!   cluster. Used both as the store key and as the client-side lookup key.
//! - **Call / CallResponse**: the invocation protocol. A `Call` keeps the same
//!   id across retries so the applier can deduplicate; a `CallResponse` carries
//!   either the method's value or its captured failure.
//! - **Registry**: replicated types register an explicit constructor, a method
//!   dispatcher, and their read-only method set. No runtime reflection.

pub mod registry;
pub mod types;
