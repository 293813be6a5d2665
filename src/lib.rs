//! Replicated Shared Objects Library
//!
//! This library crate turns ordinary values into replicated, consistent shared
//! objects. A client acquires a proxy for a (type, key) pair and invokes methods
//! on it as if the object were local; the runtime guarantees that every replica
//! of that object applies the same sequence of calls in the same order.
//!
//! Ordering is not implemented here: it is delegated to the backing key/value
//! store, which applies writes to a given key one at a time on that key's single
//! owner. Everything above that guarantee lives in this crate.
//!
//! ## Architecture Modules
//! The system is composed of five loosely coupled subsystems:
//!
//! - **`object`**: The data model. Object identity (`Reference`), the invocation
//!   envelope (`Call`/`CallResponse`), and the `ObjectTypeRegistry` mapping type
//!   names to explicit constructors and method dispatchers.
//! - **`container`**: The client runtime. One `Container` per live reference
//!   drives the invoke/wait/retry protocol against the store and optionally
//!   serves read-only calls from a cached local copy.
//! - **`applier`**: The server side. A deterministic state-machine applier that
//!   executes delivered calls against authoritative state and suppresses
//!   duplicate call ids so client retries are safe.
//! - **`store`**: The boundary to the distributed key/value store, plus an
//!   in-process implementation with the same per-key single-writer guarantee.
//! - **`factory`**: The entry point. A bounded registry of live containers with
//!   LRU eviction, acquisition and disposal of replicated objects.

pub mod applier;
pub mod config;
pub mod container;
pub mod error;
pub mod factory;
pub mod object;
pub mod store;
