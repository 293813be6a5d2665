//! Factory Module
//!
//! The entry point for application code: acquire a proxy for a (type, key)
//! pair, invoke methods on it, dispose of it.
//!
//! ## Core Mechanisms
//! - **Registry of live containers**: exactly one container per reference per
//!   factory, installed first-writer-wins under concurrent acquisition.
//! - **Bounded caching**: an explicit LRU structure caps the number of live
//!   containers; eviction releases only local resources, the authoritative
//!   state stays durable in the store and in-flight calls still complete.
//! - **Explicit construction**: a factory is built from a store handle, a type
//!   registry and a config. Several independent factories can coexist in one
//!   process, each bound to its own store.

pub mod cache;
pub mod factory;

#[cfg(test)]
mod tests;
