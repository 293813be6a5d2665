//! Object Type Registry
//!
//! A dynamic registry that maps string-based type names (e.g., "counter") to
//! the code implementing that type: an explicit constructor and an explicit
//! method dispatcher. This replaces reflective invocation: a type opts in by
//! implementing [`ReplicatedObject`] and registering itself once.
//!
//! The same registry value is shared by both sides of the protocol. The applier
//! uses it to execute delivered calls against decoded state; containers use it
//! to validate constructors at acquisition time, to query which methods are
//! read-only, and to run speculative local executions of read-only calls.

use super::types::CallResult;
use crate::store::marshalling::{decode, encode};

use anyhow::Result;
use dashmap::DashMap;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Contract a type must fulfil to be replicated.
///
/// The implementation must be deterministic: given the same state and the same
/// call, every replica must produce the same new state and the same result.
/// State crosses the store boundary through serde, so the type is serializable
/// by construction.
pub trait ReplicatedObject: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Name under which the type is registered; part of every [`super::types::Reference`].
    const TYPE_NAME: &'static str;

    /// Builds a fresh instance from the init args recorded at acquisition.
    /// Rejecting the args here is a configuration error, surfaced before any
    /// call is ever sent.
    fn construct(init_args: &[Value]) -> Result<Self>;

    /// Dispatches one method call against the current state. Unknown method
    /// names should return an error; it is captured and re-raised at the
    /// caller, never retried.
    fn invoke(&mut self, method: &str, args: &[Value]) -> Result<Value>;

    /// Methods that never mutate state. Consulted once at registration time;
    /// only these are eligible for speculative local execution.
    fn read_only_methods() -> &'static [&'static str] {
        &[]
    }
}

/// Type alias for the type-erased constructor: init args in, encoded state out.
type ConstructFn = Arc<dyn Fn(&[Value]) -> Result<Vec<u8>> + Send + Sync>;

/// Type alias for the type-erased dispatcher: decodes the state, invokes the
/// method, and returns the re-encoded state together with the captured outcome.
type InvokeFn = Arc<dyn Fn(&[u8], &str, &[Value]) -> Result<(Vec<u8>, CallResult)> + Send + Sync>;

struct TypeEntry {
    construct: ConstructFn,
    invoke: InvokeFn,
    read_only: HashSet<String>,
}

/// Registry holding the mapping between type names and their implementation.
pub struct ObjectTypeRegistry {
    types: DashMap<String, TypeEntry>,
}

impl ObjectTypeRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            types: DashMap::new(),
        })
    }

    /// Registers a replicated type under its declared name.
    pub fn register<T: ReplicatedObject>(&self) {
        let construct: ConstructFn = Arc::new(|init_args: &[Value]| {
            let object = T::construct(init_args)?;
            encode(&object)
        });

        // Application failures become part of the outcome; only decode/encode
        // problems bubble up as errors. The post-call state is persisted even
        // when the method failed, mirroring in-place mutation semantics: the
        // execution is deterministic, so every replica ends up identical.
        let invoke: InvokeFn = Arc::new(|state: &[u8], method: &str, args: &[Value]| {
            let mut object: T = decode(state)?;
            let result = match object.invoke(method, args) {
                Ok(value) => CallResult::Value(value),
                Err(e) => CallResult::Failed {
                    error: e.to_string(),
                },
            };
            Ok((encode(&object)?, result))
        });

        let read_only: HashSet<String> = T::read_only_methods()
            .iter()
            .map(|m| m.to_string())
            .collect();

        self.types.insert(
            T::TYPE_NAME.to_string(),
            TypeEntry {
                construct,
                invoke,
                read_only,
            },
        );

        tracing::info!("Registered replicated type: {}", T::TYPE_NAME);
    }

    /// Builds encoded initial state for a type, validating the init args.
    ///
    /// Called by the applier on first use of an object, and by the factory as a
    /// dry run at acquisition time (the result is discarded there).
    pub fn construct_state(&self, type_name: &str, init_args: &[Value]) -> Result<Vec<u8>> {
        match self.types.get(type_name) {
            Some(entry) => (entry.construct)(init_args),
            None => {
                let error = format!("Unknown object type: {}", type_name);
                tracing::error!("{}", error);
                Err(anyhow::anyhow!(error))
            }
        }
    }

    /// Looks up a type and executes one method call against the given state.
    ///
    /// Returns the re-encoded post-call state and the captured outcome.
    pub fn execute(
        &self,
        type_name: &str,
        state: &[u8],
        method: &str,
        args: &[Value],
    ) -> Result<(Vec<u8>, CallResult)> {
        match self.types.get(type_name) {
            Some(entry) => (entry.invoke)(state, method, args),
            None => Err(anyhow::anyhow!("Unknown object type: {}", type_name)),
        }
    }

    /// Checks if a type is registered.
    pub fn has_type(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    /// True when the named method was declared read-only by the type.
    pub fn is_read_only(&self, type_name: &str, method: &str) -> bool {
        self.types
            .get(type_name)
            .map(|entry| entry.read_only.contains(method))
            .unwrap_or(false)
    }

    /// True when the type declared at least one read-only method. A container
    /// asked for read optimization on a type without any read-only methods
    /// silently falls back to the full protocol.
    pub fn has_read_only_methods(&self, type_name: &str) -> bool {
        self.types
            .get(type_name)
            .map(|entry| !entry.read_only.is_empty())
            .unwrap_or(false)
    }

    /// Returns a list of all registered type names.
    pub fn registered_types(&self) -> Vec<String> {
        self.types.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Returns the total number of registered types.
    pub fn type_count(&self) -> usize {
        self.types.len()
    }
}

impl Default for ObjectTypeRegistry {
    fn default() -> Self {
        Self {
            types: DashMap::new(),
        }
    }
}
