use super::cache::ContainerCache;
use crate::config::ProtocolConfig;
use crate::container::container::{Container, Modes, ObjectProxy};
use crate::container::pending::PendingCalls;
use crate::error::FactoryError;
use crate::object::registry::{ObjectTypeRegistry, ReplicatedObject};
use crate::object::types::Reference;
use crate::store::api::ObjectStore;

use serde_json::Value;
use std::sync::Arc;

/// Process-local registry of replicated-object containers over one store.
///
/// A factory owns its containers and the pending-call table they share, and it
/// registers exactly one response listener with the store. Multiple factories
/// may share a store; each ignores responses for calls it did not issue.
pub struct Factory {
    store: Arc<dyn ObjectStore>,
    registry: Arc<ObjectTypeRegistry>,
    pending: Arc<PendingCalls>,
    containers: ContainerCache,
    config: ProtocolConfig,
}

impl Factory {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        registry: Arc<ObjectTypeRegistry>,
        config: ProtocolConfig,
    ) -> Arc<Self> {
        let pending = PendingCalls::new();

        {
            let pending = pending.clone();
            store.register_listener(Arc::new(move |response| pending.complete(response)));
        }

        // Eviction only releases local resources: the last applied state is
        // already durable in the store, and in-flight calls resolve through
        // the factory-wide pending table, not through the container.
        let containers = ContainerCache::new(
            config.max_containers,
            Box::new(|reference, _container| {
                tracing::info!("Evicted container for {}", reference);
            }),
        );

        tracing::info!("Factory created (max {} containers)", config.max_containers);

        Arc::new(Self {
            store,
            registry,
            pending,
            containers,
            config,
        })
    }

    /// Acquires a proxy for the replicated object of type `T` under `key`.
    ///
    /// Passing no key backs the object with a fresh generated one. Re-acquiring
    /// a live reference returns the existing container's proxy; mode flags and
    /// init args of the first acquisition stay in effect for it.
    pub fn instance_of<T: ReplicatedObject>(
        &self,
        key: Option<&str>,
        modes: Modes,
        init_args: Vec<Value>,
    ) -> Result<ObjectProxy, FactoryError> {
        self.instance_by_name(T::TYPE_NAME, key, modes, init_args)
    }

    /// Untyped variant of [`Factory::instance_of`] for callers holding only a
    /// type name.
    pub fn instance_by_name(
        &self,
        type_name: &str,
        key: Option<&str>,
        modes: Modes,
        init_args: Vec<Value>,
    ) -> Result<ObjectProxy, FactoryError> {
        if !self.registry.has_type(type_name) {
            return Err(FactoryError::UnknownType(type_name.to_string()));
        }

        let reference = match key {
            Some(key) => Reference::new(type_name, key),
            None => Reference::with_generated_key(type_name),
        };

        // Idempotent re-acquisition of a live container.
        if let Some(container) = self.containers.get(&reference) {
            return Ok(ObjectProxy::new(container));
        }

        // The type must expose a constructor compatible with the init args;
        // this dry run fails acquisition before any call is sent.
        self.registry
            .construct_state(type_name, &init_args)
            .map_err(|e| FactoryError::Constructor {
                type_name: type_name.to_string(),
                reason: e.to_string(),
            })?;

        let container = Container::new(
            reference.clone(),
            self.store.clone(),
            self.registry.clone(),
            self.pending.clone(),
            self.config.clone(),
            modes,
            init_args,
        );

        let installed = self.containers.insert_if_absent(reference.clone(), container);

        tracing::debug!("Acquired {}", reference);

        Ok(ObjectProxy::new(installed))
    }

    /// Tears down the local container for a reference. No-op when none is
    /// registered. The authoritative state stays in the store; other factories
    /// (and a later re-acquisition here) still observe it.
    pub fn dispose_instance_of(&self, reference: &Reference) {
        match self.containers.remove(reference) {
            Some(_) => tracing::debug!("Disposed container for {}", reference),
            None => tracing::trace!("No container registered for {}", reference),
        }
    }

    /// Disposes the local container *and* removes the object's authoritative
    /// state from the store. Terminal: using the reference again starts a
    /// fresh object lifecycle through a new acquisition.
    pub fn destroy_instance_of(&self, reference: &Reference) {
        self.dispose_instance_of(reference);
        self.store.remove_entry(reference);
        tracing::info!("Destroyed {}", reference);
    }

    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    /// Accessor for tests: in-flight call count across all containers.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
