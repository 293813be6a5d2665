//! In-process store implementation.
//!
//! Provides the full [`ObjectStore`] contract inside a single process: an
//! authoritative entry map, one write lock per reference enforcing the
//! single-writer guarantee, and broadcast of every response to all registered
//! listeners. Several factories can share one instance, which is also how the
//! protocol is exercised end-to-end without a cluster.

use super::api::{ObjectStore, ResponseListener};
use crate::applier::state_machine::StateMachineApplier;
use crate::config::ProtocolConfig;
use crate::object::registry::ObjectTypeRegistry;
use crate::object::types::{Call, Reference};

use anyhow::Result;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

pub struct InProcessStore {
    /// Authoritative encoded state, one entry per live reference.
    entries: Arc<DashMap<Reference, Vec<u8>>>,
    /// Serializes application per reference. Never removed once created, so a
    /// call racing a disposal still goes through the same lock.
    write_locks: DashMap<Reference, Arc<Mutex<()>>>,
    applier: Arc<StateMachineApplier>,
    listeners: Arc<DashMap<usize, ResponseListener>>,
    next_listener: AtomicUsize,
}

impl InProcessStore {
    pub fn new(registry: Arc<ObjectTypeRegistry>, config: &ProtocolConfig) -> Arc<Self> {
        let entries: Arc<DashMap<Reference, Vec<u8>>> = Arc::new(DashMap::new());
        let applier = Arc::new(StateMachineApplier::new(
            registry,
            entries.clone(),
            config.dedup_window,
        ));

        tracing::info!("In-process store created");

        Arc::new(Self {
            entries,
            write_locks: DashMap::new(),
            applier,
            listeners: Arc::new(DashMap::new()),
            next_listener: AtomicUsize::new(0),
        })
    }

    fn write_lock(&self, reference: &Reference) -> Arc<Mutex<()>> {
        self.write_locks
            .entry(reference.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Accessor for tests and instrumentation.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

impl ObjectStore for InProcessStore {
    fn submit(&self, call: Call) -> Result<()> {
        let lock = self.write_lock(&call.reference);
        let applier = self.applier.clone();
        let listeners = self.listeners.clone();

        // Delivery happens off the caller's path; the order in which tasks
        // acquire the per-reference lock is the application order.
        tokio::spawn(async move {
            let response = {
                let _guard = lock.lock().await;
                applier.apply(&call)
            };

            for listener in listeners.iter() {
                (listener.value())(response.clone());
            }
        });

        Ok(())
    }

    fn read_entry(&self, reference: &Reference) -> Option<Vec<u8>> {
        self.entries.get(reference).map(|entry| entry.value().clone())
    }

    fn remove_entry(&self, reference: &Reference) {
        self.entries.remove(reference);
        self.applier.forget(reference);
        tracing::debug!("Removed store entry for {}", reference);
    }

    fn register_listener(&self, listener: ResponseListener) {
        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        self.listeners.insert(id, listener);
    }
}
