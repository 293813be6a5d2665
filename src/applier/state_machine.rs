use super::dedup::DedupWindow;
use crate::object::registry::ObjectTypeRegistry;
use crate::object::types::{Call, CallResponse, Reference};

use anyhow::Result;
use dashmap::DashMap;
use std::sync::Arc;

/// Deterministic executor applying delivered calls to authoritative state.
///
/// The store guarantees that `apply` is never entered concurrently for the same
/// reference (per-key single writer); calls to different references may be
/// applied fully in parallel.
pub struct StateMachineApplier {
    registry: Arc<ObjectTypeRegistry>,
    /// Authoritative encoded state, shared with the store's entry map so the
    /// persisted write rides the store's own replication path.
    entries: Arc<DashMap<Reference, Vec<u8>>>,
    /// Per-reference record of applied call ids and their responses.
    applied: DashMap<Reference, DedupWindow>,
    dedup_window: usize,
}

impl StateMachineApplier {
    pub fn new(
        registry: Arc<ObjectTypeRegistry>,
        entries: Arc<DashMap<Reference, Vec<u8>>>,
        dedup_window: usize,
    ) -> Self {
        Self {
            registry,
            entries,
            applied: DashMap::new(),
            dedup_window,
        }
    }

    /// Applies one delivered call and produces its response.
    ///
    /// A call id that was already applied returns the recorded response without
    /// touching the object; this is what makes a retry after a lost response
    /// harmless even for mutating methods.
    pub fn apply(&self, call: &Call) -> CallResponse {
        if call.flags.idempotent
            && let Some(window) = self.applied.get(&call.reference)
            && let Some(recorded) = window.lookup(&call.call_id)
        {
            tracing::trace!(
                "Call {} already applied to {}, returning recorded response",
                call.call_id,
                call.reference
            );
            return recorded.clone();
        }

        let response = self.apply_fresh(call);

        if call.flags.idempotent {
            self.applied
                .entry(call.reference.clone())
                .or_insert_with(|| DedupWindow::new(self.dedup_window))
                .record(response.clone());
        }

        response
    }

    fn apply_fresh(&self, call: &Call) -> CallResponse {
        let state = match self.load_state(call) {
            Ok(state) => state,
            Err(e) => {
                tracing::error!("Cannot materialize {}: {}", call.reference, e);
                return CallResponse::failure(call.call_id.clone(), e);
            }
        };

        match self
            .registry
            .execute(&call.reference.type_name, &state, &call.method, &call.arguments)
        {
            Ok((new_state, result)) => {
                // Persist before responding: the response must never promise a
                // state the store does not hold.
                self.entries.insert(call.reference.clone(), new_state.clone());

                let snapshot = call.flags.read_optimization.then_some(new_state);

                CallResponse {
                    call_id: call.call_id.clone(),
                    result,
                    state: snapshot,
                }
            }
            Err(e) => {
                tracing::error!("Failed to apply {} on {}: {}", call.method, call.reference, e);
                CallResponse::failure(call.call_id.clone(), e)
            }
        }
    }

    /// Loads the object's encoded state, constructing it on first use.
    fn load_state(&self, call: &Call) -> Result<Vec<u8>> {
        if !call.flags.force_new
            && let Some(existing) = self.entries.get(&call.reference)
        {
            return Ok(existing.value().clone());
        }

        tracing::debug!(
            "Constructing {} (force_new: {})",
            call.reference,
            call.flags.force_new
        );
        self.registry
            .construct_state(&call.reference.type_name, &call.init_args)
    }

    /// Drops the dedup record for a destroyed object.
    pub fn forget(&self, reference: &Reference) {
        self.applied.remove(reference);
    }

    /// Accessor for tests: recorded call count for a reference.
    pub fn recorded_calls(&self, reference: &Reference) -> usize {
        self.applied
            .get(reference)
            .map(|window| window.len())
            .unwrap_or(0)
    }
}
