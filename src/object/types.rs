use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity of a replicated object: the registered type name plus a key.
///
/// Two references are equal iff both fields match. The reference doubles as the
/// store key for the object's authoritative state and as the map key for all
/// client-side bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Reference {
    pub type_name: String,
    pub key: String,
}

impl Reference {
    pub fn new(type_name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            key: key.into(),
        }
    }

    /// Builds a reference with a fresh unique key, for callers that do not care
    /// which key backs the object.
    pub fn with_generated_key(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            key: uuid::Uuid::new_v4().to_string(),
        }
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.type_name, self.key)
    }
}

/// Unique identifier for one logical invocation.
///
/// Wrapper around a UUID string. Retries of the same invocation reuse the same
/// id, which is what allows the applier to suppress duplicate execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CallId(pub String);

impl CallId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-call mode bits, copied from the issuing container's configuration.
///
/// Carried on the wire so the applier needs no per-client state: it learns from
/// the envelope itself whether to record the response for deduplication and
/// whether to attach a state snapshot.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CallFlags {
    /// Attach a snapshot of the post-call state to the response.
    pub read_optimization: bool,
    /// Record the response so a retried call id returns it without re-executing.
    pub idempotent: bool,
    /// Discard any existing state and construct a fresh object before applying.
    /// Set only on the first call a container sends.
    pub force_new: bool,
}

/// One invocation attempt travelling from a container to the applier.
///
/// `init_args` ride along on every call so the applier can construct the object
/// on first use without a separate creation round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    pub call_id: CallId,
    pub reference: Reference,
    pub method: String,
    pub arguments: Vec<Value>,
    pub init_args: Vec<Value>,
    pub flags: CallFlags,
}

/// Outcome of one applied call: the method's value, or its captured failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum CallResult {
    Value(Value),
    Failed { error: String },
}

/// Result envelope matched to a `Call` by id.
///
/// `state` is populated only for read-optimized containers, letting the client
/// refresh its local copy without an extra round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallResponse {
    pub call_id: CallId,
    pub result: CallResult,
    pub state: Option<Vec<u8>>,
}

impl CallResponse {
    /// Response for a call that could not be applied at all (bad type, decode
    /// failure). Infrastructure problems are reported as invocation failures
    /// rather than surfacing raw store errors to application code.
    pub fn failure(call_id: CallId, error: impl std::fmt::Display) -> Self {
        Self {
            call_id,
            result: CallResult::Failed {
                error: error.to_string(),
            },
            state: None,
        }
    }
}
