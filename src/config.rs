//! Protocol tuning knobs.
//!
//! A `ProtocolConfig` is passed explicitly to each factory and store instead of
//! living in process-wide globals, so independent factories in one process can
//! run with different settings.

use std::time::Duration;

/// How long one attempt waits for a response before resubmitting.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_millis(1000);
/// How many times the same call is submitted before the invocation fails.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// How many applied call ids are remembered per object for deduplication.
pub const DEFAULT_DEDUP_WINDOW: usize = 1024;
/// How many live containers a factory keeps before evicting the oldest.
pub const DEFAULT_MAX_CONTAINERS: usize = 1024;

#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Per-attempt wait bound for a call response.
    pub call_timeout: Duration,
    /// Attempt budget for one logical invocation (same call id across retries).
    pub max_attempts: u32,
    /// Capacity of the per-object record of applied call ids.
    pub dedup_window: usize,
    /// Bound on live containers per factory (least-recently-used is evicted).
    pub max_containers: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            dedup_window: DEFAULT_DEDUP_WINDOW,
            max_containers: DEFAULT_MAX_CONTAINERS,
        }
    }
}
