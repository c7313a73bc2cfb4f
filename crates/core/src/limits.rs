//! Size limits and pipeline defaults.

/// Maximum envelope payload size in bytes (1MB).
///
/// Checked on the raw request body before deserialization.
pub const MAX_ENVELOPE_SIZE_BYTES: usize = 1024 * 1024;

/// Default capacity of the per-sink ingestion handoff queue.
pub const DEFAULT_HANDOFF_CAPACITY: usize = 1024;

/// Default accumulated data points per database before an insight is generated.
pub const DEFAULT_BATCH_SIZE: u64 = 10;

/// Default number of recent measurement rows fed to the model.
pub const DEFAULT_PROMPT_WINDOW: usize = 50;

/// Default deadline for a single model call (seconds).
///
/// Local models on CPU can take well over a minute for a long prompt.
pub const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 120;
