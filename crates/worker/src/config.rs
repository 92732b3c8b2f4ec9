//! Worker configuration.

use pixport_infra::retry::RetryPolicy;

/// Static configuration for one worker process.
///
/// Built once at startup (from the environment or defaults) and carried in
/// the [`crate::WorkerContext`]; nothing reads the environment after that.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Queue the completion signal is sent to.
    pub queue_name: String,
    /// Key prefix uploads arrive under.
    pub source_prefix: String,
    /// Key prefix converted files are written under; also the prefix
    /// advertised in the completion message.
    pub output_prefix: String,
    /// Backoff policy for contended counter updates.
    pub retry: RetryPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_name: "pixport-completed-batches".to_string(),
            source_prefix: "OriginalImages".to_string(),
            output_prefix: "Converted".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl WorkerConfig {
    /// Load from the environment, falling back to defaults per variable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            queue_name: std::env::var("PIXPORT_QUEUE_NAME").unwrap_or(defaults.queue_name),
            source_prefix: std::env::var("PIXPORT_SOURCE_PREFIX").unwrap_or(defaults.source_prefix),
            output_prefix: std::env::var("PIXPORT_OUTPUT_PREFIX").unwrap_or(defaults.output_prefix),
            retry: defaults.retry,
        }
    }
}
