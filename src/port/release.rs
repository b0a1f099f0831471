//! Releasable resources held by the orchestrator itself.

/// A pooled external resource that must be released on shutdown.
pub trait ResourceRelease: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Drop the held resource. Called at most once per teardown.
    fn release(&self);
}
