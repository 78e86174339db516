/// Per-block progress reporting.
///
/// Implementors can use this to drive progress bars or logging. All methods
/// have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// Scheduling finished; `total_blocks` blocks will be processed.
    fn begin(&self, _total_blocks: usize) {}

    /// One more block has been processed. `blocks_done` counts from 1.
    fn advance(&self, _blocks_done: usize) {}

    /// All blocks are done.
    fn finish(&self) {}
}

/// Reporter that ignores every update.
pub struct NoOpReporter;

impl ProgressReporter for NoOpReporter {}
