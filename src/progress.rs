/// Trait for reporting inventory progress.
///
/// The CLI implements it with indicatif bars; library callers and tests use
/// `SilentReporter`. All methods have default no-op implementations.
/// Identification hooks are called from worker threads.
pub trait ProgressReporter: Send + Sync {
    fn on_walk_start(&self, _root: &str) {}
    fn on_walk_complete(&self, _candidates: usize, _duration_secs: f64) {}
    fn on_identify_start(&self, _total_files: usize) {}
    fn on_identify_progress(&self, _files_done: usize, _total_files: usize) {}
    fn on_identify_complete(&self, _records: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
