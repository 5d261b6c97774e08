use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

const NO_EXTENSION: &str = "[no ext]";

/// Counters for one or more inventory builds, returned to the caller rather
/// than kept in process-wide state.
#[derive(Debug, Default, Clone)]
pub struct ScanSummary {
    /// Filter decisions keyed on lowercased extension.
    pub passed: BTreeMap<String, usize>,
    pub rejected: BTreeMap<String, usize>,
    pub candidates: usize,
    pub files_identified: usize,
    pub bytes_identified: u64,
    /// Files that could not be identified, with the reason.
    pub failures: Vec<(PathBuf, String)>,
    /// Directory entries the walker could not read.
    pub walk_errors: usize,
    pub elapsed: Duration,
}

impl ScanSummary {
    pub fn record_filter(&mut self, extension: Option<&str>, accepted: bool) {
        let key = extension.unwrap_or(NO_EXTENSION).to_string();
        let counts = if accepted {
            &mut self.passed
        } else {
            &mut self.rejected
        };
        *counts.entry(key).or_default() += 1;
    }

    /// Fold another summary into this one.
    pub fn absorb(&mut self, other: ScanSummary) {
        for (ext, count) in other.passed {
            *self.passed.entry(ext).or_default() += count;
        }
        for (ext, count) in other.rejected {
            *self.rejected.entry(ext).or_default() += count;
        }
        self.candidates += other.candidates;
        self.files_identified += other.files_identified;
        self.bytes_identified += other.bytes_identified;
        self.failures.extend(other.failures);
        self.walk_errors += other.walk_errors;
        self.elapsed += other.elapsed;
    }

    pub fn log_filter_summary(&self) {
        if self.passed.is_empty() {
            info!("No files processed.");
        } else {
            info!("Files accepted by filter:");
            for (ext, count) in by_count_desc(&self.passed) {
                info!("  {}: {}", ext, count);
            }
        }

        if self.rejected.is_empty() {
            info!("No files filtered.");
        } else {
            info!("Files filtered:");
            for (ext, count) in by_count_desc(&self.rejected) {
                info!("  {}: {}", ext, count);
            }
        }
    }
}

fn by_count_desc(counts: &BTreeMap<String, usize>) -> Vec<(&String, &usize)> {
    let mut items: Vec<_> = counts.iter().collect();
    items.sort_by(|a, b| b.1.cmp(a.1).then_with(|| b.0.cmp(a.0)));
    items
}
