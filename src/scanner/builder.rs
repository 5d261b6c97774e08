use super::escape::escape_os_str;
use super::filter::{extension_of, FileFilter, PROBED_IMAGE_EXTENSIONS};
use super::summary::ScanSummary;
use super::walk;
use crate::error::Error;
use crate::hasher::{self, ChecksumAlgorithm};
use crate::model::{InventoryRecord, MediaInfo, Snapshot};
use crate::progress::ProgressReporter;
use glob::Pattern;
use rayon::prelude::*;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Upper bound on identification threads; beyond this the disk is the
/// bottleneck.
pub const MAX_WORKERS: usize = 4;

pub fn default_worker_count() -> usize {
    MAX_WORKERS.min(num_cpus::get()).max(1)
}

/// Source of capture date / pixel dimensions for image files.
pub trait MediaProbe: Send + Sync {
    fn probe(&self, path: &Path) -> Option<MediaInfo>;
}

/// Probe that never finds anything.
pub struct NoMediaProbe;

impl MediaProbe for NoMediaProbe {
    fn probe(&self, _path: &Path) -> Option<MediaInfo> {
        None
    }
}

/// How record paths are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathMode {
    /// Strip the inventoried root, leaving a relative path.
    RelativeToRoot,
    /// Keep the full path (used when several roots feed one duplicate run).
    KeepRoot,
}

/// Builds a sorted snapshot of one directory.
pub struct InventoryBuilder {
    algorithm: ChecksumAlgorithm,
    recursive: bool,
    workers: usize,
    tolerate_races: bool,
    escape_non_ascii: bool,
    path_mode: PathMode,
    ignore_patterns: Vec<Pattern>,
    probe: Arc<dyn MediaProbe>,
    /// Built on first use and reused by every later `build` call.
    pool: OnceLock<rayon::ThreadPool>,
}

impl Default for InventoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InventoryBuilder {
    pub fn new() -> Self {
        Self {
            algorithm: ChecksumAlgorithm::Sha256,
            recursive: false,
            workers: default_worker_count(),
            tolerate_races: false,
            escape_non_ascii: false,
            path_mode: PathMode::RelativeToRoot,
            ignore_patterns: Vec::new(),
            probe: Arc::new(NoMediaProbe),
            pool: OnceLock::new(),
        }
    }

    pub fn with_algorithm(mut self, algorithm: ChecksumAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// One worker when `single` is set, otherwise the default pool size.
    pub fn single_threaded(mut self, single: bool) -> Self {
        self.with_workers(if single { 1 } else { default_worker_count() })
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self.pool = OnceLock::new();
        self
    }

    pub fn tolerate_races(mut self, tolerate: bool) -> Self {
        self.tolerate_races = tolerate;
        self
    }

    pub fn escape_non_ascii(mut self, escape: bool) -> Self {
        self.escape_non_ascii = escape;
        self
    }

    pub fn with_path_mode(mut self, mode: PathMode) -> Self {
        self.path_mode = mode;
        self
    }

    pub fn with_ignore_patterns(mut self, patterns: Vec<Pattern>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn MediaProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Walk `root`, identify every accepted file on the worker pool and return
    /// the sorted snapshot with its summary.
    ///
    /// A file that fails identification is logged. Unless races are
    /// tolerated, any such failure aborts the build with
    /// `ReconciliationMismatch` after the pool has drained.
    pub fn build(
        &self,
        root: &Path,
        filter: &dyn FileFilter,
        reporter: &dyn ProgressReporter,
    ) -> Result<(Snapshot, ScanSummary), Error> {
        let started = Instant::now();
        let mut summary = ScanSummary::default();
        debug!(
            "Build inventory (recursive={}) for directory: {}",
            self.recursive,
            root.display()
        );

        reporter.on_walk_start(&root.to_string_lossy());
        let candidates = walk::list_candidates(
            root,
            self.recursive,
            &self.ignore_patterns,
            filter,
            &mut summary,
        )?;
        walk::check_walk_errors(root, summary.walk_errors, self.tolerate_races)?;
        reporter.on_walk_complete(candidates.len(), started.elapsed().as_secs_f64());

        let identify_started = Instant::now();
        let results = self.identify_all(root, &candidates, reporter)?;
        let records = collect_results(candidates.len(), results, self.tolerate_races, &mut summary)?;
        reporter.on_identify_complete(records.len(), identify_started.elapsed().as_secs_f64());

        summary.files_identified = records.len();
        summary.bytes_identified = records.iter().map(|r| r.size_bytes).sum();
        summary.elapsed = started.elapsed();

        let elapsed = summary.elapsed.as_secs_f64();
        if elapsed > 2.0 {
            info!(
                "Spent {:.1}s on {} bytes of files ({:.1} MB/sec).",
                elapsed,
                summary.bytes_identified,
                summary.bytes_identified as f64 / (1024.0 * 1024.0 * elapsed)
            );
        }

        let snapshot = Snapshot::new(records)?;
        Ok((snapshot, summary))
    }

    /// Every candidate yields exactly one entry: its record or its error.
    fn identify_all(
        &self,
        root: &Path,
        candidates: &[PathBuf],
        reporter: &dyn ProgressReporter,
    ) -> Result<Vec<(PathBuf, Result<InventoryRecord, Error>)>, Error> {
        let total = candidates.len();
        reporter.on_identify_start(total);
        let done = AtomicUsize::new(0);

        let pool = self.pool()?;
        let results: Vec<(PathBuf, Result<InventoryRecord, Error>)> = pool.install(|| {
            candidates
                .par_iter()
                .enumerate()
                .map(|(idx, path)| {
                    debug!("ID file {} of {}: '{}'", idx + 1, total, path.display());
                    let result = self.identify_one(root, path);
                    let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                    reporter.on_identify_progress(finished, total);
                    (path.clone(), result)
                })
                .collect()
        });

        Ok(results)
    }

    fn pool(&self) -> Result<&rayon::ThreadPool, Error> {
        if let Some(pool) = self.pool.get() {
            return Ok(pool);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("inventory-id-{}", i))
            .build()?;
        Ok(self.pool.get_or_init(|| pool))
    }

    fn identify_one(&self, root: &Path, path: &Path) -> Result<InventoryRecord, Error> {
        let identity = hasher::identify_file(path, self.algorithm)?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let media = match extension_of(&name) {
            Some(ext) if PROBED_IMAGE_EXTENSIONS.contains(&ext.as_str()) => self.probe.probe(path),
            _ => None,
        };

        let recorded = match self.path_mode {
            PathMode::RelativeToRoot => path.strip_prefix(root).map_err(|_| {
                Error::Other(format!(
                    "Unable to remove directory '{}' from path '{}'",
                    root.display(),
                    path.display()
                ))
            })?,
            PathMode::KeepRoot => path,
        };
        let record_path = if self.escape_non_ascii {
            join_components(recorded, escape_os_str)
        } else {
            if recorded.to_str().is_none() {
                warn!(
                    "'{}' is not valid UTF-8 and is recorded lossily; enable escaping to keep its bytes.",
                    path.display()
                );
            }
            normalize_path(recorded)
        };

        Ok(InventoryRecord::new(record_path, identity.size, identity.checksum).with_media(media))
    }
}

/// Join path components with `/` whatever the platform separator.
pub fn normalize_path(path: &Path) -> String {
    join_components(path, |part| part.to_string_lossy().into_owned())
}

fn join_components(path: &Path, render: impl Fn(&OsStr) -> String) -> String {
    let mut out = String::new();
    for component in path.components() {
        match component {
            Component::RootDir => out.push('/'),
            Component::Prefix(prefix) => out.push_str(&render(prefix.as_os_str())),
            Component::CurDir => {}
            other => {
                if !out.is_empty() && !out.ends_with('/') {
                    out.push('/');
                }
                out.push_str(&render(other.as_os_str()));
            }
        }
    }
    out
}

/// Split per-file results into records and failures, and check that every
/// candidate is accounted for.
pub(crate) fn collect_results(
    expected: usize,
    results: Vec<(PathBuf, Result<InventoryRecord, Error>)>,
    tolerate_races: bool,
    summary: &mut ScanSummary,
) -> Result<Vec<InventoryRecord>, Error> {
    if results.len() != expected {
        return Err(Error::ReconciliationMismatch {
            context: "worker results",
            expected,
            actual: results.len(),
        });
    }

    let mut records = Vec::with_capacity(results.len());
    for (path, result) in results {
        match result {
            Ok(record) => records.push(record),
            Err(err) => {
                error!("Error while examining '{}': {}", path.display(), err);
                summary.failures.push((path, err.to_string()));
            }
        }
    }

    if records.len() != expected {
        if tolerate_races {
            warn!(
                "{} of {} files could not be identified and are left out of the inventory.",
                expected - records.len(),
                expected
            );
        } else {
            return Err(Error::ReconciliationMismatch {
                context: "identified files",
                expected,
                actual: records.len(),
            });
        }
    }

    Ok(records)
}
