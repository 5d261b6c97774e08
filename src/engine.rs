use crate::analysis::dupes::duplicates_per_snapshot;
use crate::analysis::{
    Confirm, DeletionPlan, DiffReport, DuplicatePolicy, DuplicateResolver, PatchCoordinator,
    PatchPolicy, SnapshotDiffer,
};
use crate::config::{self, AppConfig};
use crate::error::Error;
use crate::hasher::ChecksumAlgorithm;
use crate::model::Snapshot;
use crate::progress::ProgressReporter;
use crate::scanner::walk::compile_ignore_patterns;
use crate::scanner::{FileFilter, InventoryBuilder, MediaFilter, MediaProbe, PathMode, ScanSummary};
use crate::storage;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// How an existing inventory file is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Create missing inventories, compare against existing ones.
    #[default]
    CreateAndCheck,
    /// Leave directories with an inventory alone.
    CreateOnly,
    /// Compare and ask about each difference.
    Patch,
    /// Overwrite existing inventories without comparing.
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryOutcome {
    /// No inventory existed; one was written.
    Created,
    /// The existing inventory matched.
    Matched,
    /// The inventory was rewritten. `clean` is false when declined changes
    /// were reverted in the written copy.
    Replaced { clean: bool },
    /// Unresolved differences, or an unreadable baseline; nothing written.
    Rejected,
    /// An inventory existed and the mode said to leave it.
    Skipped,
    /// The directory could not be inventoried.
    Failed,
}

impl DirectoryOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, DirectoryOutcome::Rejected | DirectoryOutcome::Failed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            DirectoryOutcome::Created => "created",
            DirectoryOutcome::Matched => "matched",
            DirectoryOutcome::Replaced { clean: true } => "replaced",
            DirectoryOutcome::Replaced { clean: false } => "replaced with fix",
            DirectoryOutcome::Rejected => "differences",
            DirectoryOutcome::Skipped => "skipped",
            DirectoryOutcome::Failed => "exception",
        }
    }
}

impl fmt::Display for DirectoryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug)]
pub struct DirectoryReport {
    pub path: PathBuf,
    pub outcome: DirectoryOutcome,
    /// The freshly built snapshot (after any patching), when one was built.
    pub snapshot: Option<Snapshot>,
    pub diff: Option<DiffReport>,
    pub scan: ScanSummary,
}

#[derive(Debug, Default)]
pub struct TreeSummary {
    pub counts: BTreeMap<&'static str, usize>,
    pub failed_paths: Vec<PathBuf>,
    pub scan: ScanSummary,
    /// Built snapshots keyed on directory, for the duplicate summary.
    pub snapshots: BTreeMap<String, Snapshot>,
}

impl TreeSummary {
    pub fn is_success(&self) -> bool {
        self.failed_paths.is_empty()
    }

    /// Fold the summary of another tree into this one.
    pub fn absorb(&mut self, other: TreeSummary) {
        for (label, count) in other.counts {
            *self.counts.entry(label).or_default() += count;
        }
        self.failed_paths.extend(other.failed_paths);
        self.scan.absorb(other.scan);
        self.snapshots.extend(other.snapshots);
    }

    fn add(&mut self, report: DirectoryReport) {
        *self.counts.entry(report.outcome.label()).or_default() += 1;
        if !report.outcome.is_success() {
            self.failed_paths.push(report.path.clone());
        }
        self.scan.absorb(report.scan);
        if let Some(snapshot) = report.snapshot {
            self.snapshots
                .insert(report.path.to_string_lossy().into_owned(), snapshot);
        }
    }

    pub fn log(&self) {
        for (label, count) in &self.counts {
            info!("  {}: {}", label, count);
        }
        if !self.failed_paths.is_empty() {
            warn!("Directories that need attention:");
            for path in &self.failed_paths {
                warn!("  {}", path.display());
            }
        }
    }
}

/// Drives inventory creation and checking for directories, one inventory
/// file per directory.
pub struct InventoryEngine<'a> {
    config: AppConfig,
    mode: RunMode,
    patch_policy: PatchPolicy,
    confirm: Option<&'a mut dyn Confirm>,
    builder: InventoryBuilder,
    filter: MediaFilter,
}

impl<'a> InventoryEngine<'a> {
    pub fn new(config: AppConfig) -> Result<Self, Error> {
        let algorithm: ChecksumAlgorithm = config.checksum.parse()?;
        let builder = InventoryBuilder::new()
            .with_algorithm(algorithm)
            .recursive(false)
            .single_threaded(config.single_thread)
            .tolerate_races(config.tolerate_races)
            .escape_non_ascii(config.escape_non_ascii)
            .with_path_mode(PathMode::RelativeToRoot)
            .with_ignore_patterns(compile_ignore_patterns(&config.ignore_patterns));
        let filter = MediaFilter::new(&config.inventory_file_name, config.also_non_image_files);
        Ok(Self {
            config,
            mode: RunMode::default(),
            patch_policy: PatchPolicy::default(),
            confirm: None,
            builder,
            filter,
        })
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_patch_policy(mut self, policy: PatchPolicy) -> Self {
        self.patch_policy = policy;
        self
    }

    /// Used for each unsettled difference in `RunMode::Patch`.
    pub fn with_confirm(mut self, confirm: &'a mut dyn Confirm) -> Self {
        self.confirm = Some(confirm);
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn MediaProbe>) -> Self {
        self.builder = self.builder.with_probe(probe);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Inventory one directory (not its subdirectories) and reconcile with
    /// its inventory file. Broken invariants abort with an error; anything
    /// else that goes wrong is a `Failed` outcome.
    pub fn process_directory(
        &mut self,
        dir: &Path,
        reporter: &dyn ProgressReporter,
    ) -> Result<DirectoryReport, Error> {
        info!("Process: {}", dir.display());
        match self.reconcile_directory(dir, reporter) {
            Ok(report) => {
                debug!("'{}': {}", dir.display(), report.outcome);
                Ok(report)
            }
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                error!("Error while processing '{}': {}", dir.display(), err);
                Ok(DirectoryReport {
                    path: dir.to_path_buf(),
                    outcome: DirectoryOutcome::Failed,
                    snapshot: None,
                    diff: None,
                    scan: ScanSummary::default(),
                })
            }
        }
    }

    fn reconcile_directory(
        &mut self,
        dir: &Path,
        reporter: &dyn ProgressReporter,
    ) -> Result<DirectoryReport, Error> {
        let inventory_path = dir.join(&self.config.inventory_file_name);
        let mut report = DirectoryReport {
            path: dir.to_path_buf(),
            outcome: DirectoryOutcome::Skipped,
            snapshot: None,
            diff: None,
            scan: ScanSummary::default(),
        };

        let baseline_exists = inventory_path.is_file();
        if baseline_exists && self.mode == RunMode::CreateOnly {
            return Ok(report);
        }

        let (built, scan) = self.builder.build(dir, &self.filter, reporter)?;
        report.scan = scan;

        if !baseline_exists || self.mode == RunMode::Replace {
            info!("An inventory file will be written.");
            storage::save_snapshot(&inventory_path, &built)?;
            report.outcome = if baseline_exists {
                DirectoryOutcome::Replaced { clean: true }
            } else {
                DirectoryOutcome::Created
            };
            report.snapshot = Some(built);
            return Ok(report);
        }

        info!("An inventory file exists.");
        let mut baseline = match storage::load_snapshot(&inventory_path) {
            Ok(baseline) => baseline,
            Err(err @ Error::PersistedStateCorrupt { .. }) => {
                error!("Failure loading old inventory, unable to compare it to the new one.");
                error!("{}", err);
                report.outcome = DirectoryOutcome::Rejected;
                report.snapshot = Some(built);
                return Ok(report);
            }
            Err(err) => return Err(err),
        };
        // The filter may have changed since the baseline was written.
        let filter = &self.filter;
        baseline.retain(|record| filter.accept(record.file_name()));

        let differ = SnapshotDiffer::new().with_print_limit(self.config.print_limit);
        let mut coordinator =
            PatchCoordinator::new(self.patch_policy.clone()).with_differ(differ);
        if self.mode == RunMode::Patch {
            if let Some(confirm) = self.confirm.as_deref_mut() {
                coordinator = coordinator.interactive(confirm);
            }
        }
        let outcome = coordinator.reconcile(&baseline, &built)?;

        report.outcome = if outcome.identical {
            debug!("An inventory file will not be written because there are no differences.");
            DirectoryOutcome::Matched
        } else if outcome.has_unresolved_problems {
            debug!("An inventory file will not be written because there are unresolved differences.");
            DirectoryOutcome::Rejected
        } else {
            info!("An inventory file will be written.");
            storage::save_snapshot(&inventory_path, &outcome.revised)?;
            DirectoryOutcome::Replaced {
                clean: !outcome.was_patched,
            }
        };
        report.snapshot = Some(outcome.revised);
        report.diff = Some(outcome.report);
        Ok(report)
    }

    /// Process `root`, and with `recursive` every directory below it.
    pub fn process_tree(
        &mut self,
        root: &Path,
        recursive: bool,
        reporter: &dyn ProgressReporter,
    ) -> Result<TreeSummary, Error> {
        let started = Instant::now();
        let mut summary = TreeSummary::default();

        let walker = WalkDir::new(root)
            .max_depth(if recursive { usize::MAX } else { 0 })
            .follow_links(true)
            .sort_by_file_name();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    error!("Error walking '{}': {}", root.display(), err);
                    if let Some(path) = err.path() {
                        summary.failed_paths.push(path.to_path_buf());
                    }
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            let report = self.process_directory(entry.path(), reporter)?;
            summary.add(report);
        }

        debug!(
            "Processed {} directories under '{}' in {:.2}s",
            summary.counts.values().sum::<usize>(),
            root.display(),
            started.elapsed().as_secs_f64()
        );
        Ok(summary)
    }
}

/// Log, per directory, how many records share content with a record
/// elsewhere (in the same directory or another).
pub fn log_duplicate_summary(snapshots: &BTreeMap<String, Snapshot>) {
    let items = duplicates_per_snapshot(snapshots);
    if items.is_empty() {
        info!("No exact duplicate images found.");
        return;
    }
    info!("Duplicate images per directory (files in same or different dir):");
    for (dir, count) in items {
        info!("  {}: {}", dir, count);
    }
}

/// Inventory `roots` with full paths and propose deletions for duplicated
/// content. With `recursive`, roots nested in another root are dropped.
pub fn find_duplicates(
    config: &AppConfig,
    roots: &[PathBuf],
    recursive: bool,
    reporter: &dyn ProgressReporter,
) -> Result<(DeletionPlan, ScanSummary), Error> {
    let algorithm: ChecksumAlgorithm = config.checksum.parse()?;
    let builder = InventoryBuilder::new()
        .with_algorithm(algorithm)
        .recursive(recursive)
        .single_threaded(config.single_thread)
        .tolerate_races(config.tolerate_races)
        .with_path_mode(PathMode::KeepRoot)
        .with_ignore_patterns(compile_ignore_patterns(&config.ignore_patterns));
    let filter = MediaFilter::new(&config.inventory_file_name, config.also_non_image_files);

    let names: Vec<String> = roots
        .iter()
        .map(|r| r.to_string_lossy().into_owned())
        .collect();
    let roots = if recursive {
        config::non_overlapping_directories(names)
    } else {
        let mut names = names;
        names.dedup();
        names
    };
    info!("Processing directories: {:?}", roots);

    let mut scan = ScanSummary::default();
    let mut snapshots = Vec::with_capacity(roots.len());
    for root in &roots {
        let (snapshot, summary) = builder.build(Path::new(root), &filter, reporter)?;
        scan.absorb(summary);
        snapshots.push(snapshot);
    }

    let policy = if config.low_priority_dirs.is_empty() {
        DuplicatePolicy::new()
    } else {
        DuplicatePolicy::new().with_low_priority_dirs(&config.low_priority_dirs)
    };
    let plan = DuplicateResolver::new(policy)
        .with_print_limit(config.print_limit)
        .resolve(&snapshots)?;
    Ok((plan, scan))
}
