use crate::model::{InventoryRecord, Snapshot};
use std::fmt;
use tracing::{debug, error, info, warn};

pub const DEFAULT_PRINT_LIMIT: usize = 5;

/// One path-level difference between an old and a new snapshot.
#[derive(Debug, Clone, Copy)]
pub enum Difference<'a> {
    /// Same path, size or checksum differs.
    Changed {
        old: &'a InventoryRecord,
        new: &'a InventoryRecord,
    },
    /// Only in the new snapshot.
    Added(&'a InventoryRecord),
    /// Only in the old snapshot.
    Removed(&'a InventoryRecord),
}

impl<'a> Difference<'a> {
    pub fn path(&self) -> &'a str {
        match self {
            Difference::Changed { new, .. } => &new.relative_path,
            Difference::Added(new) => &new.relative_path,
            Difference::Removed(old) => &old.relative_path,
        }
    }

    pub fn old(&self) -> Option<&'a InventoryRecord> {
        match self {
            Difference::Changed { old, .. } | Difference::Removed(old) => Some(old),
            Difference::Added(_) => None,
        }
    }

    pub fn new_record(&self) -> Option<&'a InventoryRecord> {
        match self {
            Difference::Changed { new, .. } | Difference::Added(new) => Some(new),
            Difference::Removed(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemKind {
    SizeMismatch,
    ChecksumMismatch,
    ExtraInNew,
    MissingFromNew,
}

/// A difference the callback did not resolve. Indices are cursor positions
/// in the old and new snapshot when it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub kind: ProblemKind,
    pub path: String,
    pub old_index: usize,
    pub new_index: usize,
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (oi, ni) = (self.old_index, self.new_index);
        match self.kind {
            ProblemKind::SizeMismatch => {
                write!(f, "Size mismatch for '{}' (oi={}, ni={}).", self.path, oi, ni)
            }
            ProblemKind::ChecksumMismatch => {
                write!(f, "Checksum mismatch for '{}' (oi={}, ni={}).", self.path, oi, ni)
            }
            ProblemKind::ExtraInNew => write!(
                f,
                "The new inventory contains an extra file '{}' (oi={}, ni={}).",
                self.path, oi, ni
            ),
            ProblemKind::MissingFromNew => write!(
                f,
                "The old inventory contains an extra file '{}' (oi={}, ni={}).",
                self.path, oi, ni
            ),
        }
    }
}

/// Outcome of one merge pass. `changed`, `added` and `removed` list every
/// differing path whether or not it was resolved.
#[derive(Debug, Clone, Default)]
pub struct DiffReport {
    pub changed: Vec<String>,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    /// Paths in `changed` whose size and checksum agree; only capture date or
    /// dimensions moved. Never problems.
    pub metadata_only: Vec<String>,
    pub problems: Vec<Problem>,
    /// The cursors parted at the very start, suggesting different path
    /// prefixes.
    pub prefix_mismatch_suspected: bool,
}

impl DiffReport {
    pub fn total_differences(&self) -> usize {
        self.changed.len() + self.added.len() + self.removed.len()
    }

    pub fn identical(&self) -> bool {
        self.total_differences() == 0
    }

    pub fn has_unresolved_problems(&self) -> bool {
        !self.problems.is_empty()
    }

    fn problems_of(&self, kinds: &[ProblemKind]) -> Vec<&Problem> {
        self.problems
            .iter()
            .filter(|p| kinds.contains(&p.kind))
            .collect()
    }
}

/// Sorted-merge comparison of two path-keyed snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotDiffer {
    print_limit: usize,
}

impl Default for SnapshotDiffer {
    fn default() -> Self {
        Self {
            print_limit: DEFAULT_PRINT_LIMIT,
        }
    }
}

impl SnapshotDiffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_print_limit(mut self, limit: usize) -> Self {
        self.print_limit = limit;
        self
    }

    /// Compare without a resolver: every size/checksum change, addition and
    /// removal is a problem.
    pub fn diff(&self, old: &Snapshot, new: &Snapshot) -> DiffReport {
        self.diff_with(old, new, |_| false)
    }

    /// Compare `old` against `new`, offering each difference to `resolve`.
    /// Returning `true` marks it approved, so it is still counted but not
    /// reported as a problem. Metadata-only changes are not offered.
    pub fn diff_with<F>(&self, old: &Snapshot, new: &Snapshot, mut resolve: F) -> DiffReport
    where
        F: FnMut(&Difference<'_>) -> bool,
    {
        debug!(
            "The lengths of the inventories are (old) {} and (new) {}.",
            old.len(),
            new.len()
        );

        let old = old.records();
        let new = new.records();
        let mut report = DiffReport::default();
        let (mut oi, mut ni) = (0usize, 0usize);

        while oi < old.len() && ni < new.len() {
            let (o, n) = (&old[oi], &new[ni]);
            match o.relative_path.cmp(&n.relative_path) {
                std::cmp::Ordering::Equal => {
                    if o != n {
                        report.changed.push(n.relative_path.clone());
                        if o.same_core(n) {
                            report.metadata_only.push(n.relative_path.clone());
                        } else if !resolve(&Difference::Changed { old: o, new: n }) {
                            let kind = if o.size_bytes != n.size_bytes {
                                ProblemKind::SizeMismatch
                            } else {
                                ProblemKind::ChecksumMismatch
                            };
                            report.problems.push(problem(kind, n, oi, ni));
                        }
                    }
                    oi += 1;
                    ni += 1;
                }
                std::cmp::Ordering::Greater => {
                    self.added(&mut report, &mut resolve, n, oi, ni);
                    ni += 1;
                }
                std::cmp::Ordering::Less => {
                    self.removed(&mut report, &mut resolve, o, oi, ni);
                    oi += 1;
                }
            }
        }

        if (oi == 0 && ni != 0) || (oi != 0 && ni == 0) {
            warn!("Perhaps the directory paths for the inventories do not match.");
            report.prefix_mismatch_suspected = true;
        }

        while ni < new.len() {
            self.added(&mut report, &mut resolve, &new[ni], oi, ni);
            ni += 1;
        }
        while oi < old.len() {
            self.removed(&mut report, &mut resolve, &old[oi], oi, ni);
            oi += 1;
        }

        self.log_report(&report, old.len());
        report
    }

    fn added<F>(
        &self,
        report: &mut DiffReport,
        resolve: &mut F,
        record: &InventoryRecord,
        oi: usize,
        ni: usize,
    ) where
        F: FnMut(&Difference<'_>) -> bool,
    {
        report.added.push(record.relative_path.clone());
        if !resolve(&Difference::Added(record)) {
            report
                .problems
                .push(problem(ProblemKind::ExtraInNew, record, oi, ni));
        }
    }

    fn removed<F>(
        &self,
        report: &mut DiffReport,
        resolve: &mut F,
        record: &InventoryRecord,
        oi: usize,
        ni: usize,
    ) where
        F: FnMut(&Difference<'_>) -> bool,
    {
        report.removed.push(record.relative_path.clone());
        if !resolve(&Difference::Removed(record)) {
            report
                .problems
                .push(problem(ProblemKind::MissingFromNew, record, oi, ni));
        }
    }

    fn log_report(&self, report: &DiffReport, compared: usize) {
        let categories = [
            report.problems_of(&[ProblemKind::SizeMismatch, ProblemKind::ChecksumMismatch]),
            report.problems_of(&[ProblemKind::ExtraInNew]),
            report.problems_of(&[ProblemKind::MissingFromNew]),
        ];

        let mut truncated = false;
        for problems in categories.iter() {
            for p in problems.iter().take(self.print_limit) {
                warn!("{}", p);
            }
            truncated |= problems.len() > self.print_limit;
        }
        if truncated {
            error!(
                "Not all differences have been logged due to a log-limit {} per type of difference.",
                self.print_limit
            );
        }

        let total = report.total_differences();
        if total == 0 {
            info!("The two inventories match (checked {} files).", compared);
        } else if report.has_unresolved_problems() {
            error!("The two inventories do not match ({} differences).", total);
        } else {
            info!(
                "The two inventories do not match ({} differences) but the changes were OK.",
                total
            );
        }
    }
}

fn problem(kind: ProblemKind, record: &InventoryRecord, oi: usize, ni: usize) -> Problem {
    Problem {
        kind,
        path: record.relative_path.clone(),
        old_index: oi,
        new_index: ni,
    }
}
