use super::dupes::is_safe_path;
use crate::error::Error;
use crate::model::{InventoryRecord, Snapshot};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    /// Make the second location look like the first.
    FirstToSecond,
    /// Make the first location look like the second.
    SecondToFirst,
    /// Copy whatever either side is missing; never remove.
    BothWays,
}

#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    pub direction: SyncDirection,
    pub only_cp: bool,
    pub only_rm: bool,
    pub overwrite_on_conflict: bool,
}

impl SyncOptions {
    pub fn new(direction: SyncDirection) -> Self {
        Self {
            direction,
            only_cp: false,
            only_rm: false,
            overwrite_on_conflict: false,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.direction == SyncDirection::BothWays && (self.only_rm || self.overwrite_on_conflict) {
            return Err(Error::SyncConflict(
                "copying both ways cannot be combined with only-rm or overwrite-on-conflict".to_string(),
            ));
        }
        if self.only_rm && self.overwrite_on_conflict {
            return Err(Error::SyncConflict(
                "only-rm cannot be combined with overwrite-on-conflict".to_string(),
            ));
        }
        Ok(())
    }

    fn copies_to_second(&self) -> bool {
        matches!(self.direction, SyncDirection::FirstToSecond | SyncDirection::BothWays) && !self.only_rm
    }

    fn copies_to_first(&self) -> bool {
        matches!(self.direction, SyncDirection::SecondToFirst | SyncDirection::BothWays) && !self.only_rm
    }
}

/// Existence checks against the locations the commands will run on.
pub trait TargetProbe {
    fn is_file(&self, path: &str) -> bool;
    fn exists(&self, path: &str) -> bool;
}

/// Checks the local filesystem.
pub struct LocalFs;

impl TargetProbe for LocalFs {
    fn is_file(&self, path: &str) -> bool {
        Path::new(path).is_file()
    }

    fn exists(&self, path: &str) -> bool {
        Path::new(path).exists()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub files: usize,
    pub bytes: u64,
}

impl Tally {
    fn add(&mut self, bytes: u64) {
        self.files += 1;
        self.bytes += bytes;
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    pub first_root: String,
    pub second_root: String,
    pub commands: Vec<String>,
    /// Paths present on both sides with different size or checksum.
    pub conflicts: Vec<String>,
    /// Paths left out because they fail the safe-character check.
    pub refused: Vec<String>,
    pub copied_to_second: Tally,
    pub copied_to_first: Tally,
    pub removed_from_first: Tally,
    pub removed_from_second: Tally,
}

/// Longest common prefix of all paths, cut back to the last `/`.
pub fn shared_root(snapshot: &Snapshot) -> String {
    let mut records = snapshot.iter();
    let mut common: &str = match records.next() {
        Some(first) => &first.relative_path,
        None => return String::new(),
    };
    for record in records {
        let len = common
            .char_indices()
            .zip(record.relative_path.chars())
            .find(|((_, a), b)| a != b)
            .map(|((idx, _), _)| idx)
            .unwrap_or_else(|| common.len().min(record.relative_path.len()));
        common = &common[..len];
    }
    match common.rfind('/') {
        Some(idx) => common[..=idx].to_string(),
        None => String::new(),
    }
}

struct Planner<'a> {
    options: SyncOptions,
    probe: &'a dyn TargetProbe,
    dirs_made: BTreeSet<String>,
    plan: SyncPlan,
}

impl<'a> Planner<'a> {
    fn copy(&mut self, from: &str, to: &str, overwrite: bool) -> Result<bool, Error> {
        debug!("Copy: {} --> {}", from, to);
        if !is_safe_path(from) || !is_safe_path(to) {
            warn!("{}", Error::UnsafeDeleteTarget(format!("{} -> {}", from, to)));
            self.plan.refused.push(from.to_string());
            return Ok(false);
        }
        if !self.probe.is_file(from) {
            return Err(Error::SyncConflict(format!("Copy source does not exist: {}", from)));
        }
        if self.probe.exists(to) && !overwrite {
            return Err(Error::SyncConflict(format!("Copy target exists already: {}", to)));
        }
        if let Some((dir, _)) = to.rsplit_once('/') {
            if !dir.is_empty() && !self.dirs_made.contains(dir) && !self.probe.exists(dir) {
                info!("Make dir: {}", dir);
                self.dirs_made.insert(dir.to_string());
                self.plan.commands.push(format!("mkdir -p \"{}\"", dir));
            }
        }
        self.plan.commands.push(format!("cp \"{}\" \"{}\"", from, to));
        Ok(true)
    }

    fn remove(&mut self, path: &str) -> Result<bool, Error> {
        debug!("Remove: {}", path);
        if !is_safe_path(path) {
            warn!("{}", Error::UnsafeDeleteTarget(path.to_string()));
            self.plan.refused.push(path.to_string());
            return Ok(false);
        }
        if !self.probe.is_file(path) {
            return Err(Error::SyncConflict(format!("Removal target does not exist: {}", path)));
        }
        self.plan.commands.push(format!("rm -f \"{}\"", path));
        Ok(true)
    }

    fn first_missing(&mut self, second: &InventoryRecord, relative: &str) -> Result<(), Error> {
        info!("The first location is missing: {}", relative);
        if self.options.copies_to_first() {
            let target = format!("{}{}", self.plan.first_root, relative);
            if self.copy(&second.relative_path, &target, false)? {
                self.plan.copied_to_first.add(second.size_bytes);
            }
        } else if self.options.direction == SyncDirection::FirstToSecond && !self.options.only_cp {
            if self.remove(&second.relative_path)? {
                self.plan.removed_from_second.add(second.size_bytes);
            }
        }
        Ok(())
    }

    fn second_missing(&mut self, first: &InventoryRecord, relative: &str) -> Result<(), Error> {
        info!("The second location is missing: {}", relative);
        if self.options.copies_to_second() {
            let target = format!("{}{}", self.plan.second_root, relative);
            if self.copy(&first.relative_path, &target, false)? {
                self.plan.copied_to_second.add(first.size_bytes);
            }
        } else if self.options.direction == SyncDirection::SecondToFirst && !self.options.only_cp {
            if self.remove(&first.relative_path)? {
                self.plan.removed_from_first.add(first.size_bytes);
            }
        }
        Ok(())
    }

    fn both_present(&mut self, first: &InventoryRecord, second: &InventoryRecord, relative: &str) -> Result<(), Error> {
        if first.size_bytes == second.size_bytes && first.checksum == second.checksum {
            debug!("Approved: {}", relative);
            return Ok(());
        }
        warn!("Files with matching names have different size and/or checksum: {}", relative);
        self.plan.conflicts.push(relative.to_string());
        if !self.options.overwrite_on_conflict || self.options.only_rm {
            return Ok(());
        }
        match self.options.direction {
            SyncDirection::FirstToSecond => {
                if self.copy(&first.relative_path, &second.relative_path, true)? {
                    self.plan.copied_to_second.add(first.size_bytes);
                }
            }
            SyncDirection::SecondToFirst => {
                if self.copy(&second.relative_path, &first.relative_path, true)? {
                    self.plan.copied_to_first.add(second.size_bytes);
                }
            }
            SyncDirection::BothWays => {}
        }
        Ok(())
    }
}

/// Work out the `mkdir -p`, `cp` and `rm -f` lines that would make two
/// locations agree. Paths are compared relative to each side's shared root.
/// Nothing is executed.
pub fn plan_sync(
    first: &Snapshot,
    second: &Snapshot,
    options: SyncOptions,
    probe: &dyn TargetProbe,
) -> Result<SyncPlan, Error> {
    options.validate()?;
    if first.is_empty() || second.is_empty() {
        return Err(Error::SyncConflict(
            "both inventories must contain something".to_string(),
        ));
    }

    let mut planner = Planner {
        options,
        probe,
        dirs_made: BTreeSet::new(),
        plan: SyncPlan {
            first_root: shared_root(first),
            second_root: shared_root(second),
            ..SyncPlan::default()
        },
    };
    info!("The first location has shared root: {}", planner.plan.first_root);
    info!("The second location has shared root: {}", planner.plan.second_root);

    let first_root_len = planner.plan.first_root.len();
    let second_root_len = planner.plan.second_root.len();
    let first = first.records();
    let second = second.records();
    let (mut i, mut j) = (0usize, 0usize);

    while i < first.len() && j < second.len() {
        let a = &first[i];
        let b = &second[j];
        let rel_a = &a.relative_path[first_root_len..];
        let rel_b = &b.relative_path[second_root_len..];
        match rel_a.cmp(rel_b) {
            std::cmp::Ordering::Equal => {
                planner.both_present(a, b, rel_a)?;
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => {
                planner.second_missing(a, rel_a)?;
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                planner.first_missing(b, rel_b)?;
                j += 1;
            }
        }
    }
    for a in &first[i..] {
        planner.second_missing(a, &a.relative_path[first_root_len..])?;
    }
    for b in &second[j..] {
        planner.first_missing(b, &b.relative_path[second_root_len..])?;
    }

    let plan = planner.plan;
    info!(
        "Would cp {} files worth {} bytes from first to second.",
        plan.copied_to_second.files, plan.copied_to_second.bytes
    );
    info!(
        "Would cp {} files worth {} bytes from second to first.",
        plan.copied_to_first.files, plan.copied_to_first.bytes
    );
    info!(
        "Would rm {} files worth {} bytes from first.",
        plan.removed_from_first.files, plan.removed_from_first.bytes
    );
    info!(
        "Would rm {} files worth {} bytes from second.",
        plan.removed_from_second.files, plan.removed_from_second.bytes
    );
    Ok(plan)
}
