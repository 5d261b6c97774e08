use super::diff::{DiffReport, Difference, SnapshotDiffer};
use crate::error::Error;
use crate::model::{InventoryRecord, Snapshot};
use crate::scanner::filter::extension_of;
use tracing::{debug, info};

/// Yes/no approval for a single difference.
pub trait Confirm {
    fn confirm(&mut self, question: &str) -> bool;
}

/// Extensions whose appearance or disappearance needs no approval.
#[derive(Debug, Clone, Default)]
pub struct PatchPolicy {
    approve_add: Vec<String>,
    approve_remove: Vec<String>,
}

impl PatchPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extensions are matched case-insensitively, with or without the
    /// leading dot.
    pub fn approve_add<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.approve_add = normalize_extensions(extensions);
        self
    }

    pub fn approve_remove<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.approve_remove = normalize_extensions(extensions);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.approve_add.is_empty() && self.approve_remove.is_empty()
    }

    pub fn add_is_approved(&self, path: &str) -> bool {
        is_approved(path, &self.approve_add)
    }

    pub fn remove_is_approved(&self, path: &str) -> bool {
        is_approved(path, &self.approve_remove)
    }
}

fn normalize_extensions<I, S>(extensions: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    extensions
        .into_iter()
        .map(|ext| ext.as_ref().trim().to_lowercase())
        .filter(|ext| !ext.is_empty())
        .map(|ext| {
            if ext.starts_with('.') {
                ext
            } else {
                format!(".{}", ext)
            }
        })
        .collect()
}

fn is_approved(path: &str, extensions: &[String]) -> bool {
    let name = path.rsplit_once('/').map(|(_, n)| n).unwrap_or(path);
    match extension_of(name) {
        Some(ext) => extensions.contains(&ext),
        None => false,
    }
}

/// Edit to apply to the working copy of the new snapshot.
#[derive(Debug, Clone)]
enum PatchOp {
    Remove(String),
    Add(InventoryRecord),
}

#[derive(Debug, Clone)]
pub struct PatchOutcome {
    pub identical: bool,
    pub has_unresolved_problems: bool,
    /// The new snapshot with declined changes undone.
    pub revised: Snapshot,
    /// True when at least one declined change was applied.
    pub was_patched: bool,
    pub report: DiffReport,
}

/// Runs the differ with approval policy and revises the new snapshot for
/// every declined change.
pub struct PatchCoordinator<'a> {
    policy: PatchPolicy,
    confirm: Option<&'a mut dyn Confirm>,
    differ: SnapshotDiffer,
}

impl<'a> PatchCoordinator<'a> {
    pub fn new(policy: PatchPolicy) -> Self {
        Self {
            policy,
            confirm: None,
            differ: SnapshotDiffer::new(),
        }
    }

    /// Ask `confirm` about every difference the policy does not settle.
    pub fn interactive(mut self, confirm: &'a mut dyn Confirm) -> Self {
        self.confirm = Some(confirm);
        self
    }

    pub fn with_differ(mut self, differ: SnapshotDiffer) -> Self {
        self.differ = differ;
        self
    }

    pub fn reconcile(&mut self, old: &Snapshot, new: &Snapshot) -> Result<PatchOutcome, Error> {
        let mut ops: Vec<PatchOp> = Vec::new();
        let report = if self.confirm.is_none() && self.policy.is_empty() {
            debug!("Patching callback not in use.");
            self.differ.diff(old, new)
        } else {
            debug!("Patching callback to be used.");
            let policy = &self.policy;
            let mut confirm = self.confirm.as_deref_mut();
            self.differ.diff_with(old, new, |difference| {
                decide(policy, confirm.as_deref_mut(), difference, &mut ops)
            })
        };

        let was_patched = !ops.is_empty();
        let revised = if was_patched {
            apply(new, ops)?
        } else {
            new.clone()
        };

        Ok(PatchOutcome {
            identical: report.identical(),
            has_unresolved_problems: report.has_unresolved_problems(),
            revised,
            was_patched,
            report,
        })
    }
}

fn decide(
    policy: &PatchPolicy,
    confirm: Option<&mut (dyn Confirm + '_)>,
    difference: &Difference<'_>,
    ops: &mut Vec<PatchOp>,
) -> bool {
    match *difference {
        Difference::Changed { old, new } => {
            let confirm = match confirm {
                Some(c) => c,
                None => return false,
            };
            info!(
                "Sizes: old {} vs new {}, Checksums: old {} vs new {}.",
                old.size_bytes, new.size_bytes, old.checksum, new.checksum
            );
            if confirm.confirm(&format!(
                "Should we update the inventory entry for file: {}",
                old.relative_path
            )) {
                info!("Change accepted; Should leave the entry in the new inventory.");
            } else {
                debug!("Change rejected; Should replace entry in the new inventory with the old values.");
                ops.push(PatchOp::Remove(new.relative_path.clone()));
                ops.push(PatchOp::Add(old.clone()));
            }
            true
        }
        Difference::Removed(old) => {
            if policy.remove_is_approved(&old.relative_path) {
                return true;
            }
            let confirm = match confirm {
                Some(c) => c,
                None => return false,
            };
            if confirm.confirm(&format!(
                "Should we remove the inventory entry for file: {}",
                old.relative_path
            )) {
                info!("Change accepted; Should leave entry out of the new inventory.");
            } else {
                debug!("Change rejected; Should add entry to new inventory (because it should still be there).");
                ops.push(PatchOp::Add(old.clone()));
            }
            true
        }
        Difference::Added(new) => {
            if policy.add_is_approved(&new.relative_path) {
                return true;
            }
            let confirm = match confirm {
                Some(c) => c,
                None => return false,
            };
            if confirm.confirm(&format!(
                "Should we add an inventory entry for file: {}",
                new.relative_path
            )) {
                info!("Change accepted; Should leave the entry in the new inventory.");
            } else {
                debug!("Change rejected; Should delete entry from the new inventory (because its not supposed to be there).");
                ops.push(PatchOp::Remove(new.relative_path.clone()));
            }
            true
        }
    }
}

/// Removals first, then additions, on a copy of `new`. Sort order is kept by
/// the snapshot itself.
fn apply(new: &Snapshot, ops: Vec<PatchOp>) -> Result<Snapshot, Error> {
    let mut working = new.clone();
    let (removes, adds): (Vec<_>, Vec<_>) = ops
        .into_iter()
        .partition(|op| matches!(op, PatchOp::Remove(_)));

    for op in removes {
        if let PatchOp::Remove(path) = op {
            debug!("Remove from inventory: {}", path);
            working.remove(&path)?;
        }
    }
    for op in adds {
        if let PatchOp::Add(record) = op {
            debug!("Add to inventory: {}", record.relative_path);
            working.insert(record)?;
        }
    }
    Ok(working)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_normalization() {
        let policy = PatchPolicy::new()
            .approve_add(["JPG", ".Png", " "])
            .approve_remove(vec![".tmp".to_string()]);
        assert!(policy.add_is_approved("2005/IMG_1.jpg"));
        assert!(policy.add_is_approved("x.PNG"));
        assert!(!policy.add_is_approved("x.gif"));
        assert!(!policy.add_is_approved("jpg"));
        assert!(policy.remove_is_approved("dir.jpg/a.TMP"));
        assert!(!policy.is_empty());
        assert!(PatchPolicy::new().is_empty());
    }

    #[test]
    fn test_apply_detects_double_add() {
        let new = Snapshot::new(vec![InventoryRecord::new("a", 1, "x")]).unwrap();
        let err = apply(&new, vec![PatchOp::Add(InventoryRecord::new("a", 2, "y"))]).unwrap_err();
        assert!(matches!(err, Error::PatchInconsistency(_)));
        let err = apply(&new, vec![PatchOp::Remove("b".to_string())]).unwrap_err();
        assert!(matches!(err, Error::PatchInconsistency(_)));
    }
}
