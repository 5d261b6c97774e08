use crate::error::Error;
use crate::hasher::NO_CHECKSUM;
use crate::model::{ContentKey, Snapshot};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

lazy_static! {
    static ref CAMERA_NAME_LOWER: Regex = Regex::new(r"^(img|mvi)_\d+\.(jpg|avi)$").unwrap();
    static ref CAMERA_NAME_UPPER: Regex = Regex::new(r"^(IMG|MVI)_\d+\.(JPG|AVI)$").unwrap();
    static ref CAMERA_NAME_MIXED: Regex = Regex::new(r"^(IMG|MVI)_\d+\.(jpg|avi)$").unwrap();
    static ref SAFE_PATH: Regex = Regex::new(r"^[\w /:.-]+$").unwrap();
}

/// Score for files in a low-priority directory; always deletable.
pub const LOW_PRIORITY_SCORE: u8 = 0;
/// Score for names that look deliberately chosen.
pub const RENAMED_SCORE: u8 = 4;

/// What to do when several copies share the best score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TiePolicy {
    /// Delete nothing from the group.
    #[default]
    KeepAll,
    /// Keep every best-scoring copy, delete the rest.
    DeleteBelowMax,
}

#[derive(Debug, Clone, Default)]
pub struct DuplicatePolicy {
    low_priority_dirs: BTreeSet<String>,
    ties: TiePolicy,
}

impl DuplicatePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files directly inside these directories score `LOW_PRIORITY_SCORE`.
    /// Selects `TiePolicy::DeleteBelowMax`.
    pub fn with_low_priority_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.low_priority_dirs = dirs
            .into_iter()
            .map(|d| trim_dir(d.as_ref()).to_string())
            .collect();
        self.ties = TiePolicy::DeleteBelowMax;
        self
    }

    pub fn with_tie_policy(mut self, ties: TiePolicy) -> Self {
        self.ties = ties;
        self
    }

    pub fn tie_policy(&self) -> TiePolicy {
        self.ties
    }

    /// Rank how likely a path's file name is to have been chosen by a person.
    /// Higher is more worth keeping.
    pub fn score(&self, path: &str) -> u8 {
        let (dir, name) = split_path(path);
        if !self.low_priority_dirs.is_empty() && self.low_priority_dirs.contains(trim_dir(dir)) {
            return LOW_PRIORITY_SCORE;
        }
        desirability_score(name)
    }
}

fn trim_dir(dir: &str) -> &str {
    let trimmed = dir.trim_end_matches('/');
    if trimmed.is_empty() && dir.starts_with('/') {
        "/"
    } else {
        trimmed
    }
}

fn split_path(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some(("", name)) => ("/", name),
        Some((dir, name)) => (dir, name),
        None => ("", path),
    }
}

/// Score a bare file name: camera defaults score low, anything else
/// `RENAMED_SCORE`.
pub fn desirability_score(file_name: &str) -> u8 {
    if CAMERA_NAME_LOWER.is_match(file_name) {
        1
    } else if CAMERA_NAME_UPPER.is_match(file_name) {
        2
    } else if CAMERA_NAME_MIXED.is_match(file_name) {
        3
    } else {
        RENAMED_SCORE
    }
}

/// True when the path only holds word characters, space, `/`, `:`, `.`, `-`
/// and can be quoted into a shell command as-is.
pub fn is_safe_path(path: &str) -> bool {
    SAFE_PATH.is_match(path)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredPath {
    pub path: String,
    pub score: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub key: ContentKey,
    pub members: Vec<ScoredPath>,
}

impl DuplicateGroup {
    pub fn max_score(&self) -> u8 {
        self.members.iter().map(|m| m.score).max().unwrap_or(0)
    }

    pub fn best_count(&self) -> usize {
        let max = self.max_score();
        self.members.iter().filter(|m| m.score == max).count()
    }

    pub fn is_ambiguous(&self) -> bool {
        self.best_count() != 1
    }
}

/// Proposed clean-up for one run. Nothing here has been executed.
#[derive(Debug, Clone, Default)]
pub struct DeletionPlan {
    pub groups: Vec<DuplicateGroup>,
    /// Groups without a single best copy.
    pub ambiguous: Vec<DuplicateGroup>,
    /// Paths chosen for deletion, before the safety check.
    pub candidates: Vec<String>,
    /// `rm -f "<path>"` lines for candidates that passed the safety check.
    pub commands: Vec<String>,
    /// Candidates refused by the safety check.
    pub refused: Vec<String>,
    pub distinct_contents: usize,
    pub bytes_reclaimable: u64,
}

/// Group records by content across snapshots. Groups come back in key order,
/// members in path order. Records without a checksum are skipped.
pub fn group_by_content(snapshots: &[Snapshot]) -> BTreeMap<ContentKey, BTreeSet<String>> {
    let mut groups: BTreeMap<ContentKey, BTreeSet<String>> = BTreeMap::new();
    let mut unhashed = 0usize;
    for snapshot in snapshots {
        for record in snapshot {
            if record.checksum == NO_CHECKSUM {
                unhashed += 1;
                continue;
            }
            groups
                .entry(record.content_key())
                .or_default()
                .insert(record.relative_path.clone());
        }
    }
    if unhashed > 0 {
        warn!(
            "{} records have no checksum and were left out of duplicate detection.",
            unhashed
        );
    }
    groups
}

pub struct DuplicateResolver {
    policy: DuplicatePolicy,
    print_limit: usize,
}

impl DuplicateResolver {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            policy,
            print_limit: usize::MAX,
        }
    }

    /// Cap the per-group member listing in the log.
    pub fn with_print_limit(mut self, limit: usize) -> Self {
        self.print_limit = limit;
        self
    }

    pub fn resolve(&self, snapshots: &[Snapshot]) -> Result<DeletionPlan, Error> {
        let by_content = group_by_content(snapshots);
        let record_count: usize = by_content.values().map(|paths| paths.len()).sum();
        let mut plan = DeletionPlan {
            distinct_contents: by_content.len(),
            ..DeletionPlan::default()
        };

        for (key, paths) in by_content {
            if paths.len() < 2 {
                continue;
            }
            let members = paths
                .into_iter()
                .map(|path| ScoredPath {
                    score: self.policy.score(&path),
                    path,
                })
                .collect();
            plan.groups.push(DuplicateGroup { key, members });
        }
        info!(
            "Have {} distinct files, {} duplicated ({} records).",
            plan.distinct_contents,
            plan.groups.len(),
            record_count
        );

        let mut expected = 0usize;
        for group in &plan.groups {
            let max = group.max_score();
            let best = group.best_count();
            let deletable = if best == 1 {
                info!("Overlapping paths (with one superior choice):");
                true
            } else {
                info!("Overlapping paths (with unclear best choice):");
                info!(
                    "{}",
                    Error::AmbiguousDuplicateGroup {
                        size: group.key.size,
                        checksum: group.key.checksum.clone(),
                        members: group.members.len(),
                    }
                );
                self.policy.ties == TiePolicy::DeleteBelowMax
            };

            for member in group.members.iter().take(self.print_limit) {
                info!("  {} (score {})", member.path, member.score);
            }
            if group.members.len() > self.print_limit {
                info!("  ... and {} more", group.members.len() - self.print_limit);
            }

            if best != 1 {
                plan.ambiguous.push(group.clone());
            }
            if !deletable {
                continue;
            }

            expected += group.members.len() - best;
            for member in &group.members {
                if member.score < max {
                    plan.candidates.push(member.path.clone());
                    plan.bytes_reclaimable += group.key.size;
                }
            }
        }

        if !plan.groups.is_empty() {
            let sizes: Vec<String> = plan.groups.iter().map(|g| g.members.len().to_string()).collect();
            info!("Files per id: {}", sizes.join(","));
        } else {
            info!("No dupes to report on.");
        }
        info!("We should delete {} paths.", expected);
        info!("The length of the delete list is {} items.", plan.candidates.len());
        if expected != plan.candidates.len() {
            return Err(Error::ReconciliationMismatch {
                context: "deletion candidates",
                expected,
                actual: plan.candidates.len(),
            });
        }

        for path in &plan.candidates {
            if is_safe_path(path) {
                plan.commands.push(format!("rm -f \"{}\"", path));
            } else {
                warn!("{}", Error::UnsafeDeleteTarget(path.clone()));
                plan.refused.push(path.clone());
            }
        }
        if plan.commands.len() + plan.refused.len() != plan.candidates.len() {
            return Err(Error::ReconciliationMismatch {
                context: "deletion commands",
                expected: plan.candidates.len(),
                actual: plan.commands.len() + plan.refused.len(),
            });
        }

        Ok(plan)
    }
}

/// For each named snapshot, how many of its records share content with some
/// other record (in the same or another snapshot). Sorted by count, highest
/// first; snapshots without duplicates are left out.
pub fn duplicates_per_snapshot(snapshots: &BTreeMap<String, Snapshot>) -> Vec<(String, usize)> {
    let mut owners: BTreeMap<ContentKey, Vec<&str>> = BTreeMap::new();
    for (name, snapshot) in snapshots {
        for record in snapshot {
            if record.checksum == NO_CHECKSUM {
                continue;
            }
            owners.entry(record.content_key()).or_default().push(name);
        }
    }

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for names in owners.values().filter(|names| names.len() > 1) {
        for name in names {
            *counts.entry(name).or_default() += 1;
        }
    }

    let mut items: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(name, count)| (name.to_string(), count))
        .collect();
    items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    items
}
