use std::collections::{BTreeMap, BTreeSet, VecDeque};

use inventory_keeper::analysis::dupes::{duplicates_per_snapshot, group_by_content};
use inventory_keeper::analysis::{
    plan_sync, Confirm, DuplicatePolicy, DuplicateResolver, PatchCoordinator, PatchPolicy,
    ProblemKind, SnapshotDiffer, SyncDirection, SyncOptions, TargetProbe, TiePolicy,
};
use inventory_keeper::model::{CaptureDate, MediaInfo};
use inventory_keeper::{Error, InventoryRecord, Snapshot};

fn snap(records: &[(&str, u64, &str)]) -> Snapshot {
    Snapshot::new(
        records
            .iter()
            .map(|(p, s, c)| InventoryRecord::new(*p, *s, *c))
            .collect(),
    )
    .unwrap()
}

/// Answers questions from a script and remembers what was asked.
struct Scripted {
    answers: VecDeque<bool>,
    asked: Vec<String>,
}

impl Scripted {
    fn new(answers: &[bool]) -> Self {
        Self {
            answers: answers.iter().copied().collect(),
            asked: Vec::new(),
        }
    }
}

impl Confirm for Scripted {
    fn confirm(&mut self, question: &str) -> bool {
        self.asked.push(question.to_string());
        self.answers.pop_front().unwrap_or(false)
    }
}

#[test]
fn test_diff_against_itself_is_identical() {
    let s = snap(&[("a.jpg", 1, "x"), ("b/c.jpg", 2, "y"), ("d.jpg", 3, "z")]);
    let report = SnapshotDiffer::new().diff(&s, &s);
    assert!(report.identical());
    assert!(!report.has_unresolved_problems());
    assert!(report.changed.is_empty() && report.added.is_empty() && report.removed.is_empty());
    assert!(!report.prefix_mismatch_suspected);
}

#[test]
fn test_diff_single_addition() {
    let old = snap(&[("a.jpg", 100, "c1")]);
    let new = snap(&[("a.jpg", 100, "c1"), ("b.jpg", 50, "c2")]);
    let report = SnapshotDiffer::new().diff(&old, &new);
    assert_eq!(report.added, vec!["b.jpg"]);
    assert!(report.changed.is_empty());
    assert!(report.removed.is_empty());
    assert!(!report.identical());
    assert!(report.has_unresolved_problems());
    assert_eq!(report.problems[0].kind, ProblemKind::ExtraInNew);
}

#[test]
fn test_diff_partitions_symmetric_difference() {
    let old = snap(&[
        ("a", 1, "x"),
        ("b", 2, "x"),
        ("c", 3, "x"),
        ("e", 5, "x"),
        ("g", 7, "x"),
    ]);
    let new = snap(&[
        ("a", 1, "x"),
        ("b", 2, "CHANGED"),
        ("d", 4, "x"),
        ("e", 50, "x"),
        ("f", 6, "x"),
        ("h", 8, "x"),
    ]);
    let report = SnapshotDiffer::new().diff(&old, &new);

    let old_paths: BTreeSet<&str> = old.iter().map(|r| r.relative_path.as_str()).collect();
    let new_paths: BTreeSet<&str> = new.iter().map(|r| r.relative_path.as_str()).collect();
    let only_one = old_paths.symmetric_difference(&new_paths).count();
    let changed_in_both = old
        .iter()
        .filter(|o| new.get(&o.relative_path).map_or(false, |n| n != *o))
        .count();
    assert_eq!(report.total_differences(), only_one + changed_in_both);

    let mut seen: Vec<&String> = report
        .changed
        .iter()
        .chain(&report.added)
        .chain(&report.removed)
        .collect();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), report.total_differences());

    assert_eq!(report.changed, vec!["b", "e"]);
    assert_eq!(report.added, vec!["d", "f", "h"]);
    assert_eq!(report.removed, vec!["c", "g"]);
    let kinds: Vec<ProblemKind> = report.problems.iter().map(|p| p.kind).collect();
    assert!(kinds.contains(&ProblemKind::ChecksumMismatch));
    assert!(kinds.contains(&ProblemKind::SizeMismatch));
}

#[test]
fn test_metadata_only_change_is_not_a_problem() {
    let old = snap(&[("a.jpg", 1, "x")]);
    let date = CaptureDate::parse("2005-06-07 08:09:10");
    let new = Snapshot::new(vec![
        InventoryRecord::new("a.jpg", 1, "x").with_media(MediaInfo::new(date, None)),
    ])
    .unwrap();
    let report = SnapshotDiffer::new().diff(&old, &new);
    assert_eq!(report.changed, vec!["a.jpg"]);
    assert_eq!(report.metadata_only, vec!["a.jpg"]);
    assert!(!report.identical());
    assert!(!report.has_unresolved_problems());
}

#[test]
fn test_content_key_ignores_path() {
    let a = InventoryRecord::new("one/IMG_0001.JPG", 42, "abcd");
    let b = InventoryRecord::new("two/holiday.jpg", 42, "abcd");
    assert_eq!(a.content_key(), b.content_key());
}

#[test]
fn test_pre_approved_addition_resolves_without_patching() {
    let old = snap(&[("a.jpg", 100, "c1")]);
    let new = snap(&[("a.jpg", 100, "c1"), ("b.jpg", 50, "c2")]);
    let mut coordinator = PatchCoordinator::new(PatchPolicy::new().approve_add(["jpg"]));
    let outcome = coordinator.reconcile(&old, &new).unwrap();
    assert!(!outcome.identical);
    assert!(!outcome.has_unresolved_problems);
    assert!(!outcome.was_patched);
    assert_eq!(outcome.revised, new);
}

#[test]
fn test_declined_changes_are_reverted() {
    let old = snap(&[("changed.jpg", 1, "old"), ("gone.jpg", 2, "g"), ("keep.jpg", 3, "k")]);
    let new = snap(&[("changed.jpg", 9, "new"), ("extra.jpg", 4, "e"), ("keep.jpg", 3, "k")]);

    // Order of questions follows the merge: changed, extra, gone.
    let mut confirm = Scripted::new(&[false, false, false]);
    let outcome = PatchCoordinator::new(PatchPolicy::new())
        .interactive(&mut confirm)
        .reconcile(&old, &new)
        .unwrap();

    assert_eq!(confirm.asked.len(), 3);
    assert!(confirm.asked[0].contains("changed.jpg"));
    assert!(outcome.was_patched);
    assert!(!outcome.has_unresolved_problems);
    assert_eq!(outcome.revised, old);
}

#[test]
fn test_accepted_changes_keep_new_snapshot() {
    let old = snap(&[("a.jpg", 1, "old"), ("gone.jpg", 2, "g")]);
    let new = snap(&[("a.jpg", 9, "new"), ("b.jpg", 4, "e")]);
    let mut confirm = Scripted::new(&[true, true, true]);
    let outcome = PatchCoordinator::new(PatchPolicy::new())
        .interactive(&mut confirm)
        .reconcile(&old, &new)
        .unwrap();
    assert!(!outcome.was_patched);
    assert!(!outcome.has_unresolved_problems);
    assert_eq!(outcome.revised, new);
}

#[test]
fn test_changes_unresolved_without_confirmation() {
    let old = snap(&[("a.jpg", 1, "old"), ("gone.tmp", 2, "g")]);
    let new = snap(&[("a.jpg", 9, "new")]);
    let mut coordinator = PatchCoordinator::new(PatchPolicy::new().approve_remove([".tmp"]));
    let outcome = coordinator.reconcile(&old, &new).unwrap();
    assert!(outcome.has_unresolved_problems);
    assert_eq!(outcome.report.problems.len(), 1);
    assert_eq!(outcome.report.problems[0].path, "a.jpg");
}

#[test]
fn test_lowercase_camera_name_is_deleted() {
    let s = snap(&[("/p/img_0001.jpg", 10, "c"), ("/q/IMG_0001.JPG", 10, "c")]);
    let plan = DuplicateResolver::new(DuplicatePolicy::new()).resolve(&[s]).unwrap();
    assert_eq!(plan.commands, vec!["rm -f \"/p/img_0001.jpg\""]);
    assert!(plan.ambiguous.is_empty());
}

#[test]
fn test_tied_best_score_is_ambiguous() {
    let s = snap(&[("/p/vacation.jpg", 10, "c"), ("/p/vacation (1).jpg", 10, "c")]);
    let plan = DuplicateResolver::new(DuplicatePolicy::new()).resolve(&[s]).unwrap();
    assert!(plan.commands.is_empty());
    assert!(plan.candidates.is_empty());
    assert_eq!(plan.ambiguous.len(), 1);
    assert_eq!(plan.ambiguous[0].members.len(), 2);
}

#[test]
fn test_three_copies_give_two_deletions() {
    let s = snap(&[
        ("/a/img_1.jpg", 5, "dup"),
        ("/b/IMG_1.JPG", 5, "dup"),
        ("/c/birthday.jpg", 5, "dup"),
        ("/d/single.jpg", 6, "u1"),
        ("/e/other.jpg", 7, "u2"),
    ]);
    let plan = DuplicateResolver::new(DuplicatePolicy::new()).resolve(&[s]).unwrap();
    assert_eq!(plan.groups.len(), 1);
    assert_eq!(plan.commands.len(), 2);
    assert!(plan.commands.iter().all(|c| !c.contains("birthday")));
    assert_eq!(plan.bytes_reclaimable, 10);
}

#[test]
fn test_unsafe_path_is_refused() {
    let s = snap(&[
        ("/x/$(rm -rf /)/img_1.jpg", 5, "c"),
        ("/y/IMG_1.JPG", 5, "c"),
        ("/z/img_2.jpg", 6, "d"),
        ("/z/IMG_2.JPG", 6, "d"),
    ]);
    let plan = DuplicateResolver::new(DuplicatePolicy::new()).resolve(&[s]).unwrap();
    assert_eq!(plan.candidates.len(), 2);
    assert_eq!(plan.refused, vec!["/x/$(rm -rf /)/img_1.jpg"]);
    assert_eq!(plan.commands, vec!["rm -f \"/z/img_2.jpg\""]);
    assert!(plan.commands.iter().all(|c| !c.contains("$(")));
}

#[test]
fn test_low_priority_dir_deletes_below_max_even_with_ties() {
    let s = snap(&[
        ("/inbox/a.jpg", 5, "c"),
        ("/albums/x.jpg", 5, "c"),
        ("/albums/y.jpg", 5, "c"),
    ]);
    let plan = DuplicateResolver::new(DuplicatePolicy::new().with_low_priority_dirs(["/inbox/"]))
        .resolve(&[s.clone()])
        .unwrap();
    assert_eq!(plan.commands, vec!["rm -f \"/inbox/a.jpg\""]);
    assert_eq!(plan.ambiguous.len(), 1);

    let keep_all = DuplicatePolicy::new()
        .with_low_priority_dirs(["/inbox/"])
        .with_tie_policy(TiePolicy::KeepAll);
    let plan = DuplicateResolver::new(keep_all).resolve(&[s]).unwrap();
    assert!(plan.commands.is_empty());
}

#[test]
fn test_resolver_merges_snapshots_and_skips_unhashed() {
    let first = snap(&[("/a/img_1.jpg", 5, "c"), ("/a/nohash.jpg", 9, "")]);
    let second = snap(&[("/b/IMG_1.JPG", 5, "c"), ("/b/nohash2.jpg", 9, "")]);
    let again = first.clone();
    let groups = group_by_content(&[first.clone(), second.clone(), again.clone()]);
    assert_eq!(groups.len(), 1);

    let plan = DuplicateResolver::new(DuplicatePolicy::new())
        .resolve(&[first, second, again])
        .unwrap();
    assert_eq!(plan.commands, vec!["rm -f \"/a/img_1.jpg\""]);
}

#[test]
fn test_duplicates_per_snapshot() {
    let mut snapshots = BTreeMap::new();
    snapshots.insert("one".to_string(), snap(&[("a", 1, "x"), ("b", 1, "x"), ("c", 2, "y")]));
    snapshots.insert("two".to_string(), snap(&[("d", 2, "y"), ("e", 3, "z")]));
    snapshots.insert("three".to_string(), snap(&[("f", 4, "w")]));
    let counts = duplicates_per_snapshot(&snapshots);
    assert_eq!(counts, vec![("one".to_string(), 3), ("two".to_string(), 1)]);
}

struct FakeFs {
    files: BTreeSet<String>,
    dirs: BTreeSet<String>,
}

impl FakeFs {
    fn new(files: &[&str], dirs: &[&str]) -> Self {
        Self {
            files: files.iter().map(|s| s.to_string()).collect(),
            dirs: dirs.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl TargetProbe for FakeFs {
    fn is_file(&self, path: &str) -> bool {
        self.files.contains(path)
    }

    fn exists(&self, path: &str) -> bool {
        self.files.contains(path) || self.dirs.contains(path)
    }
}

#[test]
fn test_sync_first_to_second() {
    let first = snap(&[("/one/a.jpg", 1, "a"), ("/one/sub/b.jpg", 2, "b")]);
    let second = snap(&[("/two/a.jpg", 1, "a"), ("/two/c.jpg", 3, "c")]);
    let fs = FakeFs::new(&["/one/a.jpg", "/one/sub/b.jpg", "/two/a.jpg", "/two/c.jpg"], &["/two"]);

    let plan = plan_sync(&first, &second, SyncOptions::new(SyncDirection::FirstToSecond), &fs).unwrap();
    assert_eq!(plan.first_root, "/one/");
    assert_eq!(plan.second_root, "/two/");
    assert_eq!(
        plan.commands,
        vec![
            "rm -f \"/two/c.jpg\"",
            "mkdir -p \"/two/sub\"",
            "cp \"/one/sub/b.jpg\" \"/two/sub/b.jpg\"",
        ]
    );
    assert_eq!(plan.copied_to_second.bytes, 2);
    assert_eq!(plan.removed_from_second.files, 1);
}

#[test]
fn test_sync_both_ways_handles_tails() {
    let first = snap(&[("/one/a.jpg", 1, "a"), ("/one/z.jpg", 9, "z")]);
    let second = snap(&[("/two/a.jpg", 1, "a"), ("/two/m.jpg", 5, "m")]);
    let fs = FakeFs::new(&["/one/a.jpg", "/one/z.jpg", "/two/a.jpg", "/two/m.jpg"], &["/one", "/two"]);

    let plan = plan_sync(&first, &second, SyncOptions::new(SyncDirection::BothWays), &fs).unwrap();
    assert_eq!(
        plan.commands,
        vec![
            "cp \"/two/m.jpg\" \"/one/m.jpg\"",
            "cp \"/one/z.jpg\" \"/two/z.jpg\"",
        ]
    );
}

#[test]
fn test_sync_missing_source_is_a_conflict() {
    let first = snap(&[("/one/a.jpg", 1, "a"), ("/one/b.jpg", 1, "b")]);
    let second = snap(&[("/two/a.jpg", 1, "a"), ("/two/x.jpg", 1, "x")]);
    let fs = FakeFs::new(&["/one/a.jpg", "/two/a.jpg", "/two/x.jpg"], &["/two"]);
    let err = plan_sync(&first, &second, SyncOptions::new(SyncDirection::FirstToSecond), &fs)
        .unwrap_err();
    assert!(matches!(err, Error::SyncConflict(_)));
}

#[test]
fn test_sync_overwrite_on_conflict() {
    let first = snap(&[("/one/a.jpg", 1, "new"), ("/one/b.jpg", 1, "b")]);
    let second = snap(&[("/two/a.jpg", 1, "old"), ("/two/b.jpg", 1, "b")]);
    let fs = FakeFs::new(&["/one/a.jpg", "/one/b.jpg", "/two/a.jpg", "/two/b.jpg"], &["/two"]);
    let mut options = SyncOptions::new(SyncDirection::FirstToSecond);
    options.overwrite_on_conflict = true;
    let plan = plan_sync(&first, &second, options, &fs).unwrap();
    assert_eq!(plan.conflicts, vec!["a.jpg"]);
    assert_eq!(plan.commands, vec!["cp \"/one/a.jpg\" \"/two/a.jpg\""]);
}
