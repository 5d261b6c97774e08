pub mod diff;
pub mod dupes;
pub mod patch;
pub mod sync_plan;

pub use diff::{DiffReport, Difference, Problem, ProblemKind, SnapshotDiffer};
pub use dupes::{DeletionPlan, DuplicateGroup, DuplicatePolicy, DuplicateResolver, TiePolicy};
pub use patch::{Confirm, PatchCoordinator, PatchOutcome, PatchPolicy};
pub use sync_plan::{plan_sync, LocalFs, SyncDirection, SyncOptions, SyncPlan, TargetProbe};
