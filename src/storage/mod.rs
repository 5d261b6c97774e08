pub mod commands;
pub mod json;
pub mod merge;

pub use commands::write_commands;
pub use json::{load_baseline, load_snapshot, save_snapshot};
pub use merge::{merge_inventories, MergeSummary};
