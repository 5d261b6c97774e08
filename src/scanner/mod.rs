pub mod builder;
pub mod escape;
pub mod filter;
pub mod summary;
pub mod walk;

pub use builder::{default_worker_count, InventoryBuilder, MediaProbe, NoMediaProbe, PathMode};
pub use filter::{FileFilter, MediaFilter};
pub use summary::ScanSummary;
