pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod model;
pub mod progress;
pub mod scanner;
pub mod storage;

pub use config::AppConfig;
pub use engine::{DirectoryOutcome, InventoryEngine, RunMode, TreeSummary};
pub use error::Error;
pub use model::{InventoryRecord, Snapshot};
pub use progress::{ProgressReporter, SilentReporter};
