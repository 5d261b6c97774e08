use super::json::load_snapshot;
use crate::error::Error;
use crate::model::{InventoryRecord, Snapshot};
use crate::scanner::builder::normalize_path;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Default)]
pub struct MergeSummary {
    pub snapshot: Snapshot,
    /// Directories whose inventory file was read.
    pub inventories: Vec<PathBuf>,
    /// Inventory files that existed but could not be read.
    pub read_errors: usize,
}

/// Collect the per-directory inventories under `roots` into one snapshot
/// whose paths carry their directory. With `path_trim`, that leading text is
/// cut from every path and must be present on each.
pub fn merge_inventories(
    roots: &[PathBuf],
    recursive: bool,
    inventory_file_name: &str,
    path_trim: Option<&str>,
) -> Result<MergeSummary, Error> {
    let mut summary = MergeSummary::default();
    let mut merged: Vec<InventoryRecord> = Vec::new();

    for root in roots {
        let walker = WalkDir::new(root)
            .max_depth(if recursive { usize::MAX } else { 0 })
            .sort_by_file_name();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Error while walking '{}': {}", root.display(), err);
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            merge_one(
                entry.path(),
                inventory_file_name,
                path_trim,
                &mut merged,
                &mut summary,
            )?;
        }
    }

    info!(
        "Found {} inventory files containing {} records.",
        summary.inventories.len(),
        merged.len()
    );
    info!(
        "Encountered {} errors loading inventories.",
        summary.read_errors
    );
    summary.snapshot = Snapshot::new(merged)?;
    Ok(summary)
}

fn merge_one(
    dir: &Path,
    inventory_file_name: &str,
    path_trim: Option<&str>,
    merged: &mut Vec<InventoryRecord>,
    summary: &mut MergeSummary,
) -> Result<(), Error> {
    let inventory_path = dir.join(inventory_file_name);
    if !inventory_path.is_file() {
        return Ok(());
    }
    info!("Process path: {}", dir.display());

    let snapshot = match load_snapshot(&inventory_path) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            warn!("Failed to read an inventory file.");
            debug!("'{}': {}", inventory_path.display(), err);
            summary.read_errors += 1;
            return Ok(());
        }
    };
    summary.inventories.push(dir.to_path_buf());

    let prefix = normalize_path(dir);
    for mut record in snapshot.into_records() {
        let mut name = if prefix.is_empty() {
            record.relative_path.clone()
        } else if prefix.ends_with('/') {
            format!("{}{}", prefix, record.relative_path)
        } else {
            format!("{}/{}", prefix, record.relative_path)
        };
        if let Some(trim) = path_trim {
            name = match name.strip_prefix(trim) {
                Some(rest) => rest.to_string(),
                None => return Err(Error::InvalidRecord(format!("Cannot trim: {}", name))),
            };
        }
        record.relative_path = name;
        merged.push(record);
    }
    Ok(())
}
