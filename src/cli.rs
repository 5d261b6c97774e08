use clap::{ArgGroup, Args, Parser, Subcommand};
use inventory_keeper::analysis::SyncDirection;
use inventory_keeper::RunMode;

#[derive(Debug, Parser)]
#[command(name = "inventory-keeper")]
#[command(about = "Keep per-directory file inventories and find duplicates", long_about = None)]
pub struct Cli {
    /// Log file path (overrides LOG_FILE_PATH)
    #[arg(long, global = true, value_name = "PATH")]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create or verify the inventory file of each directory
    Inventory(InventoryArgs),
    /// Write commands that would remove duplicate files
    Dedupe(DedupeArgs),
    /// Combine per-directory inventories into one
    Merge(MergeArgs),
    /// Write commands that would sync two merged inventories
    Sync(SyncArgs),
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Args)]
#[command(group(
    ArgGroup::new("mode")
        .args(["create_only", "create_and_check", "patch", "replace_inventory_files"])
        .multiple(false)
))]
pub struct InventoryArgs {
    /// Also process every directory below the given ones
    #[arg(long)]
    pub recursive: bool,
    /// Only create missing inventory files (default: create and check)
    #[arg(long)]
    pub create_only: bool,
    /// Create missing inventory files and compare existing ones
    #[arg(long)]
    pub create_and_check: bool,
    /// Compare existing inventory files and ask about each difference
    #[arg(long)]
    pub patch: bool,
    /// Overwrite existing inventory files without comparing
    #[arg(long)]
    pub replace_inventory_files: bool,
    /// Comma separated extensions whose new files need no approval
    #[arg(long, value_name = "EXTS")]
    pub patch_approve_add: Option<String>,
    /// Comma separated extensions whose missing files need no approval
    #[arg(long, value_name = "EXTS")]
    pub patch_approve_remove: Option<String>,
    #[command(flatten)]
    pub scan: ScanArgs,
    /// Directories to process (glob patterns allowed)
    #[arg(value_name = "DIR")]
    pub directories: Vec<String>,
}

impl InventoryArgs {
    pub fn mode(&self) -> RunMode {
        if self.create_only {
            RunMode::CreateOnly
        } else if self.patch {
            RunMode::Patch
        } else if self.replace_inventory_files {
            RunMode::Replace
        } else {
            RunMode::CreateAndCheck
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let approving = self.patch_approve_add.is_some() || self.patch_approve_remove.is_some();
        if approving && !matches!(self.mode(), RunMode::CreateAndCheck | RunMode::Patch) {
            return Err(
                "--patch-approve-add/--patch-approve-remove need --create-and-check or --patch"
                    .to_string(),
            );
        }
        Ok(())
    }
}

/// Lower-cased, trimmed items of a comma separated list.
pub fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Flags shared by commands that build inventories. Unset flags fall back to
/// the configuration.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Inventory almost any file, not just common media formats
    #[arg(long)]
    pub also_non_image_files: bool,
    /// Identify files on one thread
    #[arg(long)]
    pub single_thread: bool,
    /// Leave out files that disappear during the scan instead of failing
    #[arg(long)]
    pub tolerate_races: bool,
    /// Checksum algorithm: sha256, crc32, md5 or none
    #[arg(long, value_name = "ALGO")]
    pub checksum: Option<String>,
    /// Name of the per-directory inventory file
    #[arg(long, value_name = "NAME")]
    pub inventory_file_name: Option<String>,
}

#[derive(Debug, Args)]
pub struct DedupeArgs {
    /// Include every directory below the given ones
    #[arg(long)]
    pub recursive: bool,
    /// File to write delete commands to
    #[arg(long, value_name = "NAME")]
    pub delete_command_file: Option<String>,
    /// Files directly in this directory are always deleted first (repeatable)
    #[arg(long = "low-priority-dir", value_name = "DIR")]
    pub low_priority_dirs: Vec<String>,
    #[command(flatten)]
    pub scan: ScanArgs,
    /// Directories to process (glob patterns allowed)
    #[arg(value_name = "DIR")]
    pub directories: Vec<String>,
}

#[derive(Debug, Args)]
pub struct MergeArgs {
    /// Look for inventory files in every directory below the given ones
    #[arg(long)]
    pub recursive: bool,
    /// File to write the merged inventory to
    #[arg(long, value_name = "NAME")]
    pub merged_inventory: Option<String>,
    /// Leading text to remove from every merged path
    #[arg(long, value_name = "PATH")]
    pub path_trim: Option<String>,
    /// Name of the per-directory inventory file
    #[arg(long, value_name = "NAME")]
    pub inventory_file_name: Option<String>,
    /// Directories to process (glob patterns allowed)
    #[arg(value_name = "DIR")]
    pub directories: Vec<String>,
}

#[derive(Debug, Args)]
#[command(group(
    ArgGroup::new("direction")
        .args(["first_to_second", "second_to_first", "cp_both_ways"])
        .required(true)
        .multiple(false)
))]
pub struct SyncArgs {
    /// Make the second location look like the first
    #[arg(long)]
    pub first_to_second: bool,
    /// Make the first location look like the second
    #[arg(long)]
    pub second_to_first: bool,
    /// Copy files to whichever side is missing them
    #[arg(long)]
    pub cp_both_ways: bool,
    /// Only write cp commands
    #[arg(long)]
    pub only_cp: bool,
    /// Only write rm commands
    #[arg(long, conflicts_with = "overwrite_on_conflict")]
    pub only_rm: bool,
    /// Overwrite files that differ on the two sides, in the chosen direction
    #[arg(long)]
    pub overwrite_on_conflict: bool,
    /// File to write cp and rm commands to
    #[arg(long, value_name = "NAME")]
    pub sync_command_file: Option<String>,
    /// First merged inventory
    #[arg(value_name = "INV")]
    pub first: String,
    /// Second merged inventory
    #[arg(value_name = "INV")]
    pub second: String,
}

impl SyncArgs {
    pub fn direction(&self) -> SyncDirection {
        if self.first_to_second {
            SyncDirection::FirstToSecond
        } else if self.second_to_first {
            SyncDirection::SecondToFirst
        } else {
            SyncDirection::BothWays
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_flags_are_exclusive() {
        assert!(Cli::try_parse_from(["inventory-keeper", "inventory", "--patch", "--create-only", "."]).is_err());
        let cli = Cli::try_parse_from(["inventory-keeper", "inventory", "--patch", "."]).unwrap();
        match cli.command {
            Some(Commands::Inventory(args)) => assert_eq!(args.mode(), RunMode::Patch),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_approve_lists_need_checking_mode() {
        let cli = Cli::try_parse_from([
            "inventory-keeper",
            "inventory",
            "--replace-inventory-files",
            "--patch-approve-add",
            "jpg",
            ".",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Inventory(args)) => assert!(args.validate().is_err()),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(Some("JPG, .png,,")), vec!["jpg", ".png"]);
        assert!(split_list(None).is_empty());
    }

    #[test]
    fn test_sync_direction_required() {
        assert!(Cli::try_parse_from(["inventory-keeper", "sync", "a.json", "b.json"]).is_err());
        let cli =
            Cli::try_parse_from(["inventory-keeper", "sync", "--cp-both-ways", "a.json", "b.json"])
                .unwrap();
        match cli.command {
            Some(Commands::Sync(args)) => assert_eq!(args.direction(), SyncDirection::BothWays),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
