mod cli;
mod logging;
mod progress_bar;
mod prompt;

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser};
use cli::{split_list, Cli, Commands, DedupeArgs, InventoryArgs, MergeArgs, ScanArgs, SyncArgs};
use colored::*;
use dotenv::dotenv;
use inventory_keeper::analysis::{plan_sync, LocalFs, PatchPolicy, SyncOptions};
use inventory_keeper::config::load_configuration;
use inventory_keeper::engine::{find_duplicates, log_duplicate_summary};
use inventory_keeper::storage::{load_snapshot, merge_inventories, save_snapshot, write_commands};
use inventory_keeper::{AppConfig, InventoryEngine, RunMode, TreeSummary};
use progress_bar::CliReporter;
use prompt::StdinConfirm;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

fn main() -> ExitCode {
    dotenv().ok();

    let args = Cli::parse();
    let _guard = logging::init_logger(args.log.as_deref());

    let config = match load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let outcome = match args.command {
        Some(Commands::Inventory(args)) => run_inventory(config, args),
        Some(Commands::Dedupe(args)) => run_dedupe(config, args),
        Some(Commands::Merge(args)) => run_merge(config, args),
        Some(Commands::Sync(args)) => run_sync(config, args),
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:#?}", config);
            Ok(true)
        }
        None => {
            let _ = Cli::command().print_long_help();
            Ok(true)
        }
    };

    match outcome {
        Ok(true) => {
            info!("Done.");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            error!("Finished with problems; see above.");
            ExitCode::FAILURE
        }
        Err(err) => {
            error!("Error: {:#}", err);
            error!("The program can not continue.");
            ExitCode::FAILURE
        }
    }
}

/// Glob each argument (trailing separators dropped) and require directories.
fn expand_directories(args: &[String], config: &AppConfig) -> anyhow::Result<Vec<PathBuf>> {
    let patterns: Vec<String> = if args.is_empty() {
        config.root_paths.clone()
    } else {
        args.to_vec()
    };

    let mut targets = Vec::new();
    for pattern in &patterns {
        let trimmed = pattern.trim_end_matches(['/', '\\']);
        let trimmed = if trimmed.is_empty() { pattern.as_str() } else { trimmed };
        let matches = glob::glob(trimmed)
            .with_context(|| format!("Invalid directory pattern '{}'", pattern))?;
        for path in matches {
            targets.push(path.with_context(|| format!("Unable to expand '{}'", pattern))?);
        }
    }

    if targets.is_empty() {
        bail!("No directories remain after glob-ing.");
    }
    if let Some(bad) = targets.iter().find(|t| !t.is_dir()) {
        bail!("The parameter '{}' is not a directory.", bad.display());
    }
    Ok(targets)
}

fn apply_scan_args(config: &mut AppConfig, scan: &ScanArgs) {
    config.also_non_image_files |= scan.also_non_image_files;
    config.single_thread |= scan.single_thread;
    config.tolerate_races |= scan.tolerate_races;
    if let Some(checksum) = &scan.checksum {
        config.checksum = checksum.clone();
    }
    if let Some(name) = &scan.inventory_file_name {
        config.inventory_file_name = name.clone();
    }
}

fn run_inventory(mut config: AppConfig, args: InventoryArgs) -> anyhow::Result<bool> {
    if let Err(msg) = args.validate() {
        bail!(msg);
    }
    apply_scan_args(&mut config, &args.scan);
    let directories = expand_directories(&args.directories, &config)?;

    let mode = args.mode();
    let policy = PatchPolicy::new()
        .approve_add(split_list(args.patch_approve_add.as_deref()))
        .approve_remove(split_list(args.patch_approve_remove.as_deref()));
    let mut confirm = StdinConfirm;
    let mut engine = InventoryEngine::new(config)?
        .with_mode(mode)
        .with_patch_policy(policy);
    if mode == RunMode::Patch {
        engine = engine.with_confirm(&mut confirm);
    }

    let reporter = CliReporter::new();
    let mut total = TreeSummary::default();
    for dir in &directories {
        total.absorb(engine.process_tree(dir, args.recursive, &reporter)?);
    }

    info!("Summary of directories:");
    total.log();
    log_duplicate_summary(&total.snapshots);
    total.scan.log_filter_summary();

    info!(
        "{} directories, {} files, {} bytes",
        format!("{}", total.counts.values().sum::<usize>()).cyan(),
        format!("{}", total.scan.files_identified).cyan(),
        format!("{}", total.scan.bytes_identified).cyan(),
    );
    Ok(total.is_success())
}

fn run_dedupe(mut config: AppConfig, args: DedupeArgs) -> anyhow::Result<bool> {
    apply_scan_args(&mut config, &args.scan);
    if !args.low_priority_dirs.is_empty() {
        config.low_priority_dirs = args.low_priority_dirs.clone();
    }
    if let Some(file) = &args.delete_command_file {
        config.delete_command_file = file.clone();
    }
    let directories = expand_directories(&args.directories, &config)?;

    let reporter = CliReporter::new();
    let (plan, scan) = find_duplicates(&config, &directories, args.recursive, &reporter)?;

    write_commands(Path::new(&config.delete_command_file), &plan.commands)?;
    scan.log_filter_summary();
    info!(
        "{} duplicate groups, {} ambiguous, {} delete commands, {} refused, {} bytes reclaimable",
        format!("{}", plan.groups.len()).red(),
        format!("{}", plan.ambiguous.len()).yellow(),
        format!("{}", plan.commands.len()).red(),
        format!("{}", plan.refused.len()).yellow(),
        format!("{}", plan.bytes_reclaimable).red(),
    );
    Ok(true)
}

fn run_merge(mut config: AppConfig, args: MergeArgs) -> anyhow::Result<bool> {
    if let Some(name) = &args.inventory_file_name {
        config.inventory_file_name = name.clone();
    }
    if let Some(file) = &args.merged_inventory {
        config.merged_inventory_file = file.clone();
    }
    let directories = expand_directories(&args.directories, &config)?;

    let merged = merge_inventories(
        &directories,
        args.recursive,
        &config.inventory_file_name,
        args.path_trim.as_deref(),
    )?;
    save_snapshot(Path::new(&config.merged_inventory_file), &merged.snapshot)?;
    Ok(merged.read_errors == 0)
}

fn run_sync(mut config: AppConfig, args: SyncArgs) -> anyhow::Result<bool> {
    if let Some(file) = &args.sync_command_file {
        config.sync_command_file = file.clone();
    }
    let options = SyncOptions {
        direction: args.direction(),
        only_cp: args.only_cp,
        only_rm: args.only_rm,
        overwrite_on_conflict: args.overwrite_on_conflict,
    };

    let first = load_snapshot(Path::new(&args.first))
        .with_context(|| format!("Loading '{}'", args.first))?;
    let second = load_snapshot(Path::new(&args.second))
        .with_context(|| format!("Loading '{}'", args.second))?;

    let plan = plan_sync(&first, &second, options, &LocalFs).context(
        "(Maybe your inventories don't have global paths, or are incomplete.)",
    )?;
    info!("Have {} commands to write out.", plan.commands.len());
    write_commands(Path::new(&config.sync_command_file), &plan.commands)?;
    Ok(true)
}
