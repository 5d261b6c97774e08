use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub root_paths: Vec<String>,
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    #[serde(default = "default_inventory_file_name")]
    pub inventory_file_name: String,
    #[serde(default = "default_checksum")]
    pub checksum: String,
    #[serde(default)]
    pub also_non_image_files: bool,
    #[serde(default)]
    pub single_thread: bool,
    /// Drop files that vanish mid-scan instead of failing the run.
    #[serde(default)]
    pub tolerate_races: bool,
    #[serde(default)]
    pub escape_non_ascii: bool,
    #[serde(default = "default_print_limit")]
    pub print_limit: usize,
    #[serde(default = "default_delete_command_file")]
    pub delete_command_file: String,
    #[serde(default = "default_sync_command_file")]
    pub sync_command_file: String,
    #[serde(default = "default_merged_inventory_file")]
    pub merged_inventory_file: String,
    #[serde(default)]
    pub low_priority_dirs: Vec<String>,
}

fn default_inventory_file_name() -> String {
    "inventory.json".to_string()
}

fn default_checksum() -> String {
    "sha256".to_string()
}

fn default_print_limit() -> usize {
    5
}

fn default_delete_command_file() -> String {
    "deleteme.txt".to_string()
}

fn default_sync_command_file() -> String {
    "syncme.txt".to_string()
}

fn default_merged_inventory_file() -> String {
    "merged-inventory.json".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            root_paths: Vec::new(),
            ignore_patterns: Vec::new(),
            inventory_file_name: default_inventory_file_name(),
            checksum: default_checksum(),
            also_non_image_files: false,
            single_thread: false,
            tolerate_races: false,
            escape_non_ascii: false,
            print_limit: default_print_limit(),
            delete_command_file: default_delete_command_file(),
            sync_command_file: default_sync_command_file(),
            merged_inventory_file: default_merged_inventory_file(),
            low_priority_dirs: Vec::new(),
        }
    }
}

/// Read `Config.*` from the working directory (optional), then `INVENTORY_*`
/// environment variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(
            Environment::with_prefix("INVENTORY")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("root_paths")
                .with_list_parse_key("ignore_patterns")
                .with_list_parse_key("low_priority_dirs"),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

/// Remove directories that are subdirectories of other directories in the list.
pub fn non_overlapping_directories(dirs: Vec<String>) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();

    for dir in dirs {
        let dir_path = Path::new(&dir);
        if result.iter().any(|kept| dir_path.starts_with(Path::new(kept))) {
            continue;
        }
        result.retain(|kept| !Path::new(kept).starts_with(dir_path));
        result.push(dir);
    }

    result
}
