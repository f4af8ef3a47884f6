//! Environment constants and path utilities for liftsync.
//!
//! This module centralizes the hardcoded paths, file names and retention
//! defaults used throughout the application, making them easier to maintain
//! and modify.

/// Main application directory name (hidden directory like .git, .vscode)
pub const LIFTSYNC_DIR_NAME: &str = ".liftsync";

/// Configuration file name inside the application directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration file name looked up directly in the working directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "liftsync.toml";

/// Store-related directory and file names
pub mod store {
    /// Data directory name within .liftsync
    pub const DATA_DIR_NAME: &str = "data";

    /// Snapshot file holding the session, exercise and set tables
    pub const SNAPSHOT_FILE_NAME: &str = "sessions.json";

    /// Temp directory name for staged snapshot writes
    pub const TEMP_DIR_NAME: &str = "temp";
}

/// Draft retention defaults
pub mod reaper {
    /// How often the draft sweep runs
    pub const DEFAULT_INTERVAL_HOURS: u64 = 24;

    /// How long a draft may sit before it is reclaimed
    pub const DEFAULT_RETENTION_DAYS: i64 = 7;

    /// Upper bound accepted for the sweep interval (one year)
    pub const MAX_INTERVAL_HOURS: u64 = 24 * 366;

    /// Upper bound accepted for the retention window (about a century)
    pub const MAX_RETENTION_DAYS: i64 = 36_500;
}

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "liftsync=info";

use std::path::{Path, PathBuf};

/// Build the main .liftsync directory path from a workspace root
pub fn liftsync_dir_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(LIFTSYNC_DIR_NAME)
}

/// Build the data directory path from a workspace root
pub fn data_dir_path(workspace_root: &Path) -> PathBuf {
    liftsync_dir_path(workspace_root).join(store::DATA_DIR_NAME)
}

/// Build the snapshot file path inside a data directory
pub fn snapshot_file_path(data_dir: &Path) -> PathBuf {
    data_dir.join(store::SNAPSHOT_FILE_NAME)
}

/// Build the staging directory path inside a data directory
pub fn temp_dir_path(data_dir: &Path) -> PathBuf {
    data_dir.join(store::TEMP_DIR_NAME)
}

/// Build config directory path in user's home directory
pub fn user_config_dir_path(home_dir: &Path) -> PathBuf {
    home_dir.join(LIFTSYNC_DIR_NAME)
}

/// Build config file path in user's home directory
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    user_config_dir_path(home_dir).join(CONFIG_FILE_NAME)
}

/// Build local config file path in current directory
pub fn local_config_file_path(current_dir: &Path) -> PathBuf {
    current_dir.join(LIFTSYNC_DIR_NAME).join(CONFIG_FILE_NAME)
}
