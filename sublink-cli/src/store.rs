//! Local state location

use std::path::PathBuf;

use sublink_core::config::StorageConfig;

/// Directory name under the platform data directory
const DATA_DIR_NAME: &str = "sublink";

/// Resolve the directory for local session state
///
/// `SUBLINK_DATA_DIR` wins, then the configured directory, then the
/// platform data directory.
pub fn data_dir(storage: &StorageConfig) -> PathBuf {
    if let Ok(path) = std::env::var("SUBLINK_DATA_DIR") {
        return PathBuf::from(path);
    }

    if let Some(dir) = &storage.directory {
        return dir.clone();
    }

    dirs::data_dir()
        .map(|dir| dir.join(DATA_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(".").join(format!(".{}", DATA_DIR_NAME)))
}
