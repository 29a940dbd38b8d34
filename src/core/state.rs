//! KL-013: Lock file management — load, save (atomic), path derivation.

use super::error::KilnError;
use super::types::RunLock;
use std::path::{Path, PathBuf};

/// Derive the lock file path within the state directory.
pub fn lock_file_path(state_dir: &Path) -> PathBuf {
    state_dir.join("kiln.lock.yaml")
}

/// Load the lock file. Returns None if it doesn't exist.
pub fn load_lock(state_dir: &Path) -> Result<Option<RunLock>, KilnError> {
    let path = lock_file_path(state_dir);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path).map_err(|e| KilnError::io(&path, e))?;
    let lock: RunLock = serde_yaml_ng::from_str(&content)
        .map_err(|e| KilnError::State(format!("invalid lock file {}: {}", path.display(), e)))?;
    Ok(Some(lock))
}

/// Save the lock file atomically (write to temp, then rename).
pub fn save_lock(state_dir: &Path, lock: &RunLock) -> Result<(), KilnError> {
    std::fs::create_dir_all(state_dir).map_err(|e| KilnError::io(state_dir, e))?;
    let path = lock_file_path(state_dir);

    let yaml = serde_yaml_ng::to_string(lock)
        .map_err(|e| KilnError::State(format!("serialize error: {}", e)))?;

    let tmp_path = path.with_extension("yaml.tmp");
    std::fs::write(&tmp_path, &yaml).map_err(|e| KilnError::io(&tmp_path, e))?;
    std::fs::rename(&tmp_path, &path).map_err(|e| KilnError::io(&path, e))?;

    Ok(())
}

/// Create a new empty lock for a manifest applied to `root`.
pub fn new_lock(name: &str, root: &Path) -> RunLock {
    use crate::tripwire::eventlog::now_iso8601;
    RunLock {
        schema: "1.0".to_string(),
        name: name.to_string(),
        root: root.to_path_buf(),
        generated_at: now_iso8601(),
        generator: format!("kiln {}", env!("CARGO_PKG_VERSION")),
        index_cache_purged: false,
        steps: indexmap::IndexMap::new(),
    }
}
