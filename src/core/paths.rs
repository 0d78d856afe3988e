// src/core/paths.rs

use crate::constants::{ARTIFACT_EXTENSION, ARTIFACT_PREFIX, CONFIG_DIR_NAME, CONFIG_FILENAME};
use lazy_static::lazy_static;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

lazy_static! {
    static ref CREF_CONFIG_DIR: Mutex<Option<PathBuf>> = Mutex::new(None);
}

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not find system config directory.")]
    ConfigDirNotFound,
    #[error("Could not create config directory at '{path}': {source}")]
    ConfigDirCreation {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Returns the path to the cref configuration directory (`~/.config/cref`).
/// Creates it if it doesn't exist.
///
/// Memoized: the first call computes and caches the path.
pub fn get_cref_config_dir() -> Result<PathBuf, PathError> {
    let mut cached_path_guard = CREF_CONFIG_DIR
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    if let Some(path) = &*cached_path_guard {
        return Ok(path.clone());
    }

    let config_path = dirs::config_dir()
        .ok_or(PathError::ConfigDirNotFound)?
        .join(CONFIG_DIR_NAME);

    if !config_path.exists() {
        fs::create_dir_all(&config_path).map_err(|e| PathError::ConfigDirCreation {
            path: config_path.display().to_string(),
            source: e,
        })?;
    }

    *cached_path_guard = Some(config_path.clone());
    Ok(config_path)
}

/// Returns the path to `config.toml` inside the cref config directory.
pub fn get_config_path() -> Result<PathBuf, PathError> {
    get_cref_config_dir().map(|dir| dir.join(CONFIG_FILENAME))
}

/// The artifact path for `source`: `<tmp>/cref_temp_<basename>.out`.
///
/// Deterministic, so a second session on the same file reuses (and first
/// removes) the same path.
pub fn artifact_path_for(source: &Path) -> PathBuf {
    artifact_path_in(&env::temp_dir(), source)
}

fn artifact_path_in(dir: &Path, source: &Path) -> PathBuf {
    let base_name = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "source".to_string());
    dir.join(format!(
        "{}{}.{}",
        ARTIFACT_PREFIX, base_name, ARTIFACT_EXTENSION
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_path_uses_base_name() {
        let path = artifact_path_in(Path::new("/tmp"), Path::new("src/demo/hello.c"));
        assert_eq!(path, Path::new("/tmp/cref_temp_hello.c.out"));
    }

    #[test]
    fn test_artifact_path_is_deterministic() {
        let source = Path::new("hello.c");
        assert_eq!(artifact_path_for(source), artifact_path_for(source));
        assert!(artifact_path_for(source).starts_with(env::temp_dir()));
    }

    #[test]
    fn test_artifact_path_without_file_name_falls_back() {
        let path = artifact_path_in(Path::new("/tmp"), Path::new("/"));
        assert_eq!(path, Path::new("/tmp/cref_temp_source.out"));
    }
}
