//! Environment file loading
//!
//! Topic and group settings are read by the CLI from environment variables.
//! A `.env` file in the working directory (or any parent) is loaded first so
//! those variables can live alongside the project. Variables already present
//! in the process environment are never overridden.

use std::path::{Path, PathBuf};

/// Load a `.env` file into the process environment.
///
/// With `path` set, only that file is read. Otherwise the file is searched
/// for from the current directory upwards. Returns the loaded path, or
/// `None` when no file was found.
pub fn load_env_file(path: Option<&Path>) -> Result<Option<PathBuf>, dotenvy::Error> {
    let loaded = match path {
        Some(path) => dotenvy::from_path(path).map(|()| path.to_path_buf()),
        None => dotenvy::dotenv(),
    };

    match loaded {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_loads_variables_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "STREAM_TALLY_TEST_TOPIC=buzz_from_file\n").unwrap();

        let loaded = load_env_file(Some(&path)).unwrap();
        assert_eq!(loaded.as_deref(), Some(path.as_path()));
        assert_eq!(
            std::env::var("STREAM_TALLY_TEST_TOPIC").unwrap(),
            "buzz_from_file"
        );
    }

    #[test]
    fn test_existing_variables_win() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "STREAM_TALLY_TEST_GROUP=from_file\n").unwrap();
        std::env::set_var("STREAM_TALLY_TEST_GROUP", "from_shell");

        load_env_file(Some(&path)).unwrap();
        assert_eq!(
            std::env::var("STREAM_TALLY_TEST_GROUP").unwrap(),
            "from_shell"
        );
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_env_file(Some(&dir.path().join(".env"))).unwrap();
        assert!(loaded.is_none());
    }
}
