//! Configuration file resolution for CLI commands.

use std::path::Path;

use super::command::DEFAULT_CONFIG_PATH;
use crate::error::Result;
use crate::infrastructure::config::settings::Config;

/// Load the configuration for a command.
///
/// An explicit path must exist. Without one, `stagehand.toml` in the current
/// directory is used when present and defaults otherwise.
///
/// # Errors
///
/// Returns an error if the file cannot be read or fails validation.
pub fn load(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None if Path::new(DEFAULT_CONFIG_PATH).is_file() => Config::load(DEFAULT_CONFIG_PATH),
        None => Ok(Config::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, Error};

    #[test]
    fn explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::ReadFile(_))));
    }

    #[test]
    fn explicit_path_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stagehand.toml");
        std::fs::write(&path, "[service]\nport = 8080\n").unwrap();
        assert_eq!(load(Some(&path)).unwrap().service.port, 8080);
    }
}
