//! Config file location and `~`/`$VAR` expansion for configured paths.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use crate::APP_NAME;

/// File name looked up inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Where configuration is read from. Nothing is ever written there.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Path to the configuration file; it may not exist.
    pub config_file: PathBuf,
}

impl AppPaths {
    /// Resolve the config file from `--config` or the platform config directory.
    ///
    /// An override naming a directory resolves to `config.toml` inside it.
    ///
    /// # Errors
    ///
    /// Returns an error if the override cannot be expanded or no config
    /// directory can be determined.
    pub fn discover(config_override: Option<&Path>) -> Result<Self> {
        let config_file = match config_override {
            Some(path) => {
                let path = expand(&path.to_string_lossy())?;
                if path.is_dir() {
                    path.join(CONFIG_FILE_NAME)
                } else {
                    path
                }
            }
            None => dirs::config_dir()
                .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
                .ok_or_else(|| anyhow!("unable to determine configuration directory"))?
                .join(APP_NAME)
                .join(CONFIG_FILE_NAME),
        };

        Ok(Self { config_file })
    }
}

/// Expand `~` and environment variables in a configured path.
///
/// # Errors
///
/// Returns an error if a referenced variable is not set.
pub fn expand(text: &str) -> Result<PathBuf> {
    let expanded =
        shellexpand::full(text).with_context(|| format!("expanding path {text}"))?;
    Ok(PathBuf::from(expanded.into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn override_directory_resolves_to_config_toml() {
        let dir = env::temp_dir();
        let paths = AppPaths::discover(Some(&dir)).unwrap();
        assert_eq!(paths.config_file, dir.join(CONFIG_FILE_NAME));
    }

    #[test]
    fn override_file_is_used_verbatim() {
        let file = env::temp_dir().join("graphmail-custom.toml");
        let paths = AppPaths::discover(Some(&file)).unwrap();
        assert_eq!(paths.config_file, file);
    }

    #[test]
    fn default_location_is_under_app_dir() {
        let paths = AppPaths::discover(None).unwrap();
        assert!(paths.config_file.ends_with("graphmail/config.toml"));
    }

    #[test]
    fn tilde_expands_to_home() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand("~/graphmail.log").unwrap(), home.join("graphmail.log"));
    }

    #[test]
    fn unset_variable_is_an_error() {
        assert!(expand("$GRAPHMAIL_SURELY_UNSET_VARIABLE/x").is_err());
    }
}
