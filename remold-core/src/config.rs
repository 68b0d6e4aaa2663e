use crate::transforms::CleanMode;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Defaults picked up from `.remold.toml` in the working directory.
/// Command-line flags always win over these.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DefaultsConfig {
    /// Mode for the `clean` transform: "strip" or "collapse"
    #[serde(default)]
    pub clean_mode: CleanMode,

    /// Report each rename on stdout
    #[serde(default)]
    pub verbose: bool,

    /// Create missing destination directories
    #[serde(default)]
    pub make_dirs: bool,

    /// Program to run instead of the built-in rename, as `PROGRAM OLD NEW`
    #[serde(default)]
    pub rename_command: Option<String>,
}

impl Config {
    /// Load `.remold.toml` from the working directory if it exists.
    pub fn load() -> Result<Self> {
        if let Ok(cwd) = std::env::current_dir() {
            let config_path = cwd.join(".remold.toml");
            if config_path.exists() {
                return Self::load_from_path(&config_path);
            }
        }

        Ok(Self::default())
    }

    /// Load config from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.defaults.clean_mode, CleanMode::Strip);
        assert!(!config.defaults.verbose);
        assert!(!config.defaults.make_dirs);
        assert_eq!(config.defaults.rename_command, None);
    }

    #[test]
    fn test_load_from_path() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(".remold.toml");

        fs::write(
            &config_path,
            r#"
[defaults]
clean_mode = "collapse"
verbose = true
rename_command = "git mv"
"#,
        )
        .unwrap();

        let config = Config::load_from_path(&config_path).unwrap();
        assert_eq!(config.defaults.clean_mode, CleanMode::Collapse);
        assert!(config.defaults.verbose);
        assert!(!config.defaults.make_dirs);
        assert_eq!(
            config.defaults.rename_command,
            Some("git mv".to_string())
        );
    }

    #[test]
    fn test_partial_config() {
        let toml_content = r#"
[defaults]
make_dirs = true
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert!(config.defaults.make_dirs);
        // Other fields keep their defaults
        assert_eq!(config.defaults.clean_mode, CleanMode::Strip);
        assert!(!config.defaults.verbose);
    }

    #[test]
    fn test_bad_config_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(".remold.toml");
        fs::write(&config_path, "defaults = 3").unwrap();
        assert!(Config::load_from_path(&config_path).is_err());
    }
}
