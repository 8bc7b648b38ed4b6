/// Application configuration
use crate::error::{CliError, Result};
use ayiah_scanner::ScannerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when `--config` is not given
const DEFAULT_CONFIG_FILE: &str = "ayiah.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Log filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub scanner: ScannerConfig,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// An explicit `path` must exist; the default `ayiah.toml` is optional.
    /// `AYIAH_*` variables override both, with `__` between nested keys
    /// (`AYIAH_SCANNER__WORKERS=4`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = ::config::Config::builder();

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(CliError::Config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                settings = settings.add_source(::config::File::from(path.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(::config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            ::config::Environment::with_prefix("AYIAH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(CliError::Config("database_url is required".to_string()));
        }

        if self.scanner.workers == 0 {
            return Err(CliError::Config(
                "scanner.workers must be at least 1".to_string(),
            ));
        }

        if self.scanner.watch_queue_capacity == 0 {
            return Err(CliError::Config(
                "scanner.watch_queue_capacity must be at least 1".to_string(),
            ));
        }

        if self.scanner.cache_capacity == 0 {
            return Err(CliError::Config(
                "scanner.cache_capacity must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

fn default_database_url() -> String {
    "sqlite://./data/ayiah.db".to_string()
}

fn default_log_level() -> String {
    "ayiah=info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            log_level: default_log_level(),
            scanner: ScannerConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert_eq!(config.database_url, "sqlite://./data/ayiah.db");
        assert_eq!(config.log_level, "ayiah=info");
        assert!(config.scanner.workers > 0);
        config.validate().unwrap();
    }

    #[test]
    fn test_load_from_file() {
        let file = config_file(
            r#"
database_url = "sqlite:///srv/ayiah/catalog.db"

[scanner]
workers = 3
min_file_size = 4096
ignore = ["Extras"]
"#,
        );

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.database_url, "sqlite:///srv/ayiah/catalog.db");
        assert_eq!(config.log_level, "ayiah=info");
        assert_eq!(config.scanner.workers, 3);
        assert_eq!(config.scanner.min_file_size, 4096);
        assert_eq!(config.scanner.ignore, vec!["Extras".to_string()]);
        assert_eq!(config.scanner.debounce_ms, ScannerConfig::default().debounce_ms);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = AppConfig::load(Some(Path::new("/nonexistent/ayiah.toml")));
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_workers_and_queue() {
        let mut config = AppConfig::default();
        config.scanner.workers = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.scanner.watch_queue_capacity = 0;
        assert!(config.validate().is_err());
    }
}
