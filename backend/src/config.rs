//! # Application Configuration
//!
//! Settings live in an optional YAML file, `color_quality.yaml` in the working
//! directory unless `COLOR_QUALITY_CONFIG` points elsewhere. Every key can be
//! overridden by an environment variable.
//!
//! ```yaml
//! database_url: "sqlite:color_quality.db"
//! export_path: "color_quality_report.xlsx"
//! bind_address: "127.0.0.1:3000"
//! log_level: "info"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::db::DEFAULT_DATABASE_URL;
use crate::export::DEFAULT_EXPORT_PATH;

pub const CONFIG_PATH_ENV: &str = "COLOR_QUALITY_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "color_quality.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// sqlx SQLite URL of the quality database
    pub database_url: String,
    /// Report file written when an export request names no path
    pub export_path: PathBuf,
    pub bind_address: String,
    /// Fallback tracing filter when RUST_LOG is unset
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            export_path: PathBuf::from(DEFAULT_EXPORT_PATH),
            bind_address: "127.0.0.1:3000".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from the config file (if any), then apply environment overrides
    pub fn load() -> Result<Self> {
        let explicit = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        let config = match explicit {
            // A path the operator named must exist
            Some(path) => Self::from_file(&path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        Ok(config.with_overrides(|key| std::env::var(key).ok()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty file deserializes to null rather than an empty mapping
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Replace settings with values from `lookup` (normally the process environment)
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("COLOR_QUALITY_DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(path) = lookup("COLOR_QUALITY_EXPORT_PATH") {
            self.export_path = PathBuf::from(path);
        }
        if let Some(addr) = lookup("COLOR_QUALITY_BIND_ADDRESS") {
            self.bind_address = addr;
        }
        if let Some(level) = lookup("COLOR_QUALITY_LOG_LEVEL") {
            self.log_level = level;
        }
        self
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_address
            .parse()
            .with_context(|| format!("Invalid bind address: {}", self.bind_address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.database_url, "sqlite:color_quality.db");
        assert_eq!(config.export_path, PathBuf::from("color_quality_report.xlsx"));
        assert_eq!(config.socket_addr().unwrap().port(), 3000);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = AppConfig::from_yaml("export_path: /srv/reports/quality.xlsx\n").unwrap();
        assert_eq!(config.export_path, PathBuf::from("/srv/reports/quality.xlsx"));
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(AppConfig::from_yaml("").unwrap(), AppConfig::default());
    }

    #[test]
    fn test_malformed_yaml_is_error() {
        assert!(AppConfig::from_yaml("database_url: [unclosed").is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(AppConfig::from_file(Path::new("does/not/exist.yaml")).is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("color_quality.yaml");
        std::fs::write(&path, "bind_address: \"0.0.0.0:8080\"\nlog_level: debug\n").unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.socket_addr().unwrap().port(), 8080);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_overrides_win() {
        let env: HashMap<&str, &str> = [
            ("COLOR_QUALITY_DATABASE_URL", "sqlite::memory:"),
            ("COLOR_QUALITY_EXPORT_PATH", "out.xlsx"),
        ]
        .into_iter()
        .collect();

        let config = AppConfig::default().with_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.export_path, PathBuf::from("out.xlsx"));
        assert_eq!(config.bind_address, "127.0.0.1:3000");
    }

    #[test]
    fn test_invalid_bind_address() {
        let config = AppConfig {
            bind_address: "not-an-address".to_string(),
            ..Default::default()
        };
        assert!(config.socket_addr().is_err());
    }
}
