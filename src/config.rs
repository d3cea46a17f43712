//! Configuration Module - User preferences from ~/.magicdb/config.toml
//!
//! Supports:
//! - Custom rule database location
//! - Directory walking and worker settings
//! - Output style (human, brief, JSON)

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::DEFAULT_MARK_LIMIT;

/// magicdb configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// Rule database settings
    pub database: DatabaseConfig,
    /// Scan settings
    pub scan: ScanConfig,
    /// Output settings
    pub output: OutputConfig,
}

/// General application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Rule database settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Rule database file (None = built-in database)
    pub path: Option<PathBuf>,
}

/// Scan settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Descend into directories
    pub recursive: bool,
    /// Skip hidden files and directories
    pub skip_hidden: bool,
    /// Follow symbolic links while walking
    pub follow_links: bool,
    /// Max depth (0 = unlimited)
    pub max_depth: usize,
    /// Number of parallel workers (0 = auto)
    pub workers: usize,
    /// Bytes buffered per file when reading as a stream
    pub mark_limit: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            recursive: false,
            skip_hidden: true,
            follow_links: false,
            max_depth: 0,
            workers: 0, // auto-detect
            mark_limit: DEFAULT_MARK_LIMIT,
        }
    }
}

impl ScanConfig {
    /// Worker count with `0` resolved to the number of CPUs.
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get()
        } else {
            self.workers
        }
    }
}

/// Output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// One line per file: name, comment and MIME type
    pub brief: bool,
    /// Report format: human or json
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            brief: false,
            format: OutputFormat::Human,
        }
    }
}

/// Report format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}

impl Config {
    /// Load config from default path or return defaults
    pub fn load() -> Self {
        Self::load_from(&Self::default_path()).unwrap_or_default()
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;

        Ok(config)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;

        Ok(())
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("org", "magicdb", "magicdb")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".magicdb")
                    .join("config.toml")
            })
    }
}

/// Generate a sample config file with comments
pub fn generate_sample_config() -> String {
    format!(
        r#"# magicdb configuration
# Location: ~/.config/magicdb/config.toml (or %APPDATA%\magicdb\config.toml on Windows)

[general]
# Log level: trace, debug, info, warn, error
log_level = "info"

[database]
# Rule database in FILE_ID DB format (omit to use the built-in database)
# path = "/usr/local/share/magicdb/magic.db"

[scan]
# Descend into directories given on the command line
recursive = false

# Skip hidden files and directories
skip_hidden = true

# Follow symbolic links while walking
follow_links = false

# Maximum scan depth (0 = unlimited)
max_depth = 0

# Number of parallel workers (0 = auto-detect CPU count)
workers = 0

# Bytes buffered per file in --stream mode
mark_limit = {DEFAULT_MARK_LIMIT}

[output]
# One line per file instead of the full property listing
brief = false

# Report format: "human" or "json"
format = "human"
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.log_level, "info");
        assert!(config.database.path.is_none());
        assert!(config.scan.skip_hidden);
        assert!(!config.scan.recursive);
        assert_eq!(config.scan.mark_limit, DEFAULT_MARK_LIMIT);
        assert_eq!(config.output.format, OutputFormat::Human);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("test_config.toml");

        let mut config = Config::default();
        config.database.path = Some(PathBuf::from("/tmp/custom.db"));
        config.scan.workers = 3;
        config.output.format = OutputFormat::Json;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_parse_sample_config() {
        let sample = generate_sample_config();
        let config: Config = toml::from_str(&sample).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str("[output]\nbrief = true\n").unwrap();
        assert!(config.output.brief);
        assert_eq!(config.scan, ScanConfig::default());
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(Config::load_from(&dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn test_effective_workers() {
        let mut scan = ScanConfig::default();
        assert!(scan.effective_workers() >= 1);
        scan.workers = 2;
        assert_eq!(scan.effective_workers(), 2);
    }
}
