//! Configuration
//!
//! JSON configuration for device path, transfer buffer size, driver ABI
//! constants and traversal policy. Every field is optional in the file.

use crate::error::{Result, TapeError};
use crate::tape::MtioConfig;
use crate::traverse::TraversalPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_BLOCK_SIZE: usize = 65536;
pub const MAX_BLOCK_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Tape device path (e.g. /dev/nst0)
    pub device: Option<String>,
    /// Read buffer size; must hold the largest block on tape
    pub block_size: usize,
    pub mtio: MtioConfig,
    pub traversal: TraversalPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            device: None,
            block_size: DEFAULT_BLOCK_SIZE,
            mtio: MtioConfig::default(),
            traversal: TraversalPolicy::default(),
        }
    }
}

impl AppConfig {
    /// Default config file location: `<config dir>/tapewalk/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tapewalk").join("config.json"))
    }

    /// Load from an explicit path, else the default location if it exists,
    /// else built-in defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(default) if default.exists() => Self::from_file(&default)?,
                _ => {
                    debug!("No configuration file, using defaults");
                    Self::default()
                }
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        info!("Loading configuration: {}", path.display());

        let text = std::fs::read_to_string(path).map_err(|e| {
            TapeError::config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&text)
            .map_err(|e| TapeError::config(format!("Invalid {}: {}", path.display(), e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 || self.block_size > MAX_BLOCK_SIZE {
            return Err(TapeError::config(format!(
                "block_size must be between 1 and {} bytes, got {}",
                MAX_BLOCK_SIZE, self.block_size
            )));
        }
        Ok(())
    }

    /// Device from the command line, then the config file, then `$TAPE`
    pub fn resolve_device(&self, cli_device: Option<String>) -> Result<String> {
        cli_device
            .or_else(|| self.device.clone())
            .or_else(|| std::env::var("TAPE").ok().filter(|d| !d.is_empty()))
            .ok_or_else(|| {
                TapeError::config(
                    "Please specify a device name, either as an argument, in the config file or with the TAPE environment variable",
                )
            })
    }

    /// Apply a command-line block size override
    pub fn with_block_size(mut self, block_size: Option<usize>) -> Result<Self> {
        if let Some(size) = block_size {
            self.block_size = size;
            self.validate()?;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.block_size, 65536);
        assert!(config.device.is_none());
        assert_eq!(config.traversal.max_read_retries, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"device": "/dev/nst1", "block_size": 262144, "traversal": {{"max_read_retries": 2}}}}"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.device.as_deref(), Some("/dev/nst1"));
        assert_eq!(config.block_size, 262144);
        assert_eq!(config.traversal.max_read_retries, 2);
        assert_eq!(config.mtio, MtioConfig::default());
    }

    #[test]
    fn test_invalid_block_size_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"block_size": 0}}"#).unwrap();

        let err = AppConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, TapeError::Config(_)));

        let err = AppConfig::default().with_block_size(Some(MAX_BLOCK_SIZE + 1)).unwrap_err();
        assert!(matches!(err, TapeError::Config(_)));
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            AppConfig::from_file(file.path()),
            Err(TapeError::Config(_))
        ));
    }

    #[test]
    fn test_cli_device_takes_precedence() {
        let config = AppConfig {
            device: Some("/dev/nst1".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.resolve_device(Some("/dev/nst0".to_string())).unwrap(),
            "/dev/nst0"
        );
        assert_eq!(config.resolve_device(None).unwrap(), "/dev/nst1");
    }
}
