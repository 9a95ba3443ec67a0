//! Configuration for vblkd.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Control socket served to vblkctl.
    #[serde(default = "default_socket_path")]
    pub socket: PathBuf,
    #[serde(default)]
    pub spdk: SpdkConfig,
    #[serde(default)]
    pub emulation: EmulationConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket: default_socket_path(),
            spdk: SpdkConfig::default(),
            emulation: EmulationConfig::default(),
            pagination: PaginationConfig::default(),
        }
    }
}

/// Where the SPDK/SNAP JSON-RPC server listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpdkConfig {
    #[serde(default = "default_spdk_socket_path")]
    pub socket: PathBuf,
}

impl Default for SpdkConfig {
    fn default() -> Self {
        Self {
            socket: default_spdk_socket_path(),
        }
    }
}

/// Fixed parameters passed on every controller create. Not caller-controlled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulationConfig {
    pub bdev_type: String,
    pub emulation_manager: String,
}

impl Default for EmulationConfig {
    fn default() -> Self {
        Self {
            bdev_type: "spdk".to_string(),
            emulation_manager: "mlx5_0".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Page size used when the request leaves it at zero.
    pub default_page_size: usize,
    /// Larger requested page sizes are clamped to this.
    pub max_page_size: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: 50,
            max_page_size: 250,
        }
    }
}

impl PaginationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pagination.default_page_size",
                reason: "must be > 0",
            });
        }
        if self.max_page_size < self.default_page_size {
            return Err(ConfigError::InvalidValue {
                field: "pagination.max_page_size",
                reason: "must be >= default_page_size",
            });
        }
        Ok(())
    }
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/run/vblkd/vblkd.sock")
}

fn default_spdk_socket_path() -> PathBuf {
    PathBuf::from("/var/tmp/spdk.sock")
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.pagination.validate()?;
        Ok(config)
    }
}
