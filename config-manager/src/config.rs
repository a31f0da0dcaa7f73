use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::camera::CameraConfig;
use crate::error::ConfigError;
use crate::paths;

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

fn default_forward_timeout() -> u64 {
    10
}

/// Root of `cameras.toml`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProxyConfig {
    /// Host controllers use to reach the proxy; substituted into camera-advertised URLs
    pub proxy_host: String,
    #[serde(default = "default_bind_host")]
    pub bind_host: String,
    /// Upper bound on a single forwarded request to a camera
    #[serde(default = "default_forward_timeout")]
    pub forward_timeout_secs: u64,
    pub cameras: Vec<CameraConfig>,
}

impl ProxyConfig {
    /// Get default config path
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        paths::cameras_config_path()
    }

    /// Load config from default XDG location
    pub fn load() -> Result<Self, ConfigError> {
        let path = paths::cameras_config_path()?;
        Self::load_from(&path)
    }

    /// Load and validate config from specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate config from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.proxy_host.trim().is_empty() {
            return Err(ConfigError::Invalid("proxy_host must not be empty".into()));
        }
        if self.cameras.is_empty() {
            return Err(ConfigError::Invalid("no cameras configured".into()));
        }

        let mut names = HashSet::new();
        let mut ports = HashSet::new();
        for camera in &self.cameras {
            camera.validate()?;
            if !names.insert(camera.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate camera name '{}'",
                    camera.name
                )));
            }
            if !ports.insert(camera.proxy_port) {
                return Err(ConfigError::Invalid(format!(
                    "proxy_port {} is used by more than one camera",
                    camera.proxy_port
                )));
            }
        }
        Ok(())
    }
}
