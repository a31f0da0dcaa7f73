use std::path::PathBuf;

use crate::error::ConfigError;

/// Get XDG config directory for the proxy
/// Returns ~/.config/onvif-ptz-proxy or $XDG_CONFIG_HOME/onvif-ptz-proxy
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|p| p.join("onvif-ptz-proxy"))
        .ok_or(ConfigError::NoConfigDir)
}

/// Get default camera config path
/// Returns ~/.config/onvif-ptz-proxy/cameras.toml
pub fn cameras_config_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("cameras.toml"))
}
