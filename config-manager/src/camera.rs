use serde::Deserialize;

use crate::error::ConfigError;

fn default_camera_port() -> u16 {
    80
}

fn default_multiplier() -> f64 {
    1.0
}

fn default_move_timeout() -> u64 {
    10
}

/// One proxied PTZ camera
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CameraConfig {
    /// Stable identifier, also used in log lines and on the status page
    pub name: String,
    pub camera_host: String,
    #[serde(default = "default_camera_port")]
    pub camera_port: u16,
    /// Port this camera's proxy listens on
    pub proxy_port: u16,
    /// Scale applied to RelativeMove pan deltas, in [-1, 1]
    #[serde(default = "default_multiplier")]
    pub x_multiplier: f64,
    /// Scale applied to RelativeMove tilt deltas, in [-1, 1]
    #[serde(default = "default_multiplier")]
    pub y_multiplier: f64,
    /// Seconds after a move command before the camera is reported idle again
    #[serde(default = "default_move_timeout")]
    pub move_timeout: u64,
}

impl CameraConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("camera name must not be empty".into()));
        }
        if self.camera_host.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "camera '{}' has an empty camera_host",
                self.name
            )));
        }
        for (key, value) in [
            ("x_multiplier", self.x_multiplier),
            ("y_multiplier", self.y_multiplier),
        ] {
            if !value.is_finite() || !(-1.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "camera '{}': {} must be within [-1, 1], got {}",
                    self.name, key, value
                )));
            }
        }
        Ok(())
    }
}
