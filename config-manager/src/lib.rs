//! Configuration for the ONVIF PTZ proxy
//!
//! Cameras are described in a TOML file, by default
//! `~/.config/onvif-ptz-proxy/cameras.toml`.

mod camera;
mod config;
mod error;
mod paths;

pub use camera::CameraConfig;
pub use config::ProxyConfig;
pub use error::ConfigError;
pub use paths::{cameras_config_path, config_dir};
