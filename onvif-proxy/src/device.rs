//! Device record: one per proxied camera, alive for the whole process

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use serde::Serialize;

use crate::error::ProxyError;
use crate::motion::MotionTracker;

/// Host and port of an ONVIF HTTP endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Base ONVIF URL, e.g. `http://192.168.1.50:80/onvif/`
    pub fn base_url(&self) -> String {
        format!("http://{}:{}/onvif/", self.host, self.port)
    }

    pub fn service_url(&self, service: &str) -> String {
        format!("{}{}", self.base_url(), service)
    }
}

/// Scale factors for RelativeMove deltas
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Multipliers {
    #[serde(rename = "x_multiplier")]
    pub pan: f64,
    #[serde(rename = "y_multiplier")]
    pub tilt: f64,
}

impl Default for Multipliers {
    fn default() -> Self {
        Self {
            pan: 1.0,
            tilt: 1.0,
        }
    }
}

impl Multipliers {
    pub fn new(pan: f64, tilt: f64) -> Result<Self, ProxyError> {
        Ok(Self {
            pan: check_multiplier("pan", pan)?,
            tilt: check_multiplier("tilt", tilt)?,
        })
    }

    /// Scale a (pan, tilt) delta and saturate each axis to [-1, 1]
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x * self.pan).clamp(-1.0, 1.0),
            (y * self.tilt).clamp(-1.0, 1.0),
        )
    }
}

fn check_multiplier(axis: &'static str, value: f64) -> Result<f64, ProxyError> {
    if value.is_finite() && (-1.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ProxyError::InvalidMultiplier { axis, value })
    }
}

/// Everything needed to build a [`Device`]
#[derive(Debug, Clone)]
pub struct DeviceSettings {
    pub name: String,
    pub camera: Endpoint,
    /// Address controllers use to reach this device through the proxy
    pub proxy: Endpoint,
    pub multipliers: Multipliers,
    pub move_timeout: Duration,
}

/// A proxied camera. Motion state is reachable only through [`Device::motion`].
#[derive(Debug)]
pub struct Device {
    name: String,
    camera: Endpoint,
    proxy: Endpoint,
    multipliers: RwLock<Multipliers>,
    motion: MotionTracker,
}

impl Device {
    pub fn new(settings: DeviceSettings) -> Self {
        let motion = MotionTracker::new(settings.name.clone(), settings.move_timeout);
        Self {
            name: settings.name,
            camera: settings.camera,
            proxy: settings.proxy,
            multipliers: RwLock::new(settings.multipliers),
            motion,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn camera(&self) -> &Endpoint {
        &self.camera
    }

    pub fn proxy(&self) -> &Endpoint {
        &self.proxy
    }

    pub fn motion(&self) -> &MotionTracker {
        &self.motion
    }

    pub fn move_timeout(&self) -> Duration {
        self.motion.move_timeout()
    }

    pub fn multipliers(&self) -> Multipliers {
        *self.multipliers.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the multipliers for this process only; nothing is written to disk
    pub fn set_multipliers(&self, multipliers: Multipliers) {
        *self.multipliers.write().unwrap_or_else(PoisonError::into_inner) = multipliers;
        tracing::info!(
            "[{}] Multipliers set to x={} y={}",
            self.name,
            multipliers.pan,
            multipliers.tilt
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiplier_bounds() {
        assert!(Multipliers::new(-1.0, 1.0).is_ok());
        assert!(matches!(
            Multipliers::new(1.01, 0.0),
            Err(ProxyError::InvalidMultiplier { axis: "pan", .. })
        ));
        assert!(matches!(
            Multipliers::new(0.0, f64::NAN),
            Err(ProxyError::InvalidMultiplier { axis: "tilt", .. })
        ));
    }

    #[test]
    fn test_apply_scales_and_clamps() {
        let m = Multipliers::new(0.5, -1.0).unwrap();
        assert_eq!(m.apply(0.8, 0.25), (0.4, -0.25));

        // Inputs outside [-1, 1] saturate instead of being rejected
        let m = Multipliers::new(1.0, 1.0).unwrap();
        assert_eq!(m.apply(3.0, -2.5), (1.0, -1.0));
    }

    #[test]
    fn test_endpoint_urls() {
        let e = Endpoint::new("10.0.0.5", 8080);
        assert_eq!(e.base_url(), "http://10.0.0.5:8080/onvif/");
        assert_eq!(e.service_url("ptz_service"), "http://10.0.0.5:8080/onvif/ptz_service");
    }
}
