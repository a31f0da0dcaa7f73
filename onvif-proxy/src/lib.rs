//! ONVIF PTZ Proxy Library
//!
//! Sits between an ONVIF controller (VMS) and a PTZ camera, one HTTP listener per
//! camera. Requests and responses are forwarded verbatim except for a few PTZ
//! operations:
//!
//! - RelativeMove pan/tilt deltas are scaled by per-camera multipliers.
//! - The proxy tracks motion itself and reports it in GetStatus, since many
//!   cameras never report MOVING.
//! - A field-of-view translation space and MoveStatus/StatusPosition support
//!   are advertised.
//! - Camera endpoint URLs in responses point back at the proxy.

mod device;
mod error;
mod forward;
mod motion;
mod operation;
mod request;
mod response;
mod server;
mod soap;
mod status;
pub mod templates;
#[cfg(test)]
mod testutil;

pub use device::{Device, DeviceSettings, Endpoint, Multipliers};
pub use error::{ForwardError, ProxyError};
pub use forward::{fault_response, Forwarder, SOAP_CONTENT_TYPE};
pub use motion::{MotionStatus, MotionTracker, PanTiltPosition};
pub use operation::PtzOperation;
pub use request::transform_request;
pub use response::{rewrite_endpoint_urls, transform_response};
pub use server::{
    camera_router, run_proxy_server, CounterSnapshot, MessageCounters, ProxiedCamera, ProxyState,
};
pub use soap::{contains_fault, extract_soap_action};
pub use status::{CameraStatus, MultiplierUpdate};
