//! Shared fixtures for unit tests

use std::time::Duration;

use crate::device::{Device, DeviceSettings, Endpoint, Multipliers};

pub fn device(pan: f64, tilt: f64) -> Device {
    device_with_timeout(pan, tilt, Duration::from_secs(10))
}

pub fn device_with_timeout(pan: f64, tilt: f64, move_timeout: Duration) -> Device {
    Device::new(DeviceSettings {
        name: "test-cam".to_string(),
        camera: Endpoint::new("192.168.1.50", 80),
        proxy: Endpoint::new("10.0.0.2", 8001),
        multipliers: Multipliers::new(pan, tilt).expect("valid multipliers"),
        move_timeout,
    })
}

/// SOAP 1.2 envelope declaring the usual ONVIF prefixes around `body`
pub fn envelope(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope" xmlns:tptz="http://www.onvif.org/ver20/ptz/wsdl" xmlns:tt="http://www.onvif.org/ver10/schema">
  <s:Body>
    {}
  </s:Body>
</s:Envelope>"#,
        body
    )
}

pub fn relative_move(x: &str, y: &str) -> String {
    envelope(&format!(
        r#"<tptz:RelativeMove>
      <tptz:ProfileToken>profile_1</tptz:ProfileToken>
      <tptz:Translation>
        <tt:PanTilt x="{}" y="{}" space="http://www.onvif.org/ver10/tptz/PanTiltSpaces/TranslationGenericSpace"/>
      </tptz:Translation>
    </tptz:RelativeMove>"#,
        x, y
    ))
}

pub fn get_status_response(x: &str, y: &str, move_status: &str) -> String {
    envelope(&format!(
        r#"<tptz:GetStatusResponse>
      <tptz:PTZStatus>
        <tt:Position>
          <tt:PanTilt x="{}" y="{}" space="http://www.onvif.org/ver10/tptz/PanTiltSpaces/PositionGenericSpace"/>
          <tt:Zoom x="0"/>
        </tt:Position>
        <tt:MoveStatus>
          <tt:PanTilt>{}</tt:PanTilt>
          <tt:Zoom>IDLE</tt:Zoom>
        </tt:MoveStatus>
        <tt:UtcTime>2024-01-01T00:00:00Z</tt:UtcTime>
      </tptz:PTZStatus>
    </tptz:GetStatusResponse>"#,
        x, y, move_status
    ))
}

pub fn soap_fault() -> String {
    envelope(
        r#"<s:Fault>
      <s:Code><s:Value>s:Sender</s:Value><s:Subcode><s:Value>ter:InvalidArgVal</s:Value></s:Subcode></s:Code>
      <s:Reason><s:Text xml:lang="en">Unsupported space</s:Text></s:Reason>
    </s:Fault>"#,
    )
}
