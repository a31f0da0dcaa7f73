//! Canned SOAP documents and fragments
//!
//! All XML and HTML the proxy produces itself is centralized here.

use quick_xml::escape::escape;

/// URI that marks the field-of-view relative pan/tilt space
pub const FOV_SPACE_URI: &str = "http://www.onvif.org/ver10/tptz/PanTiltSpaces/TranslationSpaceFov";

/// Escape a string for safe inclusion in XML/HTML content and attributes.
fn xml_escape(s: &str) -> String {
    escape(s).to_string()
}

/// SOAP 1.2 fault raised by the proxy itself (camera unreachable etc.)
fn receiver_fault(reason: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope">
  <s:Body>
    <s:Fault>
      <s:Code>
        <s:Value>s:Receiver</s:Value>
      </s:Code>
      <s:Reason>
        <s:Text xml:lang="en">{}</s:Text>
      </s:Reason>
    </s:Fault>
  </s:Body>
</s:Envelope>"#,
        xml_escape(reason)
    )
}

/// Fault returned when the camera did not answer in time
pub fn timeout_fault() -> String {
    receiver_fault("Request timeout")
}

/// Fault returned when the camera could not be reached
pub fn connection_fault() -> String {
    receiver_fault("Connection error to camera")
}

/// Fault for any other proxy-side failure
pub fn generic_fault(message: &str) -> String {
    receiver_fault(message)
}

/// Success acknowledgement substituted for a suppressed RelativeMove fault
pub fn relative_move_response() -> &'static str {
    r#"<tptz:RelativeMoveResponse xmlns:tptz="http://www.onvif.org/ver20/ptz/wsdl"/>"#
}

/// Field-of-view relative translation space with both axes spanning [-1, 1].
///
/// `prefix` is the qualified-name prefix (with colon) bound to the ONVIF schema
/// namespace at the insertion point, or empty when it is the default namespace.
pub fn fov_translation_space(prefix: &str) -> String {
    format!(
        "<{p}RelativePanTiltTranslationSpace>\
<{p}URI>{uri}</{p}URI>\
<{p}XRange><{p}Min>-1</{p}Min><{p}Max>1</{p}Max></{p}XRange>\
<{p}YRange><{p}Min>-1</{p}Min><{p}Max>1</{p}Max></{p}YRange>\
</{p}RelativePanTiltTranslationSpace>",
        p = prefix,
        uri = FOV_SPACE_URI
    )
}

/// One camera row on the status page
pub struct StatusRow<'a> {
    pub name: &'a str,
    pub proxy_url: &'a str,
    pub camera_url: &'a str,
    pub status: &'a str,
    pub x_multiplier: f64,
    pub y_multiplier: f64,
    pub move_timeout_secs: u64,
    pub requests: u64,
    pub responses: u64,
    pub upstream_failures: u64,
}

/// HTML status page listing every proxied camera
pub fn status_page(current: &str, rows: &[StatusRow<'_>]) -> String {
    let mut items = String::new();
    for row in rows {
        items.push_str(&format!(
            r#"
    <li><b>{}</b>: <a href="{}">{}</a> &rarr; {}: {} (x={}, y={}, timeout={}s, requests={}, responses={}, upstream failures={})</li>"#,
            xml_escape(row.name),
            xml_escape(row.proxy_url),
            xml_escape(row.proxy_url),
            xml_escape(row.camera_url),
            row.status,
            row.x_multiplier,
            row.y_multiplier,
            row.move_timeout_secs,
            row.requests,
            row.responses,
            row.upstream_failures
        ));
    }

    format!(
        r#"<html>
  <head><title>ONVIF Proxy Status</title></head>
  <body>
    <h1>ONVIF Proxy Status - {}</h1>
    <ul>{}
    </ul>
  </body>
</html>"#,
        xml_escape(current),
        items
    )
}
