//! Forwarding of (rewritten) SOAP requests to the upstream camera

use std::time::Duration;

use axum::http::StatusCode;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::Client;

use crate::device::Endpoint;
use crate::error::{ForwardError, ProxyError};
use crate::templates;

pub const SOAP_CONTENT_TYPE: &str = "application/soap+xml; charset=utf-8";
const PROXY_USER_AGENT: &str = "ONVIF-Proxy/1.0";

/// HTTP client bound to one camera
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: Client,
    camera: Endpoint,
}

impl Forwarder {
    pub fn new(camera: Endpoint, timeout: Duration) -> Result<Self, ProxyError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, camera })
    }

    pub fn camera(&self) -> &Endpoint {
        &self.camera
    }

    /// POST `body` to the camera's `/onvif/{service}` and return its reply verbatim
    pub async fn forward(
        &self,
        service: &str,
        body: String,
    ) -> Result<(String, StatusCode), ForwardError> {
        let url = self.camera.service_url(service);
        let resp = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, SOAP_CONTENT_TYPE)
            .header(USER_AGENT, PROXY_USER_AGENT)
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        Ok((text, status))
    }
}

/// Canned SOAP fault standing in for an upstream failure
pub fn fault_response(error: &ForwardError) -> (String, StatusCode) {
    let body = match error {
        ForwardError::Timeout => templates::timeout_fault(),
        ForwardError::Connect(_) => templates::connection_fault(),
        ForwardError::Other(msg) => templates::generic_fault(msg),
    };
    (body, StatusCode::INTERNAL_SERVER_ERROR)
}
