//! HTTP transport: one axum listener per proxied camera

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;

use crate::device::Device;
use crate::error::ProxyError;
use crate::forward::{self, Forwarder, SOAP_CONTENT_TYPE};
use crate::operation::PtzOperation;
use crate::request::transform_request;
use crate::response::{rewrite_endpoint_urls, transform_response};
use crate::soap::contains_fault;
use crate::status;
use crate::templates;

/// Per-camera message counters
#[derive(Debug, Default)]
pub struct MessageCounters {
    requests: AtomicU64,
    responses: AtomicU64,
    upstream_failures: AtomicU64,
}

/// Point-in-time copy of [`MessageCounters`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub requests: u64,
    pub responses: u64,
    pub upstream_failures: u64,
}

impl MessageCounters {
    fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    fn record_response(&self) {
        self.responses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_upstream_failure(&self) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            responses: self.responses.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
        }
    }
}

/// A device together with its upstream client and counters
#[derive(Debug)]
pub struct ProxiedCamera {
    device: Device,
    forwarder: Forwarder,
    counters: MessageCounters,
}

impl ProxiedCamera {
    pub fn new(device: Device, forward_timeout: Duration) -> Result<Self, ProxyError> {
        let forwarder = Forwarder::new(device.camera().clone(), forward_timeout)?;
        Ok(Self {
            device,
            forwarder,
            counters: MessageCounters::default(),
        })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }
}

/// Every camera served by this process
#[derive(Debug, Default)]
pub struct ProxyState {
    cameras: Vec<Arc<ProxiedCamera>>,
}

impl ProxyState {
    pub fn new(cameras: Vec<Arc<ProxiedCamera>>) -> Self {
        Self { cameras }
    }

    pub fn cameras(&self) -> &[Arc<ProxiedCamera>] {
        &self.cameras
    }

    pub fn get(&self, name: &str) -> Result<&Arc<ProxiedCamera>, ProxyError> {
        self.cameras
            .iter()
            .find(|c| c.device().name() == name)
            .ok_or_else(|| ProxyError::UnknownDevice(name.to_string()))
    }
}

/// Router state for one listener: its own camera plus the shared registry
#[derive(Clone)]
pub(crate) struct ListenerState {
    pub camera: Arc<ProxiedCamera>,
    pub all: Arc<ProxyState>,
}

/// Routes served on a camera's proxy port
pub fn camera_router(state: Arc<ProxyState>, camera: Arc<ProxiedCamera>) -> Router {
    Router::new()
        .route("/onvif/{service}", post(handle_onvif_request))
        .route("/", get(status::status_page))
        .route("/status.json", get(status::status_json))
        .route(
            "/cameras/{name}/multipliers",
            post(status::update_multipliers),
        )
        .with_state(ListenerState { camera, all: state })
}

/// Serve `camera` on `bind_host` at its proxy port until the listener fails
pub async fn run_proxy_server(
    bind_host: &str,
    state: Arc<ProxyState>,
    camera: Arc<ProxiedCamera>,
) -> Result<(), ProxyError> {
    let port = camera.device().proxy().port;
    let name = camera.device().name().to_string();
    let target = camera.device().camera().base_url();
    let app = camera_router(state, camera);

    let listener = tokio::net::TcpListener::bind((bind_host, port)).await?;
    tracing::info!(
        "[{}] Proxy listening on {}:{} -> {}",
        name,
        bind_host,
        port,
        target
    );

    axum::serve(listener, app).await?;
    Ok(())
}

fn soap_reply(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, SOAP_CONTENT_TYPE)], body).into_response()
}

/// Upstream status, except that an error whose fault the proxy removed becomes 200
fn reply_status(upstream: StatusCode, received: &str, replied: &str) -> StatusCode {
    let upstream_error = upstream.is_client_error() || upstream.is_server_error();
    if upstream_error && contains_fault(received) && !contains_fault(replied) {
        StatusCode::OK
    } else {
        upstream
    }
}

async fn handle_onvif_request(
    State(state): State<ListenerState>,
    Path(service): Path<String>,
    body: Bytes,
) -> Response {
    let camera = &state.camera;
    let device = camera.device();
    camera.counters.record_request();

    let body = match String::from_utf8(body.to_vec()) {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!("[{}] Request body is not valid UTF-8: {}", device.name(), e);
            return soap_reply(
                StatusCode::BAD_REQUEST,
                templates::generic_fault("Request body is not valid UTF-8"),
            );
        }
    };

    let operation = PtzOperation::from_request(&body);
    tracing::info!(
        "[{}] Processing {} on /onvif/{}",
        device.name(),
        operation,
        service
    );

    let request = transform_request(&operation, device, &body);
    if request != body {
        tracing::debug!("[{}] Modified request:\n{}", device.name(), request);
    }

    let (upstream, upstream_status) = match camera.forwarder.forward(&service, request).await {
        Ok(reply) => reply,
        Err(e) => {
            camera.counters.record_upstream_failure();
            tracing::error!(
                "[{}] Error forwarding {} to {}: {}",
                device.name(),
                operation,
                camera.forwarder.camera().service_url(&service),
                e
            );
            let (fault, status) = forward::fault_response(&e);
            return soap_reply(status, fault);
        }
    };
    camera.counters.record_response();

    let received = rewrite_endpoint_urls(device, &upstream);
    let response = transform_response(&operation, device, &received);
    if response != upstream {
        tracing::debug!("[{}] Modified response:\n{}", device.name(), response);
    }

    let status = reply_status(upstream_status, &received, &response);
    soap_reply(status, response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::device::{DeviceSettings, Endpoint, Multipliers};
    use crate::motion::MotionStatus;
    use crate::testutil::{envelope, relative_move, soap_fault};

    /// Canned camera: always answers with the same status and body
    #[derive(Clone)]
    struct StubCamera {
        status: StatusCode,
        body: String,
        delay: Duration,
        received: Arc<Mutex<Vec<String>>>,
    }

    async fn stub_reply(State(stub): State<StubCamera>, body: String) -> (StatusCode, String) {
        stub.received.lock().unwrap().push(body);
        if !stub.delay.is_zero() {
            tokio::time::sleep(stub.delay).await;
        }
        (stub.status, stub.body.clone())
    }

    async fn spawn_camera(stub: StubCamera) -> Endpoint {
        let app = Router::new()
            .route("/onvif/{service}", post(stub_reply))
            .with_state(stub);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Endpoint::new("127.0.0.1", port)
    }

    fn stub(status: StatusCode, body: String) -> StubCamera {
        StubCamera {
            status,
            body,
            delay: Duration::ZERO,
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn proxied(camera: Endpoint, pan: f64, tilt: f64, timeout: Duration) -> Arc<ProxiedCamera> {
        let device = Device::new(DeviceSettings {
            name: "test-cam".to_string(),
            camera,
            proxy: Endpoint::new("10.0.0.2", 8001),
            multipliers: Multipliers::new(pan, tilt).unwrap(),
            move_timeout: Duration::from_secs(10),
        });
        Arc::new(ProxiedCamera::new(device, timeout).unwrap())
    }

    fn router(camera: &Arc<ProxiedCamera>) -> Router {
        let state = Arc::new(ProxyState::new(vec![camera.clone()]));
        camera_router(state, camera.clone())
    }

    async fn post_soap(app: Router, body: impl Into<Body>) -> (StatusCode, String, Option<String>) {
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/onvif/ptz_service")
                    .header(header::CONTENT_TYPE, SOAP_CONTENT_TYPE)
                    .body(body.into())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap(), content_type)
    }

    #[tokio::test]
    async fn test_relative_move_is_scaled_and_fault_suppressed() {
        let upstream = stub(StatusCode::INTERNAL_SERVER_ERROR, soap_fault());
        let received = upstream.received.clone();
        let camera = proxied(spawn_camera(upstream).await, 0.5, 0.5, Duration::from_secs(5));

        let (status, body, content_type) =
            post_soap(router(&camera), relative_move("0.8", "-0.4")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some(SOAP_CONTENT_TYPE));
        assert!(!contains_fault(&body));
        assert!(body.contains("RelativeMoveResponse"));

        let sent = received.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains(r#"x="0.4""#));
        assert!(sent[0].contains(r#"y="-0.2""#));
        drop(sent);

        assert_eq!(camera.device().motion().status(), MotionStatus::Moving);
        assert_eq!(
            camera.counters(),
            CounterSnapshot {
                requests: 1,
                responses: 1,
                upstream_failures: 0
            }
        );
    }

    #[tokio::test]
    async fn test_endpoint_urls_are_rewritten() {
        // The stub must know its own port before building the reply, so bind first
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let reply = envelope(&format!(
            r#"<tds:GetCapabilitiesResponse xmlns:tds="http://www.onvif.org/ver10/device/wsdl"><tt:PTZ><tt:XAddr>http://127.0.0.1:{}/onvif/ptz_service</tt:XAddr></tt:PTZ></tds:GetCapabilitiesResponse>"#,
            port
        ));
        let app = Router::new()
            .route("/onvif/{service}", post(stub_reply))
            .with_state(stub(StatusCode::OK, reply));
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        let camera = proxied(
            Endpoint::new("127.0.0.1", port),
            1.0,
            1.0,
            Duration::from_secs(5),
        );

        let request = envelope(
            r#"<tds:GetCapabilities xmlns:tds="http://www.onvif.org/ver10/device/wsdl"/>"#,
        );
        let (status, body, _) = post_soap(router(&camera), request).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<tt:XAddr>http://10.0.0.2:8001/onvif/ptz_service</tt:XAddr>"));
    }

    #[tokio::test]
    async fn test_upstream_error_status_is_kept() {
        let upstream = stub(StatusCode::BAD_REQUEST, soap_fault());
        let camera = proxied(spawn_camera(upstream).await, 1.0, 1.0, Duration::from_secs(5));

        let request = envelope("<tptz:Stop><tptz:ProfileToken>p</tptz:ProfileToken></tptz:Stop>");
        let (status, body, _) = post_soap(router(&camera), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, soap_fault());
    }

    #[tokio::test]
    async fn test_unreachable_camera_gets_connection_fault() {
        let camera = proxied(
            Endpoint::new("127.0.0.1", 9),
            1.0,
            1.0,
            Duration::from_secs(2),
        );

        let (status, body, _) = post_soap(router(&camera), relative_move("0.1", "0.1")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(contains_fault(&body));
        assert!(body.contains("Connection error to camera"));
        assert_eq!(camera.counters().upstream_failures, 1);
        assert_eq!(camera.counters().responses, 0);
    }

    #[tokio::test]
    async fn test_slow_camera_gets_timeout_fault() {
        let mut upstream = stub(StatusCode::OK, envelope("<tptz:StopResponse/>"));
        upstream.delay = Duration::from_secs(5);
        let camera = proxied(
            spawn_camera(upstream).await,
            1.0,
            1.0,
            Duration::from_millis(200),
        );

        let request = envelope("<tptz:Stop/>");
        let (status, body, _) = post_soap(router(&camera), request).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("Request timeout"));
    }

    #[tokio::test]
    async fn test_invalid_utf8_body_is_rejected() {
        let camera = proxied(
            Endpoint::new("127.0.0.1", 9),
            1.0,
            1.0,
            Duration::from_secs(2),
        );

        let (status, body, _) = post_soap(router(&camera), vec![0xff_u8, 0xfe, 0x3c]).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(contains_fault(&body));
        assert_eq!(camera.counters().upstream_failures, 0);
    }

    #[test]
    fn test_reply_status() {
        let fault = soap_fault();
        let ok = envelope("<tptz:RelativeMoveResponse/>");

        assert_eq!(
            reply_status(StatusCode::INTERNAL_SERVER_ERROR, &fault, &ok),
            StatusCode::OK
        );
        assert_eq!(
            reply_status(StatusCode::INTERNAL_SERVER_ERROR, &fault, &fault),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            reply_status(StatusCode::NOT_FOUND, &ok, &ok),
            StatusCode::NOT_FOUND
        );
        assert_eq!(reply_status(StatusCode::OK, &ok, &ok), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_state_lookup() {
        let camera = proxied(
            Endpoint::new("127.0.0.1", 9),
            1.0,
            1.0,
            Duration::from_secs(1),
        );
        let state = ProxyState::new(vec![camera]);

        assert!(state.get("test-cam").is_ok());
        assert!(matches!(
            state.get("nope"),
            Err(ProxyError::UnknownDevice(name)) if name == "nope"
        ));
    }
}
