//! Operator-facing status page, JSON status and runtime multiplier edits

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::device::Multipliers;
use crate::error::ProxyError;
use crate::motion::MotionStatus;
use crate::server::{CounterSnapshot, ListenerState, ProxiedCamera};
use crate::templates::{self, StatusRow};

/// Everything the status surfaces show about one camera
#[derive(Debug, Clone, Serialize)]
pub struct CameraStatus {
    pub name: String,
    pub proxy_url: String,
    pub camera_url: String,
    pub status: MotionStatus,
    #[serde(flatten)]
    pub multipliers: Multipliers,
    pub move_timeout_secs: u64,
    #[serde(flatten)]
    pub counters: CounterSnapshot,
}

impl CameraStatus {
    pub fn of(camera: &ProxiedCamera) -> Self {
        let device = camera.device();
        Self {
            name: device.name().to_string(),
            proxy_url: device.proxy().base_url(),
            camera_url: device.camera().base_url(),
            status: device.motion().status(),
            multipliers: device.multipliers(),
            move_timeout_secs: device.move_timeout().as_secs(),
            counters: camera.counters(),
        }
    }

    fn row(&self) -> StatusRow<'_> {
        StatusRow {
            name: &self.name,
            proxy_url: &self.proxy_url,
            camera_url: &self.camera_url,
            status: self.status.as_str(),
            x_multiplier: self.multipliers.pan,
            y_multiplier: self.multipliers.tilt,
            move_timeout_secs: self.move_timeout_secs,
            requests: self.counters.requests,
            responses: self.counters.responses,
            upstream_failures: self.counters.upstream_failures,
        }
    }
}

/// Body of `POST /cameras/{name}/multipliers`; absent fields keep their value
#[derive(Debug, Deserialize)]
pub struct MultiplierUpdate {
    pub x_multiplier: Option<f64>,
    pub y_multiplier: Option<f64>,
}

/// Error response wrapper for the status API
pub struct ApiError(ProxyError);

impl From<ProxyError> for ApiError {
    fn from(e: ProxyError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ProxyError::UnknownDevice(_) => StatusCode::NOT_FOUND,
            ProxyError::InvalidMultiplier { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        tracing::warn!("Status API error: {}", self.0);

        (status, self.0.to_string()).into_response()
    }
}

fn all_statuses(state: &ListenerState) -> Vec<CameraStatus> {
    state
        .all
        .cameras()
        .iter()
        .map(|c| CameraStatus::of(c))
        .collect()
}

pub(crate) async fn status_page(State(state): State<ListenerState>) -> Html<String> {
    let statuses = all_statuses(&state);
    let rows: Vec<StatusRow<'_>> = statuses.iter().map(CameraStatus::row).collect();
    Html(templates::status_page(state.camera.device().name(), &rows))
}

pub(crate) async fn status_json(State(state): State<ListenerState>) -> Json<Vec<CameraStatus>> {
    Json(all_statuses(&state))
}

pub(crate) async fn update_multipliers(
    State(state): State<ListenerState>,
    Path(name): Path<String>,
    Json(update): Json<MultiplierUpdate>,
) -> Result<Json<CameraStatus>, ApiError> {
    let camera = state.all.get(&name)?;
    let current = camera.device().multipliers();
    let multipliers = Multipliers::new(
        update.x_multiplier.unwrap_or(current.pan),
        update.y_multiplier.unwrap_or(current.tilt),
    )?;
    camera.device().set_multipliers(multipliers);
    Ok(Json(CameraStatus::of(camera)))
}
