//! Per-device motion state
//!
//! The proxy, not the camera, decides whether a camera is moving. A move command
//! marks the device MOVING and arms a reversion timer; Stop, timer expiry, or two
//! identical position reports in a row bring it back to IDLE.
//!
//! All state for one device sits behind one mutex. Devices never share a lock.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MotionStatus {
    Idle,
    Moving,
}

impl MotionStatus {
    /// Text written into ONVIF MoveStatus elements
    pub fn as_str(&self) -> &'static str {
        match self {
            MotionStatus::Idle => "IDLE",
            MotionStatus::Moving => "MOVING",
        }
    }
}

/// Pan/tilt position exactly as the camera reported it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanTiltPosition {
    pub x: String,
    pub y: String,
}

#[derive(Debug)]
struct MotionState {
    status: MotionStatus,
    last_position: Option<PanTiltPosition>,
    timer: Option<JoinHandle<()>>,
    /// Bumped on every transition; an expiring timer only acts if it still matches
    generation: u64,
}

impl MotionState {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    fn enter_idle(&mut self) {
        self.cancel_timer();
        self.generation += 1;
        self.status = MotionStatus::Idle;
    }
}

#[derive(Debug)]
struct TrackerInner {
    device: String,
    timeout: Duration,
    /// Runtime current at construction; timers fall back to it off-runtime
    runtime: Option<Handle>,
    state: Mutex<MotionState>,
}

/// Motion state store for a single device. Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct MotionTracker {
    inner: Arc<TrackerInner>,
}

impl MotionTracker {
    pub fn new(device: impl Into<String>, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                device: device.into(),
                timeout,
                runtime: Handle::try_current().ok(),
                state: Mutex::new(MotionState {
                    status: MotionStatus::Idle,
                    last_position: None,
                    timer: None,
                    generation: 0,
                }),
            }),
        }
    }

    pub fn move_timeout(&self) -> Duration {
        self.inner.timeout
    }

    pub fn status(&self) -> MotionStatus {
        self.lock().status
    }

    pub fn last_position(&self) -> Option<PanTiltPosition> {
        self.lock().last_position.clone()
    }

    /// Whether a reversion timer is currently armed
    pub fn timer_armed(&self) -> bool {
        self.lock().timer.is_some()
    }

    /// Mark the device MOVING and (re)arm the reversion timer.
    ///
    /// Any previously armed timer is cancelled first. The timer runs on the current
    /// tokio runtime, or the one the tracker was created on. Without either the
    /// device stays MOVING until Stop or a stable GetStatus poll.
    pub fn set_moving(&self) {
        let mut state = self.lock();
        state.cancel_timer();
        state.generation += 1;
        state.status = MotionStatus::Moving;

        let Some(runtime) = Handle::try_current().ok().or_else(|| self.inner.runtime.clone())
        else {
            tracing::error!(
                "[{}] Set status to MOVING without a reversion timer: no tokio runtime",
                self.inner.device
            );
            return;
        };

        let generation = state.generation;
        let timeout = self.inner.timeout;
        let weak: Weak<TrackerInner> = Arc::downgrade(&self.inner);
        state.timer = Some(runtime.spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(inner) = weak.upgrade() {
                MotionTracker { inner }.expire(generation);
            }
        }));

        tracing::info!(
            "[{}] Set status to MOVING (reverts in {:?})",
            self.inner.device,
            timeout
        );
    }

    /// Mark the device IDLE and cancel any pending reversion
    pub fn set_idle(&self) {
        self.lock().enter_idle();
        tracing::info!("[{}] Set status to IDLE", self.inner.device);
    }

    /// Record a position reported by the camera and return the status to report.
    ///
    /// Two consecutive identical reports mean the camera stopped on its own, so the
    /// device goes IDLE. Comparison is exact: no tolerance for sensor jitter. An
    /// incomplete position (`None`) clears the stored one. Replies without any
    /// position element should not be observed at all.
    pub fn observe_position(&self, position: Option<PanTiltPosition>) -> MotionStatus {
        let mut state = self.lock();

        let stationary = matches!(
            (&state.last_position, &position),
            (Some(previous), Some(current)) if previous == current
        );
        if stationary {
            if state.status == MotionStatus::Moving {
                tracing::info!(
                    "[{}] Position unchanged between polls; camera stopped",
                    self.inner.device
                );
            }
            state.enter_idle();
        }

        state.last_position = position;
        state.status
    }

    fn expire(&self, generation: u64) {
        let mut state = self.lock();
        if state.generation != generation {
            return;
        }
        // Dropping our own handle detaches; the task is already finishing
        state.timer = None;
        state.generation += 1;
        state.status = MotionStatus::Idle;
        tracing::warn!(
            "[{}] Status timeout expired; set to IDLE",
            self.inner.device
        );
    }

    fn lock(&self) -> MutexGuard<'_, MotionState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
