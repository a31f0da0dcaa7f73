//! Outbound (controller → camera) request rewriting
//!
//! Move commands scale their deltas and drive the device's motion state before the
//! request is forwarded. Documents are never invented: a request without usable
//! axis values goes out exactly as it came in.

use quick_xml::events::{BytesStart, Event};

use crate::device::{Device, Multipliers};
use crate::error::SoapError;
use crate::operation::PtzOperation;
use crate::soap::{attribute, with_attributes, Rewriter, TT_NS};

/// Rewrite a request for `operation` and apply its motion-state side effects
pub fn transform_request(operation: &PtzOperation, device: &Device, body: &str) -> String {
    tracing::debug!(
        "[{}] Modifying request for operation: {}",
        device.name(),
        operation
    );

    match operation {
        PtzOperation::RelativeMove => match scale_relative_move(device, body) {
            Ok(Some(rewritten)) => {
                device.motion().set_moving();
                rewritten
            }
            Ok(None) => body.to_string(),
            Err(e) => {
                tracing::warn!(
                    "[{}] Could not rewrite RelativeMove request, forwarding as-is: {}",
                    device.name(),
                    e
                );
                body.to_string()
            }
        },
        PtzOperation::GoToPreset | PtzOperation::ContinuousMove | PtzOperation::AbsoluteMove => {
            device.motion().set_moving();
            body.to_string()
        }
        PtzOperation::Stop => {
            device.motion().set_idle();
            body.to_string()
        }
        PtzOperation::GetCapabilities
        | PtzOperation::GetProfiles
        | PtzOperation::GetConfiguration
        | PtzOperation::GetConfigurationOptions
        | PtzOperation::GetStatus
        | PtzOperation::GetPresets
        | PtzOperation::GetServiceCapabilities
        | PtzOperation::Other(_) => body.to_string(),
    }
}

/// Scale the first `tt:PanTilt` delta. `None` when there is nothing to scale.
fn scale_relative_move(device: &Device, body: &str) -> Result<Option<String>, SoapError> {
    let multipliers = device.multipliers();
    let mut rw = Rewriter::new(body);
    let mut seen = false;
    let mut changed = false;

    while let Some((name, event)) = rw.next()? {
        let target = !seen && name.as_ref().is_some_and(|n| n.is(TT_NS, "PanTilt"));
        let replacement = match &event {
            Event::Start(e) | Event::Empty(e) if target => {
                seen = true;
                scaled_pan_tilt(device, multipliers, e)
            }
            _ => None,
        };

        match (replacement, event) {
            (Some(scaled), Event::Start(_)) => {
                rw.write(Event::Start(scaled))?;
                changed = true;
            }
            (Some(scaled), _) => {
                rw.write(Event::Empty(scaled))?;
                changed = true;
            }
            (None, event) => rw.write(event)?,
        }
    }

    if !seen {
        tracing::debug!("[{}] RelativeMove without PanTilt delta", device.name());
    }
    if !changed {
        return Ok(None);
    }
    rw.finish().map(Some)
}

fn scaled_pan_tilt(
    device: &Device,
    multipliers: Multipliers,
    e: &BytesStart<'_>,
) -> Option<BytesStart<'static>> {
    let (Some(x_orig), Some(y_orig)) = (attribute(e, "x"), attribute(e, "y")) else {
        tracing::debug!("[{}] RelativeMove PanTilt is missing an axis", device.name());
        return None;
    };
    let (Some(x), Some(y)) = (parse_axis(&x_orig), parse_axis(&y_orig)) else {
        tracing::warn!(
            "[{}] RelativeMove PanTilt has non-numeric axis x={} y={}",
            device.name(),
            x_orig,
            y_orig
        );
        return None;
    };

    let (new_x, new_y) = multipliers.apply(x, y);
    let (new_x, new_y) = (format_decimal(new_x), format_decimal(new_y));
    tracing::info!(
        "[{}] Changed x={} to {} and y={} to {}",
        device.name(),
        x_orig,
        new_x,
        y_orig,
        new_y
    );

    Some(with_attributes(e, &[("x", new_x.as_str()), ("y", new_y.as_str())]))
}

fn parse_axis(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Six significant digits like printf `%g`, without trailing zeros or exponent form
pub(crate) fn format_decimal(value: f64) -> String {
    let rounded = format!("{:.5e}", value).parse::<f64>().unwrap_or(value);
    if rounded == 0.0 {
        return "0".to_string();
    }
    rounded.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::MotionStatus;
    use crate::soap::Events;
    use crate::testutil::{device, device_with_timeout, envelope, relative_move};

    /// (x, y) of the first tt:PanTilt in `xml`
    fn pan_tilt(xml: &str) -> (String, String) {
        let mut events = Events::new(xml);
        while let Some((name, event)) = events.next().unwrap() {
            if let (Some(name), Event::Start(e) | Event::Empty(e)) = (name, event) {
                if name.is(TT_NS, "PanTilt") {
                    return (attribute(&e, "x").unwrap(), attribute(&e, "y").unwrap());
                }
            }
        }
        panic!("no PanTilt in document");
    }

    #[tokio::test]
    async fn test_relative_move_scales_pan() {
        let cam = device(0.5, 1.0);
        let out = transform_request(&PtzOperation::RelativeMove, &cam, &relative_move("0.8", "-0.2"));

        assert_eq!(pan_tilt(&out), ("0.4".to_string(), "-0.2".to_string()));
        assert!(out.contains("TranslationGenericSpace"));
        assert_eq!(cam.motion().status(), MotionStatus::Moving);
    }

    #[tokio::test]
    async fn test_relative_move_inverts_axis() {
        let cam = device(-1.0, 1.0);
        let out = transform_request(&PtzOperation::RelativeMove, &cam, &relative_move("0.8", "0"));

        assert_eq!(pan_tilt(&out), ("-0.8".to_string(), "0".to_string()));
    }

    #[tokio::test]
    async fn test_relative_move_clamps() {
        let cam = device(1.0, 0.5);
        let out = transform_request(&PtzOperation::RelativeMove, &cam, &relative_move("1.7", "-3"));

        assert_eq!(pan_tilt(&out), ("1".to_string(), "-1".to_string()));
    }

    #[tokio::test]
    async fn test_scaled_value_matches_clamped_product() {
        let cam = device(-0.3, 0.7);
        for (x, y) in [(0.25, -0.5), (1.0, 1.0), (-0.9, 0.05)] {
            let out = transform_request(
                &PtzOperation::RelativeMove,
                &cam,
                &relative_move(&x.to_string(), &y.to_string()),
            );
            let (new_x, new_y) = pan_tilt(&out);
            let new_x: f64 = new_x.parse().unwrap();
            let new_y: f64 = new_y.parse().unwrap();
            assert!((new_x - (x * -0.3_f64).clamp(-1.0, 1.0)).abs() < 1e-9);
            assert!((new_y - (y * 0.7_f64).clamp(-1.0, 1.0)).abs() < 1e-9);
        }
    }

    #[tokio::test]
    async fn test_relative_move_without_pan_tilt_is_untouched() {
        let cam = device(0.5, 0.5);
        let request = envelope(
            r#"<tptz:RelativeMove><tptz:ProfileToken>p</tptz:ProfileToken><tptz:Translation><tt:Zoom x="0.1"/></tptz:Translation></tptz:RelativeMove>"#,
        );

        let out = transform_request(&PtzOperation::RelativeMove, &cam, &request);

        assert_eq!(out, request);
        assert_eq!(cam.motion().status(), MotionStatus::Idle);
        assert!(!cam.motion().timer_armed());
    }

    #[tokio::test]
    async fn test_relative_move_partial_axes_is_untouched() {
        let cam = device(0.5, 0.5);
        let request = envelope(
            r#"<tptz:RelativeMove><tptz:Translation><tt:PanTilt x="0.5"/></tptz:Translation></tptz:RelativeMove>"#,
        );

        assert_eq!(transform_request(&PtzOperation::RelativeMove, &cam, &request), request);
        assert_eq!(cam.motion().status(), MotionStatus::Idle);

        let request = relative_move("abc", "0.1");
        assert_eq!(transform_request(&PtzOperation::RelativeMove, &cam, &request), request);
        assert_eq!(cam.motion().status(), MotionStatus::Idle);
    }

    #[tokio::test]
    async fn test_malformed_document_is_forwarded() {
        let cam = device(0.5, 0.5);
        let request = "<s:Envelope><tt:PanTilt x=\"1\" y=\"1\"></s:Body>";

        assert_eq!(transform_request(&PtzOperation::RelativeMove, &cam, request), request);
        assert_eq!(cam.motion().status(), MotionStatus::Idle);
    }

    #[tokio::test]
    async fn test_move_commands_set_moving_and_stop_sets_idle() {
        let cam = device(1.0, 1.0);
        let body = envelope("<tptz:GotoPreset/>");

        for op in [
            PtzOperation::GoToPreset,
            PtzOperation::ContinuousMove,
            PtzOperation::AbsoluteMove,
        ] {
            cam.motion().set_idle();
            assert_eq!(transform_request(&op, &cam, &body), body);
            assert_eq!(cam.motion().status(), MotionStatus::Moving);
            assert!(cam.motion().timer_armed());
        }

        assert_eq!(transform_request(&PtzOperation::Stop, &cam, &body), body);
        assert_eq!(cam.motion().status(), MotionStatus::Idle);
        assert!(!cam.motion().timer_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_move_timeout_reverts_after_relative_move() {
        let cam = device_with_timeout(0.5, 0.5, std::time::Duration::ZERO);

        let out = transform_request(&PtzOperation::RelativeMove, &cam, &relative_move("0.8", "0.8"));
        assert_eq!(pan_tilt(&out), ("0.4".to_string(), "0.4".to_string()));
        assert_eq!(cam.motion().status(), MotionStatus::Moving);

        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        assert_eq!(cam.motion().status(), MotionStatus::Idle);
    }

    #[test]
    fn test_relative_move_without_runtime() {
        let cam = device(0.5, 0.5);

        let out = transform_request(&PtzOperation::RelativeMove, &cam, &relative_move("0.8", "0.8"));

        assert_eq!(pan_tilt(&out), ("0.4".to_string(), "0.4".to_string()));
        assert_eq!(cam.motion().status(), MotionStatus::Moving);
        assert!(!cam.motion().timer_armed());
    }

    #[tokio::test]
    async fn test_queries_pass_through_without_state_change() {
        let cam = device(0.5, 0.5);
        let body = relative_move("0.8", "0.8");

        for op in [
            PtzOperation::GetStatus,
            PtzOperation::GetPresets,
            PtzOperation::Other("GetNodes".to_string()),
        ] {
            assert_eq!(transform_request(&op, &cam, &body), body);
        }
        assert_eq!(cam.motion().status(), MotionStatus::Idle);
    }

    #[test]
    fn test_format_decimal() {
        assert_eq!(format_decimal(0.4), "0.4");
        assert_eq!(format_decimal(1.0), "1");
        assert_eq!(format_decimal(-1.0), "-1");
        assert_eq!(format_decimal(0.1 * 0.3), "0.03");
        assert_eq!(format_decimal(-0.0), "0");
        assert_eq!(format_decimal(0.123456789), "0.123457");
        assert_eq!(format_decimal(0.0000001), "0.0000001");
    }
}
