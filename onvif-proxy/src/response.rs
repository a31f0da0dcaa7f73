//! Inbound (camera → controller) response rewriting
//!
//! The proxy advertises capabilities the camera lacks, reports its own motion
//! status instead of the camera's, and hides RelativeMove faults. Any response
//! whose expected structure is missing is returned unchanged.

use quick_xml::events::{BytesText, Event};

use crate::device::Device;
use crate::error::SoapError;
use crate::motion::PanTiltPosition;
use crate::operation::PtzOperation;
use crate::soap::{
    attribute, prefix_of, with_attributes, ElementName, ElementPath, Events, Rewriter, TPTZ_NS,
    TT_NS,
};
use crate::templates;

/// Replace the camera's own ONVIF base URL with the proxy's everywhere in `response`
pub fn rewrite_endpoint_urls(device: &Device, response: &str) -> String {
    let camera_url = device.camera().base_url();
    let proxy_url = device.proxy().base_url();
    if camera_url == proxy_url || !response.contains(&camera_url) {
        return response.to_string();
    }
    response.replace(&camera_url, &proxy_url)
}

/// Rewrite a camera response for `operation`, reading and updating motion state
pub fn transform_response(operation: &PtzOperation, device: &Device, body: &str) -> String {
    tracing::debug!(
        "[{}] Modifying response for operation: {}",
        device.name(),
        operation
    );

    let result = match operation {
        PtzOperation::GetConfiguration => {
            tracing::warn!(
                "[{}] GetConfiguration response modification not implemented yet",
                device.name()
            );
            Ok(None)
        }
        PtzOperation::GetConfigurationOptions => add_fov_space(device, body),
        PtzOperation::GetStatus => report_motion_status(device, body),
        PtzOperation::GetServiceCapabilities => advertise_status_support(device, body),
        PtzOperation::RelativeMove => suppress_fault(device, body),
        PtzOperation::GetCapabilities
        | PtzOperation::GetProfiles
        | PtzOperation::GetPresets
        | PtzOperation::GoToPreset
        | PtzOperation::ContinuousMove
        | PtzOperation::AbsoluteMove
        | PtzOperation::Stop
        | PtzOperation::Other(_) => Ok(None),
    };

    match result {
        Ok(Some(rewritten)) => rewritten,
        Ok(None) => body.to_string(),
        Err(e) => {
            tracing::warn!(
                "[{}] Could not rewrite {} response, returning it unchanged: {}",
                device.name(),
                operation,
                e
            );
            body.to_string()
        }
    }
}

/// What the first `tt:Spaces` element of a GetConfigurationOptions response holds
#[derive(Debug, Default)]
struct SpacesSurvey {
    found: bool,
    prefix: String,
    relative_spaces: usize,
    has_fov: bool,
}

fn survey_spaces(body: &str) -> Result<SpacesSurvey, SoapError> {
    let mut survey = SpacesSurvey::default();
    let mut events = Events::new(body);
    let mut path = ElementPath::default();
    let mut spaces_depth: Option<usize> = None;
    let mut in_uri = false;

    while let Some((name, event)) = events.next()? {
        match (name, event) {
            (Some(name), Event::Start(e)) => {
                let depth = path.depth();
                if !survey.found && name.is(TT_NS, "Spaces") {
                    survey.found = true;
                    survey.prefix = prefix_of(&e);
                    spaces_depth = Some(depth);
                } else if spaces_depth.map(|d| d + 1) == Some(depth)
                    && name.is(TT_NS, "RelativePanTiltTranslationSpace")
                {
                    survey.relative_spaces += 1;
                } else if spaces_depth.map(|d| d + 2) == Some(depth)
                    && name.is(TT_NS, "URI")
                    && path
                        .parent()
                        .is_some_and(|p| p.is(TT_NS, "RelativePanTiltTranslationSpace"))
                {
                    in_uri = true;
                }
                path.push(name);
            }
            (Some(name), Event::Empty(e)) => {
                if !survey.found && name.is(TT_NS, "Spaces") {
                    survey.found = true;
                    survey.prefix = prefix_of(&e);
                    break;
                }
                if spaces_depth.map(|d| d + 1) == Some(path.depth())
                    && name.is(TT_NS, "RelativePanTiltTranslationSpace")
                {
                    survey.relative_spaces += 1;
                }
            }
            (Some(_), Event::End(_)) => {
                in_uri = false;
                path.pop();
                if spaces_depth == Some(path.depth()) {
                    break;
                }
            }
            (None, Event::Text(t)) if in_uri => {
                if t.unescape()?.contains("TranslationSpaceFov") {
                    survey.has_fov = true;
                }
            }
            _ => {}
        }
    }

    Ok(survey)
}

/// Insert a field-of-view relative translation space after the last existing one
fn add_fov_space(device: &Device, body: &str) -> Result<Option<String>, SoapError> {
    let survey = survey_spaces(body)?;
    if !survey.found {
        tracing::warn!(
            "[{}] Could not find Spaces element in GetConfigurationOptions response",
            device.name()
        );
        return Ok(None);
    }
    if survey.has_fov {
        tracing::info!("[{}] FOV space already exists, skipping", device.name());
        return Ok(None);
    }

    let fov = templates::fov_translation_space(&survey.prefix);
    let mut remaining = survey.relative_spaces;
    let mut rw = Rewriter::new(body);
    let mut path = ElementPath::default();
    let mut spaces_depth: Option<usize> = None;
    let mut done = false;

    while let Some((name, event)) = rw.next()? {
        match (name, event) {
            (Some(name), Event::Start(e)) => {
                if !done && spaces_depth.is_none() && name.is(TT_NS, "Spaces") {
                    spaces_depth = Some(path.depth());
                }
                path.push(name);
                rw.write(Event::Start(e))?;
            }
            (Some(name), Event::Empty(e)) => {
                if !done && spaces_depth.is_none() && name.is(TT_NS, "Spaces") {
                    let end = e.to_end().into_owned();
                    rw.write(Event::Start(e))?;
                    rw.write_raw(&fov);
                    rw.write(Event::End(end))?;
                    done = true;
                    continue;
                }
                let closes_relative = !done
                    && spaces_depth.map(|d| d + 1) == Some(path.depth())
                    && name.is(TT_NS, "RelativePanTiltTranslationSpace");
                rw.write(Event::Empty(e))?;
                if closes_relative {
                    remaining = remaining.saturating_sub(1);
                    if remaining == 0 {
                        rw.write_raw(&fov);
                        done = true;
                    }
                }
            }
            (Some(_), Event::End(e)) => {
                let closed = path.pop();
                let depth = path.depth();
                if !done && spaces_depth == Some(depth) {
                    // No relative space to follow; append as the last child
                    rw.write_raw(&fov);
                    done = true;
                    rw.write(Event::End(e))?;
                    continue;
                }
                rw.write(Event::End(e))?;
                let closes_relative = !done
                    && spaces_depth.map(|d| d + 1) == Some(depth)
                    && closed.is_some_and(|n| n.is(TT_NS, "RelativePanTiltTranslationSpace"));
                if closes_relative {
                    remaining = remaining.saturating_sub(1);
                    if remaining == 0 {
                        rw.write_raw(&fov);
                        done = true;
                    }
                }
            }
            (_, event) => rw.write(event)?,
        }
    }

    tracing::info!(
        "[{}] Added FOV space to GetConfigurationOptions",
        device.name()
    );
    rw.finish().map(Some)
}

/// What a GetStatus response reports
#[derive(Debug, Default)]
struct StatusSurvey {
    ptz_status: bool,
    move_status: bool,
    position: Option<PanTiltPosition>,
    position_seen: bool,
}

fn survey_status(body: &str) -> Result<StatusSurvey, SoapError> {
    let mut survey = StatusSurvey::default();
    let mut events = Events::new(body);
    let mut path = ElementPath::default();

    while let Some((name, event)) = events.next()? {
        let (name, e, is_start) = match (name, event) {
            (Some(name), Event::Start(e)) => (name, e, true),
            (Some(name), Event::Empty(e)) => (name, e, false),
            (Some(_), Event::End(_)) => {
                path.pop();
                continue;
            }
            _ => continue,
        };

        if name.is(TPTZ_NS, "PTZStatus") {
            survey.ptz_status = true;
        } else if path.inside(TPTZ_NS, "PTZStatus") && name.is(TT_NS, "PanTilt") {
            match path.parent() {
                Some(p) if p.is(TT_NS, "MoveStatus") => survey.move_status = true,
                Some(p) if p.is(TT_NS, "Position") && !survey.position_seen => {
                    survey.position_seen = true;
                    survey.position = match (attribute(&e, "x"), attribute(&e, "y")) {
                        (Some(x), Some(y)) => Some(PanTiltPosition { x, y }),
                        _ => None,
                    };
                }
                _ => {}
            }
        }

        if is_start {
            path.push(name);
        }
    }

    Ok(survey)
}

fn is_move_status_pan_tilt(path: &ElementPath, name: &ElementName) -> bool {
    name.is(TT_NS, "PanTilt")
        && path.inside(TPTZ_NS, "PTZStatus")
        && path.parent().is_some_and(|p| p.is(TT_NS, "MoveStatus"))
}

/// Write the proxy's motion status into MoveStatus/PanTilt and track the position
fn report_motion_status(device: &Device, body: &str) -> Result<Option<String>, SoapError> {
    let survey = survey_status(body)?;
    if !survey.ptz_status {
        tracing::warn!(
            "[{}] Could not find PTZStatus element in GetStatus response",
            device.name()
        );
        return Ok(None);
    }
    if !survey.move_status {
        tracing::warn!(
            "[{}] Could not find MoveStatus element in GetStatus response",
            device.name()
        );
        return Ok(None);
    }
    let status = if !survey.position_seen {
        // Nothing to compare; the remembered position is kept for the next poll
        tracing::warn!(
            "[{}] GetStatus response has no pan/tilt position",
            device.name()
        );
        device.motion().status()
    } else {
        if survey.position.is_none() {
            tracing::warn!(
                "[{}] GetStatus response has an incomplete pan/tilt position",
                device.name()
            );
        }
        device.motion().observe_position(survey.position)
    };
    let text = status.as_str();

    let mut rw = Rewriter::new(body);
    let mut path = ElementPath::default();
    let mut replacing_depth: Option<usize> = None;
    let mut done = false;

    while let Some((name, event)) = rw.next()? {
        match (name, event) {
            (Some(name), Event::Start(e)) => {
                let target = !done && is_move_status_pan_tilt(&path, &name);
                path.push(name);
                rw.write(Event::Start(e))?;
                if target {
                    done = true;
                    replacing_depth = Some(path.depth());
                    rw.write(Event::Text(BytesText::new(text)))?;
                }
            }
            (Some(name), Event::Empty(e)) => {
                if !done && is_move_status_pan_tilt(&path, &name) {
                    done = true;
                    let end = e.to_end().into_owned();
                    rw.write(Event::Start(e))?;
                    rw.write(Event::Text(BytesText::new(text)))?;
                    rw.write(Event::End(end))?;
                } else {
                    rw.write(Event::Empty(e))?;
                }
            }
            (Some(_), Event::End(e)) => {
                if replacing_depth == Some(path.depth()) {
                    replacing_depth = None;
                }
                path.pop();
                rw.write(Event::End(e))?;
            }
            (None, Event::Text(_) | Event::CData(_)) if replacing_depth.is_some() => {}
            (_, event) => rw.write(event)?,
        }
    }

    tracing::info!("[{}] Move status set to: {}", device.name(), text);
    rw.finish().map(Some)
}

/// Claim MoveStatus and StatusPosition support, which the proxy now provides
fn advertise_status_support(device: &Device, body: &str) -> Result<Option<String>, SoapError> {
    let mut rw = Rewriter::new(body);
    let mut done = false;

    while let Some((name, event)) = rw.next()? {
        let target = !done && name.as_ref().is_some_and(|n| n.is(TPTZ_NS, "Capabilities"));
        match event {
            Event::Start(e) if target => {
                done = true;
                rw.write(Event::Start(with_attributes(&e, STATUS_CAPABILITIES)))?;
            }
            Event::Empty(e) if target => {
                done = true;
                rw.write(Event::Empty(with_attributes(&e, STATUS_CAPABILITIES)))?;
            }
            event => rw.write(event)?,
        }
    }

    if !done {
        tracing::warn!(
            "[{}] Could not find Capabilities element in GetServiceCapabilities response",
            device.name()
        );
        return Ok(None);
    }
    tracing::info!(
        "[{}] Modified Capabilities to include MoveStatus and StatusPosition support",
        device.name()
    );
    rw.finish().map(Some)
}

const STATUS_CAPABILITIES: &[(&str, &str)] = &[("MoveStatus", "true"), ("StatusPosition", "true")];

/// Replace a RelativeMove fault with an empty RelativeMoveResponse
fn suppress_fault(device: &Device, body: &str) -> Result<Option<String>, SoapError> {
    let mut rw = Rewriter::new(body);
    let mut path = ElementPath::default();
    let mut skipping = 0usize;
    let mut replaced = false;

    while let Some((name, event)) = rw.next()? {
        match (name, event) {
            (Some(name), Event::Start(e)) => {
                if skipping > 0 {
                    skipping += 1;
                } else if !replaced && is_body_fault(&path, &name) {
                    replaced = true;
                    skipping = 1;
                    rw.write_raw(templates::relative_move_response());
                } else {
                    path.push(name);
                    rw.write(Event::Start(e))?;
                }
            }
            (Some(name), Event::Empty(e)) => {
                if skipping > 0 {
                    continue;
                }
                if !replaced && is_body_fault(&path, &name) {
                    replaced = true;
                    rw.write_raw(templates::relative_move_response());
                } else {
                    rw.write(Event::Empty(e))?;
                }
            }
            (Some(_), Event::End(e)) => {
                if skipping > 0 {
                    skipping -= 1;
                } else {
                    path.pop();
                    rw.write(Event::End(e))?;
                }
            }
            (_, event) => {
                if skipping == 0 {
                    rw.write(event)?;
                }
            }
        }
    }

    if !replaced {
        return Ok(None);
    }
    tracing::info!(
        "[{}] Fixing RelativeMoveResponse fault to success",
        device.name()
    );
    rw.finish().map(Some)
}

fn is_body_fault(path: &ElementPath, name: &ElementName) -> bool {
    name.is_envelope("Fault") && path.parent().is_some_and(|p| p.is_envelope("Body"))
}
