//! Action dispatch: validate one action and run it on the device.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;

use super::command::{ActionCommand, ActionName};
use crate::device::{DeviceTransport, Primitive, Resolution, TransportError};
use crate::vision::{parse_relative_value, resolve, CoordinateError};

/// Default pause for `wait` when no duration is given.
pub const DEFAULT_WAIT_SECS: f64 = 2.0;

/// Message used when `finish` carries none.
pub const DEFAULT_FINISH_MESSAGE: &str = "Goal reached.";

/// Longest pause a single `wait` may request.
pub const MAX_WAIT_SECS: f64 = 60.0;

/// Duration of the scroll swipe gesture.
pub const SCROLL_DURATION_MS: u64 = 500;

/// Dispatch errors.
///
/// None of these end a run; the next observation shows the policy what happened.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),
    #[error("Invalid parameters for {action}: {reason}")]
    InvalidParams { action: ActionName, reason: String },
    #[error("Device transport failed: {0}")]
    Transport(#[from] TransportError),
    #[error("Bad coordinate for {action}: {source}")]
    Coordinate {
        action: ActionName,
        #[source]
        source: CoordinateError,
    },
}

impl DispatchError {
    fn invalid(action: ActionName, reason: impl Into<String>) -> Self {
        Self::InvalidParams {
            action,
            reason: reason.into(),
        }
    }
}

/// What a successful dispatch did.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatched {
    /// A primitive ran on the device; `output` is whatever it printed.
    Performed { primitive: Primitive, output: String },
    /// Nothing was sent; the caller should hold off this long.
    Waited(Duration),
    /// The task is complete.
    Finished { message: String },
}

/// Executes catalog actions against a [`DeviceTransport`].
///
/// Holds the resolution captured at session start for relative clicks and
/// scroll gestures. Every dispatch is at most one transport call.
pub struct ActionDispatcher {
    transport: Arc<dyn DeviceTransport>,
    resolution: Resolution,
}

impl ActionDispatcher {
    /// Create a dispatcher for a device whose screen is `resolution`.
    pub fn new(transport: Arc<dyn DeviceTransport>, resolution: Resolution) -> Self {
        Self {
            transport,
            resolution,
        }
    }

    /// Dispatch an action by wire name.
    pub fn dispatch(
        &self,
        name: &str,
        params: &Map<String, Value>,
    ) -> Result<Dispatched, DispatchError> {
        let action: ActionName = name
            .parse()
            .map_err(|_| DispatchError::UnknownAction(name.to_string()))?;
        self.dispatch_action(action, params)
    }

    /// Dispatch an already-parsed command.
    pub fn dispatch_command(&self, command: &ActionCommand) -> Result<Dispatched, DispatchError> {
        self.dispatch_action(command.name, &command.params)
    }

    fn dispatch_action(
        &self,
        action: ActionName,
        params: &Map<String, Value>,
    ) -> Result<Dispatched, DispatchError> {
        match action {
            ActionName::Click => self.handle_click(params),
            ActionName::Type => self.handle_type(params),
            ActionName::Scroll => self.handle_scroll(params),
            ActionName::OpenApp => self.handle_open_app(params),
            ActionName::PressKey => self.handle_press_key(params),
            ActionName::Wait => Ok(Self::handle_wait(params)),
            ActionName::Finish => Ok(Self::handle_finish(params)),
        }
    }

    fn perform(&self, primitive: Primitive) -> Result<Dispatched, DispatchError> {
        let output = self.transport.execute(&primitive)?;
        Ok(Dispatched::Performed { primitive, output })
    }

    fn handle_click(&self, params: &Map<String, Value>) -> Result<Dispatched, DispatchError> {
        let action = ActionName::Click;

        // a relative `point` is only used when absolute coordinates are absent
        if !params.contains_key("x") && !params.contains_key("y") {
            if let Some(point) = params.get("point") {
                let relative = parse_relative_value(point)
                    .map_err(|source| DispatchError::Coordinate { action, source })?;
                let abs = resolve(relative, self.resolution);
                tracing::debug!(?relative, ?abs, "resolved relative click");
                return self.perform(Primitive::Tap { x: abs.x, y: abs.y });
            }
        }

        let x = int_param(action, params, "x")?;
        let y = int_param(action, params, "y")?;
        let x = i32::try_from(x).map_err(|_| DispatchError::invalid(action, "x out of range"))?;
        let y = i32::try_from(y).map_err(|_| DispatchError::invalid(action, "y out of range"))?;
        self.perform(Primitive::Tap { x, y })
    }

    fn handle_type(&self, params: &Map<String, Value>) -> Result<Dispatched, DispatchError> {
        let text = str_param(ActionName::Type, params, "text")?;
        self.perform(Primitive::Text(text.to_string()))
    }

    fn handle_scroll(&self, params: &Map<String, Value>) -> Result<Dispatched, DispatchError> {
        let direction = match params.get("direction").and_then(Value::as_str) {
            Some("up") => ScrollDirection::Up,
            Some("down") | None => ScrollDirection::Down,
            Some(other) => {
                tracing::warn!(direction = other, "unknown scroll direction, using down");
                ScrollDirection::Down
            }
        };
        self.perform(scroll_gesture(direction, self.resolution))
    }

    fn handle_open_app(&self, params: &Map<String, Value>) -> Result<Dispatched, DispatchError> {
        let package = str_param(ActionName::OpenApp, params, "package_name")?;
        if package.trim().is_empty() {
            return Err(DispatchError::invalid(
                ActionName::OpenApp,
                "package_name is empty",
            ));
        }
        self.perform(Primitive::LaunchApp(package.trim().to_string()))
    }

    fn handle_press_key(&self, params: &Map<String, Value>) -> Result<Dispatched, DispatchError> {
        let action = ActionName::PressKey;
        let keycode = int_param(action, params, "keycode")?;
        let keycode = i32::try_from(keycode)
            .map_err(|_| DispatchError::invalid(action, "keycode out of range"))?;
        self.perform(Primitive::KeyEvent(keycode))
    }

    fn handle_wait(params: &Map<String, Value>) -> Dispatched {
        let seconds = match params.get("seconds") {
            None => DEFAULT_WAIT_SECS,
            Some(value) => number(value).unwrap_or_else(|| {
                tracing::warn!(seconds = %value, "non-numeric wait, using default");
                DEFAULT_WAIT_SECS
            }),
        };

        if seconds.is_nan() || seconds <= 0.0 {
            return Dispatched::Waited(Duration::ZERO);
        }
        if seconds > MAX_WAIT_SECS {
            tracing::warn!(seconds, max = MAX_WAIT_SECS, "wait too long, capping");
        }
        Dispatched::Waited(Duration::from_secs_f64(seconds.min(MAX_WAIT_SECS)))
    }

    fn handle_finish(params: &Map<String, Value>) -> Dispatched {
        let message = params
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(DEFAULT_FINISH_MESSAGE);
        Dispatched::Finished {
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScrollDirection {
    Up,
    Down,
}

/// Vertical swipe through the middle of the screen, between 75% and 25% of
/// its height. Scrolling down drags the content upward.
fn scroll_gesture(direction: ScrollDirection, resolution: Resolution) -> Primitive {
    let x = (resolution.width / 2) as i32;
    let low = (resolution.height as f64 * 0.75).round() as i32;
    let high = (resolution.height as f64 * 0.25).round() as i32;
    let (y1, y2) = match direction {
        ScrollDirection::Down => (low, high),
        ScrollDirection::Up => (high, low),
    };
    Primitive::Swipe {
        x1: x,
        y1,
        x2: x,
        y2,
        duration_ms: SCROLL_DURATION_MS,
    }
}

fn str_param<'a>(
    action: ActionName,
    params: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a str, DispatchError> {
    match params.get(key) {
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(other) => Err(DispatchError::invalid(
            action,
            format!("{} must be a string, got {}", key, other),
        )),
        None => Err(DispatchError::invalid(action, format!("missing {}", key))),
    }
}

/// Integers may arrive as JSON integers, integral floats or numeric strings.
fn int_param(
    action: ActionName,
    params: &Map<String, Value>,
    key: &str,
) -> Result<i64, DispatchError> {
    let value = params
        .get(key)
        .ok_or_else(|| DispatchError::invalid(action, format!("missing {}", key)))?;

    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    parsed.ok_or_else(|| {
        DispatchError::invalid(action, format!("{} is not an integer: {}", key, value))
    })
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
