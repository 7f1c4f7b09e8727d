//! Device-facing contracts: screen capture and input primitives.
//!
//! The control loop only talks to a phone through these two traits. The
//! [`crate::adb`] module provides the implementations used in production.

use std::fmt;

use thiserror::Error;

/// Resolution assumed when the device reports nothing usable.
pub const DEFAULT_RESOLUTION: Resolution = Resolution {
    width: 1080,
    height: 2400,
};

/// Display resolution in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One captured screen plus the resolution it was captured at.
///
/// Produced fresh for every step and owned by that step only.
#[derive(Debug, Clone)]
pub struct Observation {
    /// Raw PNG bytes as returned by the capture transport.
    pub image: Vec<u8>,
    pub resolution: Resolution,
}

/// A single operation understood by the device-control transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Primitive {
    Tap {
        x: i32,
        y: i32,
    },
    Swipe {
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        duration_ms: u64,
    },
    /// Literal text; escaping is the transport's business.
    Text(String),
    KeyEvent(i32),
    LaunchApp(String),
}

impl Primitive {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Primitive::Tap { .. } => "tap",
            Primitive::Swipe { .. } => "swipe",
            Primitive::Text(_) => "text",
            Primitive::KeyEvent(_) => "keyevent",
            Primitive::LaunchApp(_) => "launch",
        }
    }
}

/// Device-control transport errors.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to spawn transport command: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Transport command failed: {0}")]
    CommandFailed(String),
}

/// Capture transport errors.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Screenshot command failed: {0}")]
    CommandFailed(String),
    #[error("Screen is protected and cannot be captured")]
    Protected,
    #[error("Captured data is not a PNG image ({0} bytes)")]
    InvalidImage(usize),
    #[error("Failed to query display size: {0}")]
    Resolution(String),
}

/// Executes input primitives on the device.
///
/// Each call is one attempt; implementations must not retry internally.
pub trait DeviceTransport: Send + Sync {
    fn execute(&self, primitive: &Primitive) -> Result<String, TransportError>;
}

/// Produces screenshots and the display resolution.
pub trait CaptureProvider: Send + Sync {
    /// Queried once per run, at session start.
    fn resolution(&self) -> Result<Resolution, CaptureError>;

    /// Current screen contents as PNG bytes.
    fn screenshot(&self) -> Result<Vec<u8>, CaptureError>;
}
