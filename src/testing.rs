//! Fakes shared by unit tests.

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::Mutex;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use crate::agent::ProgressReporter;
use crate::device::{
    CaptureError, CaptureProvider, DeviceTransport, Primitive, Resolution, TransportError,
};
use crate::model::{Decision, Policy, PolicyError};
use crate::vision::NormalizedImage;

/// A deterministic, non-uniform PNG.
pub fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 7 % 256) as u8,
            (y * 13 % 256) as u8,
            ((x ^ y) * 3 % 256) as u8,
        ])
    });
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buffer, ImageFormat::Png)
        .expect("encode sample png");
    buffer.into_inner()
}

/// Records every primitive; optionally fails all of them.
#[derive(Default)]
pub struct RecordingTransport {
    pub calls: Mutex<Vec<Primitive>>,
    pub fail: bool,
}

impl RecordingTransport {
    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn calls(&self) -> Vec<Primitive> {
        self.calls.lock().unwrap().clone()
    }
}

impl DeviceTransport for RecordingTransport {
    fn execute(&self, primitive: &Primitive) -> Result<String, TransportError> {
        self.calls.lock().unwrap().push(primitive.clone());
        if self.fail {
            Err(TransportError::CommandFailed("device offline".into()))
        } else {
            Ok(String::new())
        }
    }
}

/// Serves the same synthetic screenshot every time, or fails.
pub struct FakeCapture {
    pub resolution: Resolution,
    pub fail_screenshot: bool,
    pub fail_resolution: bool,
    pub corrupt: bool,
    pub shots: Mutex<u32>,
}

impl FakeCapture {
    pub fn new() -> Self {
        Self {
            resolution: Resolution::new(1080, 2400),
            fail_screenshot: false,
            fail_resolution: false,
            corrupt: false,
            shots: Mutex::new(0),
        }
    }

    pub fn shots(&self) -> u32 {
        *self.shots.lock().unwrap()
    }
}

impl CaptureProvider for FakeCapture {
    fn resolution(&self) -> Result<Resolution, CaptureError> {
        if self.fail_resolution {
            return Err(CaptureError::Resolution("no device".into()));
        }
        Ok(self.resolution)
    }

    fn screenshot(&self) -> Result<Vec<u8>, CaptureError> {
        *self.shots.lock().unwrap() += 1;
        if self.fail_screenshot {
            return Err(CaptureError::CommandFailed("device offline".into()));
        }
        if self.corrupt {
            return Ok(b"\x89PNG\r\n\x1a\ntruncated".to_vec());
        }
        Ok(sample_png(108, 240))
    }
}

/// Replays canned replies through the real reply parser.
///
/// When the script runs out the last reply repeats.
pub struct ScriptedPolicy {
    replies: Mutex<VecDeque<String>>,
    last: Mutex<Option<String>>,
    pub asked: Mutex<Vec<(String, u32)>>,
}

impl ScriptedPolicy {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            last: Mutex::new(None),
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> Vec<(String, u32)> {
        self.asked.lock().unwrap().clone()
    }
}

#[async_trait]
impl Policy for ScriptedPolicy {
    async fn ask(
        &self,
        goal: &str,
        step: u32,
        _image: &NormalizedImage,
    ) -> Result<Decision, PolicyError> {
        self.asked.lock().unwrap().push((goal.to_string(), step));
        let reply = {
            let mut replies = self.replies.lock().unwrap();
            let mut last = self.last.lock().unwrap();
            if let Some(next) = replies.pop_front() {
                *last = Some(next);
            }
            last.clone()
        };
        match reply {
            Some(text) if text == "<transport-error>" => {
                Err(PolicyError::Transport("connection refused".into()))
            }
            Some(text) => crate::model::parse_decision(&text),
            None => Err(PolicyError::Transport("no scripted reply".into())),
        }
    }
}

/// Keeps every report for later inspection.
#[derive(Default)]
pub struct RecordingReporter {
    pub reports: Mutex<Vec<(String, bool)>>,
}

impl RecordingReporter {
    /// `(text, had_image)` pairs in call order.
    pub fn reports(&self) -> Vec<(String, bool)> {
        self.reports.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.reports().into_iter().map(|(t, _)| t).collect()
    }
}

#[async_trait]
impl ProgressReporter for RecordingReporter {
    async fn report(&self, text: &str, image: Option<&[u8]>) {
        self.reports
            .lock()
            .unwrap()
            .push((text.to_string(), image.is_some()));
    }
}
