//! Device control over ADB.

use super::connection::AdbConnection;
use super::input::{type_text, type_text_with_keyboard, TextInputMode};
use crate::device::{DeviceTransport, Primitive, TransportError};

/// [`DeviceTransport`] backed by `adb shell input` and `monkey`.
#[derive(Debug, Clone)]
pub struct AdbDevice {
    conn: AdbConnection,
    text_mode: TextInputMode,
}

impl AdbDevice {
    /// Control the device behind `conn`, typing with `input text`.
    pub fn new(conn: AdbConnection) -> Self {
        Self {
            conn,
            text_mode: TextInputMode::default(),
        }
    }

    /// Choose how text is typed.
    pub fn with_text_mode(mut self, text_mode: TextInputMode) -> Self {
        self.text_mode = text_mode;
        self
    }

    /// Shell arguments for everything except text entry.
    fn shell_args(primitive: &Primitive) -> Vec<String> {
        match primitive {
            Primitive::Tap { x, y } => vec![
                "input".into(),
                "tap".into(),
                x.to_string(),
                y.to_string(),
            ],
            Primitive::Swipe {
                x1,
                y1,
                x2,
                y2,
                duration_ms,
            } => vec![
                "input".into(),
                "swipe".into(),
                x1.to_string(),
                y1.to_string(),
                x2.to_string(),
                y2.to_string(),
                duration_ms.to_string(),
            ],
            Primitive::KeyEvent(code) => {
                vec!["input".into(), "keyevent".into(), code.to_string()]
            }
            Primitive::LaunchApp(package) => vec![
                "monkey".into(),
                "-p".into(),
                package.clone(),
                "-c".into(),
                "android.intent.category.LAUNCHER".into(),
                "1".into(),
            ],
            Primitive::Text(_) => Vec::new(),
        }
    }
}

impl DeviceTransport for AdbDevice {
    fn execute(&self, primitive: &Primitive) -> Result<String, TransportError> {
        tracing::debug!(primitive = primitive.kind(), "adb execute");

        match primitive {
            Primitive::Text(text) => match self.text_mode {
                TextInputMode::InputText => type_text(&self.conn, text),
                TextInputMode::AdbKeyboard => type_text_with_keyboard(&self.conn, text),
            },
            Primitive::LaunchApp(package) => {
                let args = Self::shell_args(primitive);
                let args: Vec<&str> = args.iter().map(String::as_str).collect();
                let output = self.conn.shell(&args)?;
                // monkey exits 0 even when the package is missing
                if output.contains("No activities found") || output.contains("monkey aborted") {
                    return Err(TransportError::CommandFailed(format!(
                        "cannot launch {}: {}",
                        package, output
                    )));
                }
                Ok(output)
            }
            _ => {
                let args = Self::shell_args(primitive);
                let args: Vec<&str> = args.iter().map(String::as_str).collect();
                self.conn.shell(&args)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tap_args() {
        let args = AdbDevice::shell_args(&Primitive::Tap { x: 540, y: 1200 });
        assert_eq!(args, vec!["input", "tap", "540", "1200"]);
    }

    #[test]
    fn test_swipe_args() {
        let args = AdbDevice::shell_args(&Primitive::Swipe {
            x1: 540,
            y1: 1800,
            x2: 540,
            y2: 600,
            duration_ms: 500,
        });
        assert_eq!(
            args,
            vec!["input", "swipe", "540", "1800", "540", "600", "500"]
        );
    }

    #[test]
    fn test_launch_args() {
        let args = AdbDevice::shell_args(&Primitive::LaunchApp("com.android.settings".into()));
        assert_eq!(
            args,
            vec![
                "monkey",
                "-p",
                "com.android.settings",
                "-c",
                "android.intent.category.LAUNCHER",
                "1"
            ]
        );
    }

    #[test]
    fn test_keyevent_args() {
        let args = AdbDevice::shell_args(&Primitive::KeyEvent(4));
        assert_eq!(args, vec!["input", "keyevent", "4"]);
    }
}
