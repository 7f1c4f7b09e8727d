//! Screenshot utilities for capturing the Android device screen.

use super::connection::AdbConnection;
use crate::device::{CaptureError, CaptureProvider, Resolution, DEFAULT_RESOLUTION};

const PNG_SIGNATURE: &[u8; 8] = b"\x89PNG\r\n\x1a\n";

/// [`CaptureProvider`] backed by `screencap` and `wm size`.
#[derive(Debug, Clone)]
pub struct AdbCapture {
    conn: AdbConnection,
}

impl AdbCapture {
    /// Capture from the device behind `conn`.
    pub fn new(conn: AdbConnection) -> Self {
        Self { conn }
    }
}

impl CaptureProvider for AdbCapture {
    fn resolution(&self) -> Result<Resolution, CaptureError> {
        let size = self
            .conn
            .display_size()
            .map_err(|e| CaptureError::Resolution(e.to_string()))?;

        Ok(size.unwrap_or_else(|| {
            tracing::warn!(
                "could not parse `wm size` output, assuming {}",
                DEFAULT_RESOLUTION
            );
            DEFAULT_RESOLUTION
        }))
    }

    /// Uses `adb exec-out screencap -p` so the PNG streams straight to stdout
    /// without touching device storage.
    fn screenshot(&self) -> Result<Vec<u8>, CaptureError> {
        let output = self
            .conn
            .run(&["exec-out", "screencap", "-p"])
            .map_err(|e| CaptureError::CommandFailed(e.to_string()))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        check_capture(&output.stdout, &stderr, output.status.success())?;

        tracing::debug!(bytes = output.stdout.len(), "captured screenshot");
        Ok(output.stdout)
    }
}

/// Validate a screencap result.
pub(crate) fn check_capture(png: &[u8], stderr: &str, success: bool) -> Result<(), CaptureError> {
    // secure surfaces (payment pages, DRM video) fail with this status
    if stderr.contains("Status: -1") {
        return Err(CaptureError::Protected);
    }
    if !success {
        return Err(CaptureError::CommandFailed(stderr.trim().to_string()));
    }
    if png.len() < PNG_SIGNATURE.len() || &png[..PNG_SIGNATURE.len()] != PNG_SIGNATURE {
        return Err(CaptureError::InvalidImage(png.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_png;

    #[test]
    fn test_check_capture_accepts_png() {
        let png = sample_png(8, 16);
        assert!(check_capture(&png, "", true).is_ok());
    }

    #[test]
    fn test_check_capture_protected_screen() {
        let err = check_capture(&[], "Status: -1\n", true).unwrap_err();
        assert!(matches!(err, CaptureError::Protected));
    }

    #[test]
    fn test_check_capture_rejects_non_png() {
        let err = check_capture(b"not an image at all", "", true).unwrap_err();
        assert!(matches!(err, CaptureError::InvalidImage(19)));

        let err = check_capture(&[], "", true).unwrap_err();
        assert!(matches!(err, CaptureError::InvalidImage(0)));
    }

    #[test]
    fn test_check_capture_command_failure() {
        let err = check_capture(&[], "error: device offline", false).unwrap_err();
        match err {
            CaptureError::CommandFailed(msg) => assert_eq!(msg, "error: device offline"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
