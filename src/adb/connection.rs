//! ADB connection management for local and remote devices.

use std::process::{Command, Output};

use crate::device::{Resolution, TransportError};

/// Type of ADB connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionType {
    Usb,
    Remote,
    Emulator,
}

/// Information about a connected device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub device_id: String,
    pub status: String,
    pub connection_type: ConnectionType,
    pub model: Option<String>,
}

/// A handle on the `adb` binary, optionally pinned to one device serial.
///
/// # Example
/// ```rust,no_run
/// use openmobile::adb::AdbConnection;
///
/// let conn = AdbConnection::new().with_device_id("emulator-5554");
/// let devices = conn.list_devices();
/// ```
#[derive(Debug, Clone)]
pub struct AdbConnection {
    adb_path: String,
    device_id: Option<String>,
}

impl Default for AdbConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl AdbConnection {
    /// Create a connection using `adb` from `PATH` and the default device.
    pub fn new() -> Self {
        Self {
            adb_path: "adb".to_string(),
            device_id: None,
        }
    }

    /// Use a custom ADB binary.
    pub fn with_path(mut self, adb_path: impl Into<String>) -> Self {
        self.adb_path = adb_path.into();
        self
    }

    /// Target a specific device serial (`adb -s`).
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// The pinned device serial, if any.
    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// Command prefix including the device selector.
    pub(crate) fn prefix(&self) -> Vec<String> {
        let mut prefix = vec![self.adb_path.clone()];
        if let Some(id) = &self.device_id {
            prefix.push("-s".to_string());
            prefix.push(id.clone());
        }
        prefix
    }

    fn command(&self) -> Command {
        let prefix = self.prefix();
        let mut cmd = Command::new(&prefix[0]);
        cmd.args(&prefix[1..]);
        cmd
    }

    /// Run `adb [-s id] <args>` and return the raw output.
    pub(crate) fn run(&self, args: &[&str]) -> Result<Output, TransportError> {
        tracing::trace!(args = ?args, "adb");
        Ok(self.command().args(args).output()?)
    }

    /// Run `adb shell <args>`; non-zero exit is an error carrying stderr.
    pub fn shell(&self, args: &[&str]) -> Result<String, TransportError> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push("shell");
        full.extend_from_slice(args);

        let output = self.run(&full)?;
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = if stderr.trim().is_empty() {
                stdout
            } else {
                stderr.trim().to_string()
            };
            return Err(TransportError::CommandFailed(format!(
                "adb shell {} exited with {}: {}",
                args.first().copied().unwrap_or_default(),
                output.status,
                detail
            )));
        }
        Ok(stdout)
    }

    /// Connect to a remote device via TCP/IP.
    ///
    /// Port 5555 is assumed when `address` has none.
    pub fn connect(&self, address: &str) -> Result<String, TransportError> {
        let address = if address.contains(':') {
            address.to_string()
        } else {
            format!("{}:5555", address)
        };

        let output = Command::new(&self.adb_path)
            .args(["connect", &address])
            .output()?;

        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        let lowered = combined.to_lowercase();

        if lowered.contains("connected") && !lowered.contains("cannot") && !lowered.contains("failed")
        {
            Ok(format!("Connected to {}", address))
        } else {
            Err(TransportError::CommandFailed(combined.trim().to_string()))
        }
    }

    /// List all devices known to the ADB server.
    pub fn list_devices(&self) -> Result<Vec<DeviceInfo>, TransportError> {
        let output = Command::new(&self.adb_path)
            .args(["devices", "-l"])
            .output()?;
        Ok(parse_device_list(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Query the display size with `wm size`.
    ///
    /// Returns `Ok(None)` when the command ran but printed nothing we understand.
    pub fn display_size(&self) -> Result<Option<Resolution>, TransportError> {
        let stdout = self.shell(&["wm", "size"])?;
        Ok(parse_wm_size(&stdout))
    }
}

/// Parse `adb devices -l` output, skipping the header line.
pub(crate) fn parse_device_list(stdout: &str) -> Vec<DeviceInfo> {
    let mut devices = Vec::new();

    for line in stdout.lines().skip(1) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 {
            continue;
        }

        let device_id = parts[0].to_string();
        let connection_type = if device_id.contains(':') {
            ConnectionType::Remote
        } else if device_id.starts_with("emulator-") {
            ConnectionType::Emulator
        } else {
            ConnectionType::Usb
        };

        let model = parts
            .iter()
            .find_map(|p| p.strip_prefix("model:"))
            .map(str::to_string);

        devices.push(DeviceInfo {
            device_id,
            status: parts[1].to_string(),
            connection_type,
            model,
        });
    }

    devices
}

/// Parse `wm size` output. An override size wins over the physical size.
pub(crate) fn parse_wm_size(stdout: &str) -> Option<Resolution> {
    let mut physical = None;
    let mut overridden = None;

    for line in stdout.lines() {
        let Some((label, value)) = line.split_once(':') else {
            continue;
        };
        let Some((w, h)) = value.trim().split_once('x') else {
            continue;
        };
        let (Ok(width), Ok(height)) = (w.trim().parse::<u32>(), h.trim().parse::<u32>()) else {
            continue;
        };

        let size = Resolution::new(width, height);
        if label.contains("Override") {
            overridden = Some(size);
        } else if label.contains("Physical") {
            physical = Some(size);
        }
    }

    overridden.or(physical)
}
