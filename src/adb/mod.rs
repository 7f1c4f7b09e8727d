//! ADB (Android Debug Bridge) implementations of the device contracts.

mod connection;
mod device;
pub mod input;
mod screenshot;

pub use connection::{AdbConnection, ConnectionType, DeviceInfo};
pub use device::AdbDevice;
pub use input::{escape_input_text, TextInputMode};
pub use screenshot::AdbCapture;
