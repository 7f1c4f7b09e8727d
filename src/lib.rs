// Copyright 2025 ModerRAS
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # OpenMobile
//!
//! An autonomous agent that drives an Android phone toward a natural-language
//! goal. Each step captures the screen over ADB, asks a vision-language model
//! for the next action, and executes it, until the model declares the goal
//! reached or the step budget runs out.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use openmobile::adb::{AdbCapture, AdbConnection, AdbDevice};
//! use openmobile::agent::{ConsoleReporter, ControlLoop, LoopConfig};
//! use openmobile::model::{ModelClient, ModelConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let conn = AdbConnection::new();
//!     let policy = ModelClient::new(ModelConfig::default())?;
//!
//!     let control = ControlLoop::new(
//!         Arc::new(AdbCapture::new(conn.clone())),
//!         Arc::new(AdbDevice::new(conn)),
//!         Arc::new(policy),
//!         LoopConfig::default(),
//!     );
//!
//!     let outcome = control
//!         .run("Open the settings app", &ConsoleReporter::new(), 15)
//!         .await;
//!     println!("{}", outcome);
//!     Ok(())
//! }
//! ```

pub mod actions;
pub mod adb;
pub mod agent;
pub mod config;
pub mod device;
pub mod model;
pub mod settings;
pub mod vision;

#[cfg(test)]
mod testing;

pub use actions::{ActionCommand, ActionDispatcher, ActionName, DispatchError, Dispatched};
pub use agent::{
    AbortReason, ChannelReporter, ConsoleReporter, ControlLoop, LoopConfig, LoopOutcome,
    ProgressReporter,
};
pub use device::{CaptureProvider, DeviceTransport, Observation, Primitive, Resolution};
pub use model::{Decision, ElementLocator, ModelClient, ModelConfig, Policy, PolicyError};
pub use settings::AppSettings;
