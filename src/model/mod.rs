//! Model client module: HTTP inference, the reasoning policy and the element locator.

mod client;
mod locator;
mod policy;

pub use client::{
    ApiFlavor, GenerateRequest, MessageBuilder, ModelClient, ModelConfig, ModelError,
    DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_SECS, DEFAULT_TIMEOUT_SECS,
};
pub use locator::{ElementLocator, LocateError};
pub use policy::{parse_decision, Decision, Policy, PolicyError};
