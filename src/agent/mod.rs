//! Agent module: the control loop, its states and progress reporting.

mod control_loop;
mod reporter;
mod state;

pub use control_loop::{ControlLoop, LoopConfig, DEFAULT_MAX_STEPS, DEFAULT_SETTLE_DELAY};
pub use reporter::{ChannelReporter, ConsoleReporter, ProgressEvent, ProgressReporter};
pub use state::{AbortReason, LoopOutcome, LoopState};
