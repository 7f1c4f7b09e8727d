//! The perception, decision and action loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use super::reporter::ProgressReporter;
use super::state::{AbortReason, LoopOutcome, LoopState};
use crate::actions::{ActionDispatcher, Dispatched};
use crate::device::{CaptureProvider, DeviceTransport, Observation};
use crate::model::Policy;
use crate::vision::{normalize, DEFAULT_MAX_DIMENSION, DEFAULT_QUALITY};

/// Default number of steps per goal.
pub const DEFAULT_MAX_STEPS: u32 = 15;

/// Default pause after each non-terminal action.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Tuning for a [`ControlLoop`].
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Pause after each non-terminal action so the UI can settle.
    pub settle_delay: Duration,
    /// Longest side of the image sent to the policy.
    pub max_image_dimension: u32,
    /// JPEG quality of the image sent to the policy.
    pub image_quality: u8,
    /// Attach the last screenshot to the success report.
    pub attach_final_screenshot: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            max_image_dimension: DEFAULT_MAX_DIMENSION,
            image_quality: DEFAULT_QUALITY,
            attach_final_screenshot: true,
        }
    }
}

impl LoopConfig {
    /// Set the pause after each non-terminal action.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }
}

/// Drives a device toward a goal one step at a time.
///
/// Collaborators are shared read-only; every call to [`ControlLoop::run`]
/// owns its own state, so concurrent goals each get an independent run.
#[derive(Clone)]
pub struct ControlLoop {
    capture: Arc<dyn CaptureProvider>,
    transport: Arc<dyn DeviceTransport>,
    policy: Arc<dyn Policy>,
    config: LoopConfig,
    cancel: CancellationToken,
}

/// Tracks the current state of one run.
struct Tracker {
    state: LoopState,
}

impl Tracker {
    fn enter(&mut self, next: LoopState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        tracing::trace!(from = %self.state, to = %next, "state");
        self.state = next;
    }
}

impl ControlLoop {
    /// Create a loop over the given collaborators with its own cancellation token.
    pub fn new(
        capture: Arc<dyn CaptureProvider>,
        transport: Arc<dyn DeviceTransport>,
        policy: Arc<dyn Policy>,
        config: LoopConfig,
    ) -> Self {
        Self {
            capture,
            transport,
            policy,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Use `token` to stop runs from outside.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Pursue `goal` for at most `max_steps` steps.
    ///
    /// Every run ends with exactly one terminal report.
    pub async fn run(
        &self,
        goal: &str,
        reporter: &dyn ProgressReporter,
        max_steps: u32,
    ) -> LoopOutcome {
        let span = info_span!("run", run_id = %Uuid::new_v4());
        self.run_steps(goal, reporter, max_steps)
            .instrument(span)
            .await
    }

    async fn run_steps(
        &self,
        goal: &str,
        reporter: &dyn ProgressReporter,
        max_steps: u32,
    ) -> LoopOutcome {
        let mut tracker = Tracker {
            state: LoopState::Idle,
        };
        info!(goal, max_steps, "starting task");
        reporter.report(&format!("Starting Task: {}", goal), None).await;

        let resolution = match self.capture.resolution() {
            Ok(r) => r,
            Err(e) => {
                return self
                    .abort(&mut tracker, reporter, AbortReason::CaptureFailed, e.to_string())
                    .await
            }
        };
        info!(%resolution, "device resolution");
        let dispatcher = ActionDispatcher::new(self.transport.clone(), resolution);

        for step in 0..max_steps {
            if self.cancel.is_cancelled() {
                return self.cancelled(&mut tracker, reporter, step).await;
            }

            tracker.enter(LoopState::Observing);
            let observation = match self.capture.screenshot() {
                Ok(image) => Observation { image, resolution },
                Err(e) => {
                    return self
                        .abort(&mut tracker, reporter, AbortReason::CaptureFailed, e.to_string())
                        .await
                }
            };

            tracker.enter(LoopState::Normalizing);
            let image = match normalize(
                &observation.image,
                self.config.max_image_dimension,
                self.config.image_quality,
            ) {
                Ok(image) => image,
                Err(e) => {
                    return self
                        .abort(&mut tracker, reporter, AbortReason::NormalizeFailed, e.to_string())
                        .await
                }
            };
            tracing::debug!(
                raw = observation.image.len(),
                jpeg = image.bytes.len(),
                "screen normalized"
            );

            if self.cancel.is_cancelled() {
                return self.cancelled(&mut tracker, reporter, step).await;
            }

            tracker.enter(LoopState::Deciding);
            let decision = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return self.cancelled(&mut tracker, reporter, step).await;
                }
                decision = self.policy.ask(goal, step, &image) => decision,
            };
            let decision = match decision {
                Ok(d) => d,
                Err(e) => {
                    return self
                        .abort(&mut tracker, reporter, AbortReason::PolicyFailed, e.to_string())
                        .await
                }
            };

            tracker.enter(LoopState::Reporting);
            info!(step = step + 1, action = %decision.action, "decision");
            reporter
                .report(
                    &format!(
                        "Step {} Thought: {}\nAction: {}",
                        step + 1,
                        decision.thought,
                        decision.action
                    ),
                    None,
                )
                .await;

            if self.cancel.is_cancelled() {
                return self.cancelled(&mut tracker, reporter, step).await;
            }

            tracker.enter(LoopState::Acting);
            let extra_wait = match dispatcher.dispatch_command(&decision.action) {
                Ok(Dispatched::Finished { message }) => {
                    tracker.enter(LoopState::Finished);
                    info!(step = step + 1, %message, "goal finished");
                    let image = self
                        .config
                        .attach_final_screenshot
                        .then_some(observation.image.as_slice());
                    reporter.report(&format!("Success: {}", message), image).await;
                    return LoopOutcome::Finished { message };
                }
                Ok(Dispatched::Waited(duration)) => duration,
                Ok(Dispatched::Performed { .. }) => Duration::ZERO,
                Err(e) => {
                    warn!(step = step + 1, "action failed: {}", e);
                    reporter
                        .report(&format!("Step {} Warning: {}", step + 1, e), None)
                        .await;
                    Duration::ZERO
                }
            };

            tracker.enter(LoopState::Settling);
            // nothing to observe after the last step
            if step + 1 == max_steps {
                break;
            }
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return self.cancelled(&mut tracker, reporter, step + 1).await;
                }
                _ = sleep(self.config.settle_delay.saturating_add(extra_wait)) => {}
            }
        }

        tracker.enter(LoopState::StepBudgetExhausted);
        warn!(max_steps, "step budget exhausted");
        reporter
            .report(
                &format!(
                    "Stopped: step budget of {} exhausted before the goal was reached.",
                    max_steps
                ),
                None,
            )
            .await;
        LoopOutcome::StepBudgetExhausted { steps: max_steps }
    }

    async fn cancelled(
        &self,
        tracker: &mut Tracker,
        reporter: &dyn ProgressReporter,
        step: u32,
    ) -> LoopOutcome {
        let detail = format!("cancelled after {} completed steps", step);
        self.abort(tracker, reporter, AbortReason::Cancelled, detail)
            .await
    }

    async fn abort(
        &self,
        tracker: &mut Tracker,
        reporter: &dyn ProgressReporter,
        reason: AbortReason,
        detail: String,
    ) -> LoopOutcome {
        tracker.enter(LoopState::Aborted);
        tracing::error!(reason = %reason, "run aborted: {}", detail);
        let text = match reason {
            AbortReason::CaptureFailed => {
                format!("Critical Error: Failed to capture screen. {}", detail)
            }
            AbortReason::NormalizeFailed => {
                format!("Critical Error: Failed to process screen image. {}", detail)
            }
            AbortReason::PolicyFailed => {
                format!("Error: the model did not provide a valid decision. {}", detail)
            }
            AbortReason::Cancelled => format!("Cancelled: {}", detail),
        };
        reporter.report(&text, None).await;
        LoopOutcome::Aborted { reason, detail }
    }
}
