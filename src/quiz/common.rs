//! Shared traits and common functionality for question kinds
//!
//! This module contains the capability interface every question kind
//! implements, the speed timer handle, and validation helpers shared by the
//! kind-specific configurations.

use std::time::Duration;

use garde::Validate;
use tokio::task::AbortHandle;

use crate::{answers::Rejection, registry::Participant};

use super::config::Answer;

/// Validation result type for duration validation
type ValidationResult = garde::Result;

/// Validates that a duration falls within specified bounds.
///
/// This is a custom validation function for use with the `garde` crate.
/// It checks if the duration is within the inclusive range defined by
/// `MIN_SECONDS` and `MAX_SECONDS`, sub-second parts included.
///
/// # Errors
///
/// Returns a `garde::Error` if the duration is outside the specified bounds.
pub fn validate_duration<const MIN_SECONDS: u64, const MAX_SECONDS: u64>(
    val: &Duration,
    _ctx: &(),
) -> ValidationResult {
    let bounds = Duration::from_secs(MIN_SECONDS)..=Duration::from_secs(MAX_SECONDS);
    if bounds.contains(val) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "outside of bounds [{MIN_SECONDS},{MAX_SECONDS}]",
        )))
    }
}

/// Capability interface implemented by every question kind
///
/// The answer collector and the session state machine only talk to
/// questions through this trait, so adding a kind means implementing it
/// rather than special-casing the callers.
pub trait AnswerRules {
    /// Checks whether `participant` may record `answer` for the question at `index`
    ///
    /// The default accepts any well-formed answer and lets it overwrite a
    /// previous one.
    ///
    /// # Errors
    ///
    /// Returns the reason the answer is refused.
    fn check(
        &self,
        participant: &Participant,
        index: usize,
        answer: &Answer,
    ) -> Result<(), Rejection> {
        let _ = (participant, index);
        answer.validate().map_err(|_| Rejection::NotAccepted)
    }

    /// Whether `participant` may record `answer` for the question at `index`
    fn accepts(&self, participant: &Participant, index: usize, answer: &Answer) -> bool {
        self.check(participant, index, answer).is_ok()
    }

    /// Whether the submitting participant gets a refreshed view after answering
    fn echoes_answer(&self) -> bool {
        false
    }

    /// Hook run for every accepted answer while the question is active
    ///
    /// `schedule` arms the automatic advance and returns its timer. Returns
    /// `true` if a timer was armed by this call.
    fn on_first_answer<S: FnOnce(Duration) -> Timer>(&mut self, schedule: S) -> bool {
        let _ = schedule;
        false
    }
}

/// A scheduled automatic advance owned by a speed question
///
/// `activation` identifies the question activation the timer was armed in;
/// an alarm carrying a different activation is stale and ignored.
#[derive(Debug)]
pub struct Timer {
    target: usize,
    activation: u64,
    handle: AbortHandle,
}

impl Timer {
    /// Wraps the abort handle of a scheduled advance
    pub fn new(target: usize, activation: u64, handle: AbortHandle) -> Self {
        Self {
            target,
            activation,
            handle,
        }
    }

    /// The question index the timer advances to
    pub fn target(&self) -> usize {
        self.target
    }

    /// The activation the timer was armed in
    pub fn activation(&self) -> u64 {
        self.activation
    }

    /// Cancels the scheduled advance
    ///
    /// Cancelling a timer that already fired is a no-op.
    pub fn cancel(self) {
        self.handle.abort();
    }

    /// Drops the handle without aborting the task
    ///
    /// Used by the alarm task itself once it has fired: aborting the running
    /// task would cut its own transition short.
    pub fn disarm(self) {}
}
