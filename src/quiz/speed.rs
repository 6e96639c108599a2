//! Speed question implementation
//!
//! A speed question accepts exactly one answer per participant. The first
//! answer received while the question is active starts a countdown; when it
//! runs out the session advances to the next question on its own, unless an
//! administrator advanced first.

use std::time::Duration;

use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::{
    answers::Rejection,
    constants::speed::{DEFAULT_DELAY, MAX_DELAY, MIN_DELAY},
    registry::Participant,
};

use super::{
    common::{AnswerRules, Timer, validate_duration},
    config::{Answer, TemplateRef},
};

fn default_template() -> TemplateRef {
    TemplateRef::new("speed.html")
}

fn default_admin_template() -> TemplateRef {
    TemplateRef::new("speed_admin.html")
}

fn default_delay() -> Duration {
    Duration::from_secs(DEFAULT_DELAY)
}

/// Configuration for a speed question
#[serde_with::serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuestionConfig {
    /// The question text that will be displayed to participants
    #[garde(length(chars, max = crate::constants::speed::MAX_TITLE_LENGTH))]
    title: String,
    /// Time between the first answer and the automatic advance
    #[garde(custom(validate_duration::<MIN_DELAY, MAX_DELAY>))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    #[serde(default = "default_delay")]
    delay: Duration,
    /// Template for the participant view
    #[garde(dive)]
    #[serde(default = "default_template")]
    template: TemplateRef,
    /// Template for the administrator view
    #[garde(dive)]
    #[serde(default = "default_admin_template")]
    admin_template: TemplateRef,
}

impl QuestionConfig {
    /// Creates a speed question with the default templates
    pub fn new(title: impl Into<String>, delay: Duration) -> Self {
        Self {
            title: title.into(),
            delay,
            template: default_template(),
            admin_template: default_admin_template(),
        }
    }

    /// The question text
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Time between the first answer and the automatic advance
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Template for the participant view
    pub fn template(&self) -> &TemplateRef {
        &self.template
    }

    /// Template for the administrator view
    pub fn admin_template(&self) -> &TemplateRef {
        &self.admin_template
    }

    /// Creates a new runtime state from this configuration
    pub fn to_state(&self) -> State {
        State {
            config: self.clone(),
            revealed: false,
            timer: None,
        }
    }
}

/// Runtime state for a speed question
#[derive(Debug)]
pub struct State {
    config: QuestionConfig,
    revealed: bool,
    /// At most one live timer per activation of the question
    timer: Option<Timer>,
}

impl State {
    /// The configuration this state was created from
    pub fn config(&self) -> &QuestionConfig {
        &self.config
    }

    /// Whether the answers have been revealed
    pub fn revealed(&self) -> bool {
        self.revealed
    }

    /// Reveals the answers
    pub fn reveal(&mut self) {
        self.revealed = true;
    }

    /// The live timer, if one is armed
    pub fn timer(&self) -> Option<&Timer> {
        self.timer.as_ref()
    }

    /// Clears the timer handle and returns it
    pub fn take_timer(&mut self) -> Option<Timer> {
        self.timer.take()
    }
}

impl AnswerRules for State {
    fn check(
        &self,
        participant: &Participant,
        index: usize,
        answer: &Answer,
    ) -> Result<(), Rejection> {
        // one shot
        if participant.has_answered(index) {
            return Err(Rejection::Duplicate);
        }

        answer.validate().map_err(|_| Rejection::NotAccepted)
    }

    fn on_first_answer<S: FnOnce(Duration) -> Timer>(&mut self, schedule: S) -> bool {
        if self.timer.is_some() {
            return false;
        }

        self.timer = Some(schedule(self.config.delay));

        true
    }
}
