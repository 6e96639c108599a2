//! Session definitions and runtime question state
//!
//! This module defines the configuration a session is loaded from
//! (`QuizConfig` and its questions) and the runtime `Question` sum type the
//! session state machine mutates. Each question kind carries only the
//! fields it needs; the speed timer exists on the speed variant alone.

use std::{fmt::Display, time::Duration};

use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::{answers::Rejection, registry::Participant};

use super::{
    common::{AnswerRules, Timer},
    free_text, multiple_choice, speed,
};

/// Opaque reference to a view template
///
/// The core carries it unchanged from the definition to the view renderer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Validate)]
#[serde(transparent)]
#[garde(transparent)]
pub struct TemplateRef(
    #[garde(length(chars, min = 1, max = crate::constants::quiz::MAX_TEMPLATE_LENGTH))] String,
);

impl TemplateRef {
    /// Creates a template reference
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    /// The referenced template name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A value submitted by a participant
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Validate)]
#[serde(transparent)]
#[garde(transparent)]
pub struct Answer(#[garde(length(chars, max = crate::constants::answer_text::MAX_LENGTH))] String);

impl Answer {
    /// The submitted text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Answer {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for Answer {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Display for Answer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A complete session definition
///
/// Loaded once at startup, before any connection is accepted.
#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct QuizConfig {
    /// The title shown on participant and administrator views
    #[garde(length(chars, max = crate::constants::quiz::MAX_TITLE_LENGTH))]
    pub title: String,

    /// The ordered questions of the session
    #[garde(length(min = 1, max = crate::constants::quiz::MAX_QUESTION_COUNT), dive)]
    pub questions: Vec<QuestionConfig>,
}

impl QuizConfig {
    /// Returns the number of questions in this definition
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Checks if this definition contains any questions
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Configuration for a single question
#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub enum QuestionConfig {
    /// A question answered by picking one of several options
    MultipleChoice(#[garde(dive)] multiple_choice::QuestionConfig),
    /// A one-shot question that advances on its own after the first answer
    Speed(#[garde(dive)] speed::QuestionConfig),
    /// A question answered with free text
    FreeText(#[garde(dive)] free_text::QuestionConfig),
}

impl QuestionConfig {
    /// Converts this configuration into a fresh runtime state
    pub fn to_state(&self) -> Question {
        match self {
            Self::MultipleChoice(c) => Question::MultipleChoice(c.to_state()),
            Self::Speed(c) => Question::Speed(c.to_state()),
            Self::FreeText(c) => Question::FreeText(c.to_state()),
        }
    }
}

/// The kind of a question without its data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionKind {
    /// Multiple choice
    MultipleChoice,
    /// Speed question
    Speed,
    /// Free text
    FreeText,
}

/// Runtime state of a question
#[derive(Debug)]
pub enum Question {
    /// Runtime state for a multiple choice question
    MultipleChoice(multiple_choice::State),
    /// Runtime state for a speed question
    Speed(speed::State),
    /// Runtime state for a free text question
    FreeText(free_text::State),
}

impl Question {
    /// Returns the kind of this question
    pub fn kind(&self) -> QuestionKind {
        match self {
            Self::MultipleChoice(_) => QuestionKind::MultipleChoice,
            Self::Speed(_) => QuestionKind::Speed,
            Self::FreeText(_) => QuestionKind::FreeText,
        }
    }

    /// The question text
    pub fn title(&self) -> &str {
        match self {
            Self::MultipleChoice(s) => s.config().title(),
            Self::Speed(s) => s.config().title(),
            Self::FreeText(s) => s.config().title(),
        }
    }

    /// The options offered to participants, empty for open questions
    pub fn choices(&self) -> &[String] {
        match self {
            Self::MultipleChoice(s) => s.config().choices(),
            Self::Speed(_) | Self::FreeText(_) => &[],
        }
    }

    /// Template used for the participant view
    pub fn template(&self) -> &TemplateRef {
        match self {
            Self::MultipleChoice(s) => s.config().template(),
            Self::Speed(s) => s.config().template(),
            Self::FreeText(s) => s.config().template(),
        }
    }

    /// Template used for the administrator main view
    pub fn admin_template(&self) -> &TemplateRef {
        match self {
            Self::MultipleChoice(s) => s.config().admin_template(),
            Self::Speed(s) => s.config().admin_template(),
            Self::FreeText(s) => s.config().admin_template(),
        }
    }

    /// Whether answers to this question have been revealed
    pub fn revealed(&self) -> bool {
        match self {
            Self::MultipleChoice(s) => s.revealed(),
            Self::Speed(s) => s.revealed(),
            Self::FreeText(s) => s.revealed(),
        }
    }

    /// Marks the answers as revealed; never un-reveals
    pub fn reveal(&mut self) {
        match self {
            Self::MultipleChoice(s) => s.reveal(),
            Self::Speed(s) => s.reveal(),
            Self::FreeText(s) => s.reveal(),
        }
    }

    /// The live timer, if this is a speed question that has one
    pub fn timer(&self) -> Option<&Timer> {
        match self {
            Self::Speed(s) => s.timer(),
            Self::MultipleChoice(_) | Self::FreeText(_) => None,
        }
    }

    /// Removes the live timer without aborting it
    pub fn take_timer(&mut self) -> Option<Timer> {
        match self {
            Self::Speed(s) => s.take_timer(),
            Self::MultipleChoice(_) | Self::FreeText(_) => None,
        }
    }

    /// Cancels and clears the live timer; a no-op if there is none
    pub fn cancel_timer(&mut self) -> bool {
        match self.take_timer() {
            Some(timer) => {
                timer.cancel();
                true
            }
            None => false,
        }
    }
}

impl AnswerRules for Question {
    fn check(
        &self,
        participant: &Participant,
        index: usize,
        answer: &Answer,
    ) -> Result<(), Rejection> {
        match self {
            Self::MultipleChoice(s) => s.check(participant, index, answer),
            Self::Speed(s) => s.check(participant, index, answer),
            Self::FreeText(s) => s.check(participant, index, answer),
        }
    }

    fn echoes_answer(&self) -> bool {
        match self {
            Self::MultipleChoice(s) => s.echoes_answer(),
            Self::Speed(s) => s.echoes_answer(),
            Self::FreeText(s) => s.echoes_answer(),
        }
    }

    fn on_first_answer<S: FnOnce(Duration) -> Timer>(&mut self, schedule: S) -> bool {
        match self {
            Self::MultipleChoice(s) => s.on_first_answer(schedule),
            Self::Speed(s) => s.on_first_answer(schedule),
            Self::FreeText(s) => s.on_first_answer(schedule),
        }
    }
}
