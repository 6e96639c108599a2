//! Multiple choice question implementation
//!
//! Participants pick one of the declared options. An answer may be changed
//! freely until the session moves to another question, and every accepted
//! answer is echoed back to the participant so the client can show which
//! option is recorded.

use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::{answers::Rejection, registry::Participant};

use super::{
    common::AnswerRules,
    config::{Answer, TemplateRef},
};

fn default_template() -> TemplateRef {
    TemplateRef::new("multiple_choice.html")
}

fn default_admin_template() -> TemplateRef {
    TemplateRef::new("multiple_choice_admin.html")
}

/// Configuration for a multiple choice question
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuestionConfig {
    /// The question text that will be displayed to participants
    #[garde(length(chars, max = crate::constants::multiple_choice::MAX_TITLE_LENGTH))]
    title: String,
    /// The available options; when empty any answer is accepted
    #[garde(
        length(max = crate::constants::multiple_choice::MAX_CHOICE_COUNT),
        inner(length(chars, max = crate::constants::answer_text::MAX_LENGTH))
    )]
    #[serde(default)]
    choices: Vec<String>,
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
    /// Creates a question with the default templates
    pub fn new(title: impl Into<String>, choices: Vec<String>) -> Self {
        Self {
            title: title.into(),
            choices,
            template: default_template(),
            admin_template: default_admin_template(),
        }
    }

    /// The question text
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The declared options
    pub fn choices(&self) -> &[String] {
        &self.choices
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
        }
    }
}

/// Runtime state for a multiple choice question
#[derive(Debug, Clone)]
pub struct State {
    config: QuestionConfig,
    revealed: bool,
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
}

impl AnswerRules for State {
    fn check(
        &self,
        _participant: &Participant,
        _index: usize,
        answer: &Answer,
    ) -> Result<(), Rejection> {
        let declared = self.config.choices.is_empty()
            || self.config.choices.iter().any(|c| c == answer.as_str());

        if declared && answer.validate().is_ok() {
            Ok(())
        } else {
            Err(Rejection::NotAccepted)
        }
    }

    fn echoes_answer(&self) -> bool {
        true
    }
}
