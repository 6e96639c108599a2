//! Free text question implementation
//!
//! Participants type an answer and may replace it until the session moves
//! on. Nothing is echoed back to the participant; administrators see the
//! responses as they arrive.

use garde::Validate;
use serde::{Deserialize, Serialize};

use super::{common::AnswerRules, config::TemplateRef};

fn default_template() -> TemplateRef {
    TemplateRef::new("free_text.html")
}

fn default_admin_template() -> TemplateRef {
    TemplateRef::new("free_text_admin.html")
}

/// Configuration for a free text question
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuestionConfig {
    /// The question text that will be displayed to participants
    #[garde(length(chars, max = crate::constants::free_text::MAX_TITLE_LENGTH))]
    title: String,
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
    /// Creates a free text question with the default templates
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            template: default_template(),
            admin_template: default_admin_template(),
        }
    }

    /// The question text
    pub fn title(&self) -> &str {
        &self.title
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

/// Runtime state for a free text question
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

impl AnswerRules for State {}
