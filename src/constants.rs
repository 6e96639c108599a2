//! Configuration constants for the memoriae quiz core
//!
//! This module contains the limits and defaults used throughout the crate
//! to validate session definitions and bound the size of the views sent to
//! connected clients.

/// Session definition constants
pub mod quiz {
    /// Maximum number of questions allowed in a single session
    pub const MAX_QUESTION_COUNT: usize = 100;
    /// Maximum length of a session title in characters
    pub const MAX_TITLE_LENGTH: usize = 200;
    /// Maximum length of a template reference
    pub const MAX_TEMPLATE_LENGTH: usize = 200;
}

/// Participant registry constants
pub mod participants {
    /// Maximum number of participants connected at once, across all sessions
    pub const MAX_PARTICIPANT_COUNT: usize = 1000;
    /// Default number of participants listed on the admin sidebar
    pub const DEFAULT_ROSTER_LIMIT: usize = 50;
    /// Upper bound for the configurable roster limit
    pub const MAX_ROSTER_LIMIT: usize = 1000;
}

/// Multiple choice question constants
pub mod multiple_choice {
    /// Maximum length of a multiple choice question title
    pub const MAX_TITLE_LENGTH: usize = 200;
    /// Maximum number of answer options for a multiple choice question
    pub const MAX_CHOICE_COUNT: usize = 8;
}

/// Speed question constants
pub mod speed {
    /// Maximum length of a speed question title
    pub const MAX_TITLE_LENGTH: usize = 200;
    /// Minimum delay in seconds between the first answer and the automatic advance
    pub const MIN_DELAY: u64 = 1;
    /// Maximum delay in seconds between the first answer and the automatic advance
    pub const MAX_DELAY: u64 = 600;
    /// Delay in seconds used when a definition does not specify one
    pub const DEFAULT_DELAY: u64 = 30;
}

/// Free text question constants
pub mod free_text {
    /// Maximum length of a free text question title
    pub const MAX_TITLE_LENGTH: usize = 200;
}

/// Answer text constants
pub mod answer_text {
    /// Maximum length of a submitted answer in characters
    pub const MAX_LENGTH: usize = 200;
}
