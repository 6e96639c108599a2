//! Participant display names
//!
//! Participants join anonymously; to make the administrator roster readable
//! each one is given a generated, title-cased name.

use heck::ToTitleCase;
use serde::{Deserialize, Serialize};

/// Defines the style of automatically generated participant names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, garde::Validate)]
pub enum NameStyle {
    /// Pet-style names (adjective + animal combinations)
    Petname(#[garde(range(min = 2, max = 3))] u8),
}

impl Default for NameStyle {
    /// Default name style is Petname with 2 words
    fn default() -> Self {
        Self::Petname(2)
    }
}

impl NameStyle {
    /// Generates a random name according to this style
    pub fn get_name(&self) -> String {
        match self {
            Self::Petname(count) => petname::petname(*count, " ").unwrap_or_default(),
        }
        .to_title_case()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use garde::Validate;

    #[test]
    fn test_petname_word_count() {
        for count in 2..=3 {
            let name = NameStyle::Petname(count).get_name();
            assert_eq!(name.split(' ').count(), usize::from(count));
        }
    }

    #[test]
    fn test_names_are_title_case() {
        let name = NameStyle::default().get_name();
        assert!(
            name.split(' ')
                .all(|word| word.chars().next().is_some_and(char::is_uppercase))
        );
    }

    #[test]
    fn test_name_style_validation() {
        assert!(NameStyle::Petname(2).validate().is_ok());
        assert!(NameStyle::Petname(1).validate().is_err());
        assert!(NameStyle::Petname(4).validate().is_err());
    }
}
