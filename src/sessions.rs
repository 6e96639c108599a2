//! Session registry
//!
//! All sessions are loaded once at startup, before any connection is
//! accepted, and live for the rest of the process. Lookups afterwards are
//! lock-free reads of an immutable map.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use garde::Validate;
use serde::Serialize;
use thiserror::Error;

use crate::{
    quiz::config::QuizConfig,
    session::{self, Session},
};

/// Errors that can occur when looking up a session
#[derive(Error, Serialize, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No session with the name was loaded
    #[error("session {0} does not exist")]
    NotFound(String),
}

/// Errors that can occur while loading session definitions
#[derive(Error, Debug)]
pub enum LoadError {
    /// A definition file or directory could not be read
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// The path that failed
        path: PathBuf,
        /// The underlying error
        #[source]
        source: std::io::Error,
    },
    /// A definition file is not valid JSON for a session
    #[error("failed to parse {}: {source}", path.display())]
    Json {
        /// The path that failed
        path: PathBuf,
        /// The underlying error
        #[source]
        source: serde_json::Error,
    },
    /// A definition violates the session limits
    #[error("session {session} is invalid: {report}")]
    Validation {
        /// Name of the offending session
        session: String,
        /// Everything that failed validation
        report: garde::Report,
    },
    /// Two definitions share a name
    #[error("session {0} is defined more than once")]
    Duplicate(String),
    /// The definition could not be turned into a session
    #[error(transparent)]
    Session(#[from] session::Error),
}

/// The set of loaded sessions, keyed by name
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<Arc<str>, Arc<Session>>,
}

impl SessionRegistry {
    /// Loads every session from `(name, definition)` pairs
    ///
    /// # Errors
    ///
    /// Fails on the first definition that does not validate or whose name
    /// was already used.
    pub fn load_all<I, S>(definitions: I) -> Result<Self, LoadError>
    where
        I: IntoIterator<Item = (S, QuizConfig)>,
        S: Into<String>,
    {
        let mut sessions = HashMap::new();

        for (name, config) in definitions {
            let name: String = name.into();

            config.validate().map_err(|report| LoadError::Validation {
                session: name.clone(),
                report,
            })?;

            let name: Arc<str> = Arc::from(name);
            if sessions.contains_key(&name) {
                return Err(LoadError::Duplicate(name.to_string()));
            }

            let session = Session::new(Arc::clone(&name), &config)?;
            tracing::info!(
                session = %name,
                questions = config.len(),
                "Loaded session"
            );
            sessions.insert(name, Arc::new(session));
        }

        Ok(Self { sessions })
    }

    /// Loads every `*.json` definition in a directory
    ///
    /// The file stem is the session name. Hidden files are skipped.
    ///
    /// # Errors
    ///
    /// Fails if the directory or a definition cannot be read, parsed or
    /// validated.
    pub fn load_dir(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let io_error = |path: &Path| {
            let path = path.to_path_buf();
            move |source| LoadError::Io { path, source }
        };

        let mut definitions = Vec::new();
        for entry in fs::read_dir(path).map_err(io_error(path))? {
            let file = entry.map_err(io_error(path))?.path();

            let Some(name) = file
                .file_stem()
                .and_then(|stem| stem.to_str())
                .filter(|stem| !stem.starts_with('.'))
            else {
                continue;
            };
            if !file.is_file() || file.extension().is_none_or(|extension| extension != "json") {
                continue;
            }

            let contents = fs::read_to_string(&file).map_err(io_error(file.as_path()))?;
            let config: QuizConfig =
                serde_json::from_str(&contents).map_err(|source| LoadError::Json {
                    path: file.clone(),
                    source,
                })?;

            definitions.push((name.to_owned(), config));
        }

        tracing::debug!(
            directory = %path.display(),
            count = definitions.len(),
            "Read session definitions"
        );

        Self::load_all(definitions)
    }

    /// Looks up a session by name
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if no session has the name.
    pub fn get(&self, name: &str) -> Result<Arc<Session>, Error> {
        self.sessions
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(name.to_owned()))
    }

    /// Names of all loaded sessions
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sessions.keys().map(|name| &**name)
    }

    /// Number of loaded sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session was loaded
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::quiz::{config::QuestionConfig, free_text};

    const DEFINITION: &str = r#"{
        "title": "Pub quiz",
        "questions": [
            {"MultipleChoice": {"title": "Capital of France?", "choices": ["Paris", "Lyon"]}},
            {"Speed": {"title": "Quick: 7 x 8?", "delay": 5000}}
        ]
    }"#;

    fn config(title: &str) -> QuizConfig {
        QuizConfig {
            title: title.to_owned(),
            questions: vec![QuestionConfig::FreeText(free_text::QuestionConfig::new(
                "Anything?",
            ))],
        }
    }

    #[tokio::test]
    async fn test_load_all_and_get() {
        let registry =
            SessionRegistry::load_all([("quiz1", config("One")), ("quiz2", config("Two"))])
                .unwrap();
        assert_eq!(registry.len(), 2);

        let session = registry.get("quiz2").unwrap();
        assert_eq!(session.title(), "Two");
        assert_eq!(session.question_num().await, 0);

        assert_eq!(
            registry.get("missing").unwrap_err(),
            Error::NotFound("missing".to_owned())
        );
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let result = SessionRegistry::load_all([("quiz1", config("One")), ("quiz1", config("Two"))]);
        assert!(matches!(result, Err(LoadError::Duplicate(name)) if name == "quiz1"));
    }

    #[test]
    fn test_invalid_definition_is_rejected() {
        let empty = QuizConfig {
            title: "Empty".to_owned(),
            questions: Vec::new(),
        };
        let result = SessionRegistry::load_all([("quiz1", empty)]);
        assert!(matches!(result, Err(LoadError::Validation { session, .. }) if session == "quiz1"));
    }

    #[test]
    fn test_load_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("friday.json"), DEFINITION).unwrap();
        fs::write(dir.path().join(".draft.json"), "not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "not a session").unwrap();

        let registry = SessionRegistry::load_dir(dir.path()).unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), ["friday"]);
        assert_eq!(registry.get("friday").unwrap().title(), "Pub quiz");
    }

    #[test]
    fn test_load_dir_reports_broken_definition() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.json"), "{").unwrap();

        let result = SessionRegistry::load_dir(dir.path());
        assert!(matches!(result, Err(LoadError::Json { path, .. }) if path.ends_with("broken.json")));
    }

    #[test]
    fn test_load_dir_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = SessionRegistry::load_dir(dir.path().join("missing"));
        assert!(matches!(result, Err(LoadError::Io { .. })));
    }
}
