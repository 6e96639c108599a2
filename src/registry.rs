//! Participant and administrator registries
//!
//! This module tracks every live connection of the quiz: the participants
//! answering questions and the administrators driving a session. Registry
//! membership is the single source of truth for liveness; a connection that
//! is not in a registry is never addressed by a broadcast.

use std::{
    collections::HashMap,
    fmt::Display,
    str::FromStr,
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;
use web_time::SystemTime;

use crate::quiz::config::Answer;

/// A unique identifier for a live connection
///
/// Every participant and administrator connection gets its own id; a
/// reconnecting browser is a new connection with a new id.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random connection id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Id {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// Errors that can occur when managing a registry
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// No record exists for the connection
    #[error("connection {0} is not registered")]
    NotFound(Id),
    /// The registry has reached its maximum size
    #[error("maximum number of participants reached")]
    MaximumParticipants,
    /// A record already exists for the connection
    #[error("connection {0} is already registered")]
    AlreadyRegistered(Id),
}

/// An answer recorded for one question, with the time it arrived
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedAnswer {
    /// The submitted answer
    pub answer: Answer,
    /// When the answer was recorded
    pub submitted_at: SystemTime,
}

/// A connected quiz-taker bound to one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    session: Arc<str>,
    name: String,
    answers: HashMap<usize, RecordedAnswer>,
}

impl Participant {
    /// Creates a participant of the given session with no answers
    pub fn new(session: Arc<str>, name: String) -> Self {
        Self {
            session,
            name,
            answers: HashMap::new(),
        }
    }

    /// The display name shown on the administrator roster
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The answer recorded for a question, if any
    pub fn answer(&self, question: usize) -> Option<&RecordedAnswer> {
        self.answers.get(&question)
    }

    /// Whether an answer is recorded for a question
    pub fn has_answered(&self, question: usize) -> bool {
        self.answers.contains_key(&question)
    }

    /// Records or overwrites the answer to a question
    pub fn record_answer(&mut self, question: usize, answer: Answer) {
        self.answers.insert(
            question,
            RecordedAnswer {
                answer,
                submitted_at: SystemTime::now(),
            },
        );
    }
}

/// A connected presenter bound to one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Administrator {
    session: Arc<str>,
}

impl Administrator {
    /// Creates an administrator of the given session
    pub fn new(session: Arc<str>) -> Self {
        Self { session }
    }
}

/// A registry record that belongs to exactly one session
///
/// The session is referenced by name and never changes after creation.
pub trait Record: Clone {
    /// Name of the session the record belongs to
    fn session(&self) -> &Arc<str>;
}

impl Record for Participant {
    fn session(&self) -> &Arc<str> {
        &self.session
    }
}

impl Record for Administrator {
    fn session(&self) -> &Arc<str> {
        &self.session
    }
}

/// Concurrency-safe mapping from connection id to record
///
/// One exclusive lock guards both mutation and the snapshots used for
/// iteration. The lock is only held for the duration of a single call.
#[derive(Debug)]
pub struct Registry<R> {
    records: Mutex<HashMap<Id, R>>,
    capacity: Option<usize>,
}

impl<R> Default for Registry<R> {
    fn default() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            capacity: None,
        }
    }
}

impl<R: Record> Registry<R> {
    /// Creates a registry that refuses new records once `capacity` is reached
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            capacity: Some(capacity),
        }
    }

    /// Adds a record for a new connection
    ///
    /// A record is bound to its session for life, so an existing record is
    /// never replaced.
    ///
    /// # Errors
    ///
    /// Returns `Error::AlreadyRegistered` if the connection has a record and
    /// `Error::MaximumParticipants` if the registry is full.
    pub async fn add(&self, id: Id, record: R) -> Result<(), Error> {
        let mut records = self.records.lock().await;

        if records.contains_key(&id) {
            return Err(Error::AlreadyRegistered(id));
        }

        if self
            .capacity
            .is_some_and(|capacity| records.len() >= capacity)
        {
            return Err(Error::MaximumParticipants);
        }

        records.insert(id, record);

        Ok(())
    }

    /// Removes and returns the record for a connection
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the connection is not registered.
    pub async fn remove(&self, id: Id) -> Result<R, Error> {
        self.records
            .lock()
            .await
            .remove(&id)
            .ok_or(Error::NotFound(id))
    }

    /// Returns a copy of the record for a connection
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the connection is not registered.
    pub async fn get(&self, id: Id) -> Result<R, Error> {
        self.records
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or(Error::NotFound(id))
    }

    /// Applies `f` to the record for a connection under the registry lock
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the connection is not registered.
    pub async fn update<U, F: FnOnce(&mut R) -> U>(&self, id: Id, f: F) -> Result<U, Error> {
        self.records
            .lock()
            .await
            .get_mut(&id)
            .map(f)
            .ok_or(Error::NotFound(id))
    }

    /// Snapshots every record matching `predicate`
    pub async fn select<P: Fn(&R) -> bool>(&self, predicate: P) -> Vec<(Id, R)> {
        self.records
            .lock()
            .await
            .iter()
            .filter(|(_, record)| predicate(record))
            .map(|(id, record)| (*id, record.clone()))
            .collect()
    }

    /// Snapshots every record belonging to a session
    pub async fn in_session(&self, session: &str) -> Vec<(Id, R)> {
        self.select(|record| &**record.session() == session).await
    }

    /// Checks whether a connection is registered
    pub async fn contains(&self, id: Id) -> bool {
        self.records.lock().await.contains_key(&id)
    }

    /// Number of registered connections
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Whether the registry is empty
    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}
