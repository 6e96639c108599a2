//! Session state machine
//!
//! A session walks through its questions under the control of its
//! administrators. The state here is the mutable half of a session: the
//! question states, the current question, and an activation counter that
//! tells live alarms from stale ones.
//!
//! Two locks guard a session. The `turn` lock is held for a whole
//! transition including the broadcast it causes, so transitions of one
//! session never interleave. The `state` lock is only held while reading or
//! mutating the state and is always released before any tunnel is called.

use std::{sync::Arc, time::Duration};

use serde::Serialize;
use thiserror::Error;
use tokio::{
    sync::{Mutex, MutexGuard},
    task::AbortHandle,
};

use crate::{
    AlarmMessage,
    quiz::{
        common::{AnswerRules, Timer},
        config::{Question, QuizConfig},
    },
};

/// Errors that can occur while driving a session
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The requested question does not exist
    #[error("question {index} is outside of the {count} questions of the session")]
    InvalidIndex {
        /// The requested index
        index: usize,
        /// Number of questions in the session
        count: usize,
    },
    /// A session must contain at least one question
    #[error("session has no questions")]
    NoQuestions,
}

/// A loaded session
#[derive(Debug)]
pub struct Session {
    name: Arc<str>,
    title: String,
    turn: Mutex<()>,
    state: Mutex<SessionState>,
}

impl Session {
    /// Creates a session from its definition, positioned on the first question
    ///
    /// # Errors
    ///
    /// Returns `Error::NoQuestions` if the definition is empty.
    pub fn new(name: impl Into<Arc<str>>, config: &QuizConfig) -> Result<Self, Error> {
        if config.is_empty() {
            return Err(Error::NoQuestions);
        }

        Ok(Self {
            name: name.into(),
            title: config.title.clone(),
            turn: Mutex::new(()),
            state: Mutex::new(SessionState {
                questions: config
                    .questions
                    .iter()
                    .map(|question| question.to_state())
                    .collect(),
                question_num: 0,
                activation: 0,
            }),
        })
    }

    /// The unique session name
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    /// The session title
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Waits for exclusive right to perform a transition on this session
    pub async fn turn(&self) -> MutexGuard<'_, ()> {
        self.turn.lock().await
    }

    /// Locks the mutable session state
    pub async fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().await
    }

    /// The index of the current question
    pub async fn question_num(&self) -> usize {
        self.state.lock().await.question_num
    }
}

/// Mutable state of a session
#[derive(Debug)]
pub struct SessionState {
    questions: Vec<Question>,
    question_num: usize,
    /// Incremented on every advance
    activation: u64,
}

impl SessionState {
    /// The index of the current question
    pub fn question_num(&self) -> usize {
        self.question_num
    }

    /// Identifies the current activation of the current question
    pub fn activation(&self) -> u64 {
        self.activation
    }

    /// Number of questions in the session
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Always `false`; a session is never created without questions
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// All questions of the session
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// The question at `index`, if it exists
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    /// The current question
    pub fn current(&self) -> &Question {
        &self.questions[self.question_num]
    }

    /// The current question, mutably
    pub fn current_mut(&mut self) -> &mut Question {
        &mut self.questions[self.question_num]
    }

    fn check_index(&self, index: usize) -> Result<(), Error> {
        if index < self.questions.len() {
            Ok(())
        } else {
            Err(Error::InvalidIndex {
                index,
                count: self.questions.len(),
            })
        }
    }

    /// Moves the session to `index`
    ///
    /// Any timer armed by the outgoing question is cancelled first. Moving to
    /// the current index is allowed and re-activates the question.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidIndex` and leaves the state untouched if the
    /// index is out of range.
    pub fn advance_to(&mut self, index: usize) -> Result<(), Error> {
        self.check_index(index)?;

        if self.current_mut().cancel_timer() {
            tracing::debug!(
                from = self.question_num,
                to = index,
                "Cancelled pending automatic advance"
            );
        }

        self.question_num = index;
        self.activation += 1;

        Ok(())
    }

    /// Marks the answers of the question at `index` as revealed
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidIndex` if the index is out of range.
    pub fn reveal(&mut self, index: usize) -> Result<(), Error> {
        self.check_index(index)?;
        self.questions[index].reveal();
        Ok(())
    }

    /// Runs the first-answer hook of the current question
    ///
    /// For a speed question this arms the automatic advance to the next
    /// question; `schedule` receives the alarm and the delay and returns the
    /// handle of the scheduled task. The last question never arms a timer.
    /// Returns `true` if a timer was armed.
    pub fn on_answer<S>(&mut self, session: &str, schedule: S) -> bool
    where
        S: FnOnce(AlarmMessage, Duration) -> AbortHandle,
    {
        let index = self.question_num;
        let to = index + 1;
        if to >= self.questions.len() {
            return false;
        }

        let activation = self.activation;
        let session = session.to_owned();
        self.current_mut().on_first_answer(move |delay| {
            let alarm = AlarmMessage::ProceedFromQuestion {
                session,
                index,
                to,
                activation,
            };
            Timer::new(to, activation, schedule(alarm, delay))
        })
    }

    /// Applies a fired alarm
    ///
    /// The alarm only takes effect if its question is still current, in the
    /// same activation, and still owns the timer the alarm was armed with.
    /// Returns `true` if the session advanced.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidIndex` if the alarm targets a question that
    /// does not exist.
    pub fn receive_alarm(&mut self, alarm: &AlarmMessage) -> Result<bool, Error> {
        let AlarmMessage::ProceedFromQuestion {
            index,
            to,
            activation,
            ..
        } = *alarm;

        if self.question_num != index || self.activation != activation {
            tracing::debug!(
                index,
                current = self.question_num,
                activation,
                "Ignoring stale alarm"
            );
            return Ok(false);
        }

        self.check_index(to)?;

        let armed = self
            .current()
            .timer()
            .is_some_and(|timer| timer.activation() == activation && timer.target() == to);
        if !armed {
            tracing::debug!(
                index,
                to,
                activation,
                "Ignoring alarm without a matching timer"
            );
            return Ok(false);
        }

        let Some(timer) = self.current_mut().take_timer() else {
            return Ok(false);
        };
        // the alarm is running inside the timer's own task
        timer.disarm();

        self.advance_to(to)?;

        Ok(true)
    }
}
