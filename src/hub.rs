//! Connection event handlers
//!
//! The [`Hub`] owns the session registry, the participant and administrator
//! registries and the tunnel finder, and exposes one handler per inbound
//! event. Each handler is a unit of atomicity: it takes the turn of the
//! affected session, applies its transition, computes the resulting views,
//! releases the state lock and then delivers.
//!
//! Locks are always taken in the order session turn, session state,
//! registry, and registry locks are never held across a delivery.

use std::{sync::Arc, time::Duration};

use garde::Validate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::AbortHandle;

use crate::{
    AlarmMessage, NameStyle, UpdateMessage,
    answers::{self, Submission},
    broadcast::{Audience, BroadcastReport, Outbox, Role},
    constants::participants::{DEFAULT_ROSTER_LIMIT, MAX_PARTICIPANT_COUNT, MAX_ROSTER_LIMIT},
    quiz::config::Answer,
    registry::{self, Administrator, Id, Participant, Record, Registry},
    session::{self, Session, SessionState},
    sessions::{self, SessionRegistry},
    tunnel::TunnelFinder,
    view::{AdminView, SidebarView},
};

/// Errors returned by the event handlers
#[derive(Error, Serialize, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A connection lookup failed or a registry is full
    #[error(transparent)]
    Registry(#[from] registry::Error),
    /// A session transition was rejected
    #[error(transparent)]
    Session(#[from] session::Error),
    /// The named session does not exist
    #[error(transparent)]
    Sessions(#[from] sessions::Error),
    /// The message does not fit the role of the connection
    #[error("message is not allowed for this connection")]
    NotAllowed,
}

fn default_roster_limit() -> usize {
    DEFAULT_ROSTER_LIMIT
}

fn default_max_participants() -> usize {
    MAX_PARTICIPANT_COUNT
}

/// Runtime options of a hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct HubOptions {
    /// Whether revealing a question also refreshes participant views
    #[garde(skip)]
    #[serde(default)]
    pub reveal_to_participants: bool,
    /// Number of participants listed on the administrator roster
    #[garde(range(min = 1, max = MAX_ROSTER_LIMIT))]
    #[serde(default = "default_roster_limit")]
    pub roster_limit: usize,
    /// Maximum number of participants connected at once
    #[garde(range(min = 1, max = MAX_PARTICIPANT_COUNT))]
    #[serde(default = "default_max_participants")]
    pub max_participants: usize,
    /// Style of generated participant names
    #[garde(dive)]
    #[serde(default)]
    pub name_style: NameStyle,
}

impl Default for HubOptions {
    fn default() -> Self {
        Self {
            reveal_to_participants: false,
            roster_limit: DEFAULT_ROSTER_LIMIT,
            max_participants: MAX_PARTICIPANT_COUNT,
            name_style: NameStyle::default(),
        }
    }
}

/// Messages a participant connection may send
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum IncomingParticipantMessage {
    /// Join a session by name
    Join {
        /// Name of the session
        session: String,
    },
    /// Answer a question
    Answer {
        /// Index of the question the answer is for
        question: usize,
        /// The answer
        answer: Answer,
    },
    /// Ask for the current view again
    Register,
}

/// Messages an administrator connection may send
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum IncomingAdminMessage {
    /// Join a session by name
    Join {
        /// Name of the session
        session: String,
    },
    /// Reveal the answers of a question
    Reveal {
        /// Index of the question
        question: usize,
    },
    /// Move the session to a question
    Goto {
        /// Index of the question
        question: usize,
    },
}

/// Any message a connection may send
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, derive_more::From)]
pub enum IncomingMessage {
    /// Message from a participant connection
    Participant(IncomingParticipantMessage),
    /// Message from an administrator connection
    Admin(IncomingAdminMessage),
}

impl IncomingMessage {
    /// The role the sender claims
    pub fn role(&self) -> Role {
        match self {
            Self::Participant(_) => Role::Participant,
            Self::Admin(_) => Role::Administrator,
        }
    }

    /// Whether a connection currently holding `role` may send this message
    ///
    /// Joins are only valid from unregistered connections; everything else
    /// requires the matching registration.
    pub fn follows(&self, role: Option<Role>) -> bool {
        match (self, role) {
            (
                Self::Participant(IncomingParticipantMessage::Join { .. })
                | Self::Admin(IncomingAdminMessage::Join { .. }),
                None,
            ) => true,
            (
                Self::Participant(
                    IncomingParticipantMessage::Answer { .. } | IncomingParticipantMessage::Register,
                ),
                Some(Role::Participant),
            )
            | (
                Self::Admin(IncomingAdminMessage::Reveal { .. } | IncomingAdminMessage::Goto { .. }),
                Some(Role::Administrator),
            ) => true,
            _ => false,
        }
    }
}

struct Inner<F> {
    sessions: SessionRegistry,
    participants: Registry<Participant>,
    administrators: Registry<Administrator>,
    finder: F,
    options: HubOptions,
}

/// Entry point for every connection event
///
/// Cloning a hub is cheap; clones share the same registries.
pub struct Hub<F> {
    inner: Arc<Inner<F>>,
}

impl<F> Clone for Hub<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: TunnelFinder> Hub<F> {
    /// Creates a hub over loaded sessions
    ///
    /// # Errors
    ///
    /// Returns the validation report if `options` are out of bounds.
    pub fn new(
        sessions: SessionRegistry,
        finder: F,
        options: HubOptions,
    ) -> Result<Self, garde::Report> {
        options.validate()?;

        Ok(Self {
            inner: Arc::new(Inner {
                sessions,
                participants: Registry::with_capacity(options.max_participants),
                administrators: Registry::default(),
                finder,
                options,
            }),
        })
    }

    /// The loaded sessions
    pub fn sessions(&self) -> &SessionRegistry {
        &self.inner.sessions
    }

    /// The participant registry
    pub fn participants(&self) -> &Registry<Participant> {
        &self.inner.participants
    }

    /// The administrator registry
    pub fn administrators(&self) -> &Registry<Administrator> {
        &self.inner.administrators
    }

    /// The options the hub was created with
    pub fn options(&self) -> &HubOptions {
        &self.inner.options
    }

    fn session(&self, name: &str) -> Result<Arc<Session>, Error> {
        self.inner.sessions.get(name).map_err(|e| {
            tracing::warn!(session = name, "Unknown session");
            e.into()
        })
    }

    async fn audience(&self, session: &Session) -> Audience {
        Audience::of(
            session.name(),
            &self.inner.participants,
            &self.inner.administrators,
        )
        .await
    }

    fn deliver(&self, outbox: Outbox) -> BroadcastReport {
        outbox.deliver(&self.inner.finder)
    }

    /// Role of a connection, if it is registered
    pub async fn connection_role(&self, id: Id) -> Option<Role> {
        if self.inner.participants.contains(id).await {
            Some(Role::Participant)
        } else if self.inner.administrators.contains(id).await {
            Some(Role::Administrator)
        } else {
            None
        }
    }

    /// Registers a participant connection with a session
    ///
    /// The participant receives the current question and the administrators
    /// receive a refreshed roster.
    ///
    /// # Errors
    ///
    /// Fails if the session does not exist, the connection is already
    /// registered in either role, or the participant limit is reached.
    pub async fn participant_join(&self, id: Id, session: &str) -> Result<BroadcastReport, Error> {
        let session = self.session(session)?;

        if self.inner.administrators.contains(id).await {
            tracing::warn!(connection = %id, "Administrator tried to join as participant");
            return Err(registry::Error::AlreadyRegistered(id).into());
        }

        let participant = Participant::new(
            Arc::clone(session.name()),
            self.inner.options.name_style.get_name(),
        );
        let name = participant.name().to_owned();
        self.inner.participants.add(id, participant).await?;
        tracing::info!(session = %session.name(), connection = %id, name, "Participant joined");

        self.register(id).await
    }

    /// Resends the current view to a registered participant
    ///
    /// The participant receives its own view and the administrators of its
    /// session receive a refreshed roster.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the participant is not registered.
    pub async fn register(&self, id: Id) -> Result<BroadcastReport, Error> {
        let participant = self.inner.participants.get(id).await?;
        let session = self.session(participant.session())?;

        let _turn = session.turn().await;
        let outbox = {
            let state = session.state().await;
            let audience = self.audience(&session).await;

            let mut outbox = Outbox::default();
            if let Some(entry) = audience
                .participants
                .iter()
                .find(|(entry, _)| *entry == id)
            {
                outbox.participant(
                    &session,
                    &state,
                    entry,
                    self.inner.options.reveal_to_participants,
                );
            }
            outbox.sidebars(&session, &state, &audience, self.inner.options.roster_limit);
            outbox
        };

        Ok(self.deliver(outbox))
    }

    /// Registers an administrator connection with a session
    ///
    /// The administrator receives the main view and the roster.
    ///
    /// # Errors
    ///
    /// Fails if the session does not exist or the connection is already
    /// registered in either role.
    pub async fn admin_join(&self, id: Id, session: &str) -> Result<BroadcastReport, Error> {
        let session = self.session(session)?;

        if self.inner.participants.contains(id).await {
            tracing::warn!(connection = %id, "Participant tried to join as administrator");
            return Err(registry::Error::AlreadyRegistered(id).into());
        }

        self.inner
            .administrators
            .add(id, Administrator::new(Arc::clone(session.name())))
            .await?;
        tracing::info!(session = %session.name(), connection = %id, "Administrator joined");

        let _turn = session.turn().await;
        let outbox = {
            let state = session.state().await;
            let audience = self.audience(&session).await;

            let mut outbox = Outbox::default();
            outbox.push(
                id,
                Role::Administrator,
                AdminView::new(&session, &state, &audience.participants),
            );
            outbox.push(
                id,
                Role::Administrator,
                SidebarView::new(
                    &session,
                    &state,
                    &audience.participants,
                    self.inner.options.roster_limit,
                ),
            );
            outbox
        };

        Ok(self.deliver(outbox))
    }

    /// Removes a connection from whichever registry holds it
    ///
    /// A departing participant triggers a roster refresh for the
    /// administrators of its session.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the connection is not registered.
    pub async fn disconnect(&self, id: Id) -> Result<BroadcastReport, Error> {
        if let Ok(participant) = self.inner.participants.remove(id).await {
            tracing::info!(
                session = %participant.session(),
                connection = %id,
                name = participant.name(),
                "Participant left"
            );

            let session = self.session(participant.session())?;
            let _turn = session.turn().await;
            let outbox = {
                let state = session.state().await;
                let audience = self.audience(&session).await;

                let mut outbox = Outbox::default();
                outbox.sidebars(&session, &state, &audience, self.inner.options.roster_limit);
                outbox
            };

            return Ok(self.deliver(outbox));
        }

        match self.inner.administrators.remove(id).await {
            Ok(administrator) => {
                tracing::info!(
                    session = %administrator.session(),
                    connection = %id,
                    "Administrator left"
                );
                Ok(BroadcastReport::default())
            }
            Err(e) => {
                tracing::warn!(connection = %id, "Disconnect from unknown connection");
                Err(e.into())
            }
        }
    }

    fn schedule(&self, alarm: AlarmMessage, delay: Duration) -> AbortHandle {
        let hub = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            hub.receive_alarm(alarm).await;
        })
        .abort_handle()
    }

    /// Records an answer of a participant
    ///
    /// Stale and duplicate answers are absorbed and reported as
    /// `Submission::Ignored`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the participant is not registered.
    pub async fn submit_answer(
        &self,
        id: Id,
        index: usize,
        answer: Answer,
    ) -> Result<Submission, Error> {
        let participant = self.inner.participants.get(id).await?;
        let session = self.session(participant.session())?;

        let _turn = session.turn().await;
        let (submission, outbox) = {
            let mut state = session.state().await;
            let submission = answers::submit(
                &mut state,
                &self.inner.participants,
                session.name(),
                id,
                index,
                answer,
                |alarm, delay| self.schedule(alarm, delay),
            )
            .await?;

            let mut outbox = Outbox::default();
            if let Submission::Recorded { echo, .. } = submission {
                let audience = self.audience(&session).await;
                if echo {
                    if let Some(entry) = audience
                        .participants
                        .iter()
                        .find(|(participant, _)| *participant == id)
                    {
                        outbox.participant(
                            &session,
                            &state,
                            entry,
                            self.inner.options.reveal_to_participants,
                        );
                    }
                }
                outbox.admin_views(&session, &state, &audience);
                outbox.sidebars(&session, &state, &audience, self.inner.options.roster_limit);
            }
            (submission, outbox)
        };

        self.deliver(outbox);

        Ok(submission)
    }

    /// Reveals the answers of a question
    ///
    /// Administrators get a refreshed main view; participants only when
    /// `reveal_to_participants` is set.
    ///
    /// # Errors
    ///
    /// Fails if the connection is not an administrator or the index is out
    /// of range.
    pub async fn reveal(&self, id: Id, index: usize) -> Result<BroadcastReport, Error> {
        let administrator = self.inner.administrators.get(id).await?;
        let session = self.session(administrator.session())?;

        let _turn = session.turn().await;
        let outbox = {
            let mut state = session.state().await;
            state.reveal(index)?;
            tracing::info!(session = %session.name(), question = index, "Revealed answers");

            let audience = self.audience(&session).await;
            let mut outbox = Outbox::default();
            if self.inner.options.reveal_to_participants {
                for participant in &audience.participants {
                    outbox.participant(&session, &state, participant, true);
                }
            }
            outbox.admin_views(&session, &state, &audience);
            outbox
        };

        Ok(self.deliver(outbox))
    }

    /// Moves a session to a question on behalf of an administrator
    ///
    /// # Errors
    ///
    /// Fails if the connection is not an administrator or the index is out
    /// of range; the session is left untouched in that case.
    pub async fn advance(&self, id: Id, index: usize) -> Result<BroadcastReport, Error> {
        let administrator = self.inner.administrators.get(id).await?;
        let session = self.session(administrator.session())?;

        let _turn = session.turn().await;
        let outbox = {
            let mut state = session.state().await;
            let from = state.question_num();
            state.advance_to(index)?;
            tracing::info!(session = %session.name(), from, to = index, "Advanced session");

            self.session_update(&session, &state).await
        };

        Ok(self.deliver(outbox))
    }

    async fn session_update(&self, session: &Session, state: &SessionState) -> Outbox {
        let audience = self.audience(session).await;
        let mut outbox = Outbox::default();
        outbox.session_update(
            session,
            state,
            &audience,
            self.inner.options.reveal_to_participants,
            self.inner.options.roster_limit,
        );
        outbox
    }

    /// Applies a fired alarm
    ///
    /// Alarms that lost the race against a manual advance are dropped.
    pub async fn receive_alarm(&self, alarm: AlarmMessage) {
        let Ok(session) = self.session(alarm.session()) else {
            return;
        };

        let _turn = session.turn().await;
        let outbox = {
            let mut state = session.state().await;
            let from = state.question_num();
            match state.receive_alarm(&alarm) {
                Ok(true) => {}
                Ok(false) => return,
                Err(e) => {
                    tracing::warn!(session = %session.name(), error = %e, "Invalid alarm");
                    return;
                }
            }
            tracing::info!(
                session = %session.name(),
                from,
                to = state.question_num(),
                "Advanced session on timer"
            );

            self.session_update(&session, &state).await
        };

        self.deliver(outbox);
    }

    fn report_error(&self, id: Id, role: Role, error: Error) {
        let mut outbox = Outbox::default();
        outbox.push(id, role, UpdateMessage::Error(error));
        self.deliver(outbox);
    }

    /// Dispatches a message received from a connection
    ///
    /// Errors are reported back to the sending connection as well as
    /// returned.
    ///
    /// # Errors
    ///
    /// Fails if the message does not fit the connection's role or its
    /// handler fails.
    pub async fn receive_message(&self, id: Id, message: IncomingMessage) -> Result<(), Error> {
        let role = message.role();

        if !message.follows(self.connection_role(id).await) {
            tracing::warn!(connection = %id, ?message, "Message not allowed");
            self.report_error(id, role, Error::NotAllowed);
            return Err(Error::NotAllowed);
        }

        let result = match message {
            IncomingMessage::Participant(IncomingParticipantMessage::Join { session }) => {
                self.participant_join(id, &session).await.map(|_| ())
            }
            IncomingMessage::Participant(IncomingParticipantMessage::Answer {
                question,
                answer,
            }) => self.submit_answer(id, question, answer).await.map(|_| ()),
            IncomingMessage::Participant(IncomingParticipantMessage::Register) => {
                self.register(id).await.map(|_| ())
            }
            IncomingMessage::Admin(IncomingAdminMessage::Join { session }) => {
                self.admin_join(id, &session).await.map(|_| ())
            }
            IncomingMessage::Admin(IncomingAdminMessage::Reveal { question }) => {
                self.reveal(id, question).await.map(|_| ())
            }
            IncomingMessage::Admin(IncomingAdminMessage::Goto { question }) => {
                self.advance(id, question).await.map(|_| ())
            }
        };

        if let Err(e) = &result {
            self.report_error(id, role, e.clone());
        }

        result
    }
}
