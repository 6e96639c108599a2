//! Broadcast coordinator
//!
//! Views are computed into an [`Outbox`] while the session state is locked,
//! and delivered afterwards with no lock held. Delivery to one connection
//! never depends on delivery to another: a missing or failing tunnel is
//! logged, counted, and skipped.

use enum_map::{Enum, EnumMap};
use serde::Serialize;

use crate::{
    UpdateMessage,
    registry::{Administrator, Id, Participant, Registry},
    session::{Session, SessionState},
    tunnel::{Tunnel, TunnelFinder},
    view::{AdminView, ParticipantView, SidebarView},
};

/// The role a recipient holds in its session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Serialize)]
pub enum Role {
    /// A participant connection
    Participant,
    /// An administrator connection
    Administrator,
}

/// Snapshot of the connections of one session
#[derive(Debug, Clone, Default)]
pub struct Audience {
    /// Participants of the session
    pub participants: Vec<(Id, Participant)>,
    /// Administrators of the session
    pub administrators: Vec<(Id, Administrator)>,
}

impl Audience {
    /// Snapshots both registries for a session
    pub async fn of(
        session: &str,
        participants: &Registry<Participant>,
        administrators: &Registry<Administrator>,
    ) -> Self {
        Self {
            participants: participants.in_session(session).await,
            administrators: administrators.in_session(session).await,
        }
    }
}

/// A message addressed to one connection
#[derive(Debug, Clone)]
pub struct Envelope {
    /// The receiving connection
    pub recipient: Id,
    /// Role of the receiving connection
    pub role: Role,
    /// The message to deliver
    pub message: UpdateMessage,
}

/// Messages waiting to be delivered, in order
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    envelopes: Vec<Envelope>,
}

impl Outbox {
    /// Queues a message for one connection
    pub fn push(&mut self, recipient: Id, role: Role, message: impl Into<UpdateMessage>) {
        self.envelopes.push(Envelope {
            recipient,
            role,
            message: message.into(),
        });
    }

    /// Queues the view of one participant
    pub fn participant(
        &mut self,
        session: &Session,
        state: &SessionState,
        (id, participant): &(Id, Participant),
        show_revealed: bool,
    ) {
        self.push(
            *id,
            Role::Participant,
            ParticipantView::new(session, state, participant, show_revealed),
        );
    }

    /// Queues the main view of every administrator
    pub fn admin_views(&mut self, session: &Session, state: &SessionState, audience: &Audience) {
        let view = AdminView::new(session, state, &audience.participants);
        for (id, _) in &audience.administrators {
            self.push(*id, Role::Administrator, view.clone());
        }
    }

    /// Queues the roster of every administrator
    pub fn sidebars(
        &mut self,
        session: &Session,
        state: &SessionState,
        audience: &Audience,
        roster_limit: usize,
    ) {
        let view = SidebarView::new(session, state, &audience.participants, roster_limit);
        for (id, _) in &audience.administrators {
            self.push(*id, Role::Administrator, view.clone());
        }
    }

    /// Queues the full update that follows a change of question
    ///
    /// Every participant gets its own view first, then every administrator
    /// gets the main view and the roster.
    pub fn session_update(
        &mut self,
        session: &Session,
        state: &SessionState,
        audience: &Audience,
        show_revealed: bool,
        roster_limit: usize,
    ) {
        for participant in &audience.participants {
            self.participant(session, state, participant, show_revealed);
        }
        self.admin_views(session, state, audience);
        self.sidebars(session, state, audience, roster_limit);
    }

    /// Number of queued messages
    pub fn len(&self) -> usize {
        self.envelopes.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.envelopes.is_empty()
    }

    /// The queued messages, in delivery order
    pub fn envelopes(&self) -> &[Envelope] {
        &self.envelopes
    }

    /// Hands every queued message to its tunnel
    ///
    /// Must be called with no session or registry lock held.
    pub fn deliver<F: TunnelFinder>(self, finder: &F) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        if self.is_empty() {
            return report;
        }
        let queued = self.len();

        for Envelope {
            recipient,
            role,
            message,
        } in self.envelopes
        {
            let Some(tunnel) = finder.find(recipient) else {
                tracing::warn!(
                    connection = %recipient,
                    event = message.event(),
                    "No tunnel for connection"
                );
                report.failed[role] += 1;
                continue;
            };

            match tunnel.send_message(&message) {
                Ok(()) => report.delivered[role] += 1,
                Err(e) => {
                    tracing::warn!(
                        connection = %recipient,
                        event = message.event(),
                        error = %e,
                        "Failed to deliver update"
                    );
                    report.failed[role] += 1;
                }
            }
        }

        tracing::trace!(queued, ?report, "Delivered updates");

        report
    }
}

/// Per-role delivery counts of one broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    /// Messages handed to a tunnel
    pub delivered: EnumMap<Role, usize>,
    /// Messages dropped because the tunnel was missing or failed
    pub failed: EnumMap<Role, usize>,
}

impl BroadcastReport {
    /// Total number of delivered messages
    pub fn delivered_total(&self) -> usize {
        self.delivered.values().sum()
    }

    /// Total number of dropped messages
    pub fn failed_total(&self) -> usize {
        self.failed.values().sum()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::{
        quiz::config::{Answer, QuestionConfig, QuizConfig},
        quiz::free_text,
        testing::{FailingTunnel, RecordingTunnels},
    };
    use std::sync::Arc;

    fn create_session() -> Session {
        let config = QuizConfig {
            title: "Pub quiz".to_owned(),
            questions: vec![
                QuestionConfig::FreeText(free_text::QuestionConfig::new("One?")),
                QuestionConfig::FreeText(free_text::QuestionConfig::new("Two?")),
            ],
        };
        Session::new("quiz1", &config).unwrap()
    }

    fn audience(participants: usize, administrators: usize) -> Audience {
        Audience {
            participants: (0..participants)
                .map(|i| {
                    (
                        Id::new(),
                        Participant::new(Arc::from("quiz1"), format!("Player {i}")),
                    )
                })
                .collect(),
            administrators: (0..administrators)
                .map(|_| (Id::new(), Administrator::new(Arc::from("quiz1"))))
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_session_update_order() {
        let session = create_session();
        let state = session.state().await;
        let audience = audience(2, 1);

        let mut outbox = Outbox::default();
        outbox.session_update(&session, &state, &audience, false, 10);

        let kinds = outbox
            .envelopes()
            .iter()
            .map(|envelope| (envelope.role, envelope.message.event()))
            .collect::<Vec<_>>();
        assert_eq!(
            kinds,
            [
                (Role::Participant, "update"),
                (Role::Participant, "update"),
                (Role::Administrator, "update"),
                (Role::Administrator, "update_left"),
            ]
        );
    }

    #[tokio::test]
    async fn test_deliver_counts_per_role() {
        let session = create_session();
        let state = session.state().await;
        let audience = audience(3, 2);
        let tunnels = RecordingTunnels::default();

        let mut outbox = Outbox::default();
        outbox.session_update(&session, &state, &audience, false, 10);
        assert_eq!(outbox.len(), 7);
        let report = outbox.deliver(&tunnels.finder());

        assert_eq!(report.delivered[Role::Participant], 3);
        assert_eq!(report.delivered[Role::Administrator], 4);
        assert_eq!(report.failed_total(), 0);

        let (admin, _) = &audience.administrators[0];
        assert_eq!(tunnels.events(*admin), ["update", "update_left"]);
    }

    #[tokio::test]
    async fn test_one_failing_tunnel_does_not_stop_the_rest() {
        let session = create_session();
        let mut state = session.state().await;
        let audience = audience(3, 0);
        let tunnels = RecordingTunnels::default();
        let (broken, _) = audience.participants[1];
        tunnels.break_connection(broken);

        state.advance_to(1).unwrap();
        let mut outbox = Outbox::default();
        outbox.session_update(&session, &state, &audience, false, 10);
        let report = outbox.deliver(&tunnels.finder());

        assert_eq!(report.delivered[Role::Participant], 2);
        assert_eq!(report.failed[Role::Participant], 1);
        for (id, _) in [&audience.participants[0], &audience.participants[2]] {
            assert_eq!(tunnels.events(*id), ["update"]);
        }
        assert!(tunnels.messages(broken).is_empty());
    }

    #[test]
    fn test_missing_tunnel_is_counted() {
        let mut outbox = Outbox::default();
        outbox.push(
            Id::new(),
            Role::Administrator,
            crate::hub::Error::NotAllowed,
        );
        let report = outbox.deliver(&|_: Id| None::<FailingTunnel>);
        assert_eq!(report.failed[Role::Administrator], 1);
        assert_eq!(report.delivered_total(), 0);
    }

    #[test]
    fn test_failing_tunnel_is_counted() {
        let mut outbox = Outbox::default();
        outbox.push(Id::new(), Role::Participant, crate::hub::Error::NotAllowed);
        outbox.push(Id::new(), Role::Participant, crate::hub::Error::NotAllowed);
        let report = outbox.deliver(&|_: Id| Some(FailingTunnel));
        assert_eq!(report.failed[Role::Participant], 2);
        assert_eq!(report.failed_total(), 2);
    }

    #[test]
    fn test_empty_outbox_reports_nothing() {
        let outbox = Outbox::default();
        assert!(outbox.is_empty());
        let report = outbox.deliver(&|_: Id| -> Option<FailingTunnel> {
            panic!("no tunnel should be looked up")
        });
        assert_eq!(report, BroadcastReport::default());
    }

    #[tokio::test]
    async fn test_participant_view_carries_answer() {
        let session = create_session();
        let state = session.state().await;
        let mut audience = audience(1, 0);
        audience.participants[0]
            .1
            .record_answer(0, Answer::from("because"));

        let mut outbox = Outbox::default();
        outbox.participant(&session, &state, &audience.participants[0], false);
        let UpdateMessage::Participant(view) = &outbox.envelopes()[0].message else {
            panic!("expected a participant view");
        };
        assert_eq!(view.answer, Some(Answer::from("because")));
    }
}
