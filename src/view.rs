//! Views pushed to connected clients
//!
//! Each view is a template reference plus the context bundle the template
//! is rendered with. Views are computed from a consistent snapshot of the
//! session state and the registries, then handed to the transport.

use serde::Serialize;
use serde_with::{TimestampMilliSeconds, serde_as};
use web_time::SystemTime;

use crate::{
    TruncatedVec,
    quiz::config::{Answer, Question, QuestionKind, TemplateRef},
    registry::{Id, Participant},
    session::{Session, SessionState},
};

/// Template used for the administrator roster
pub fn sidebar_template() -> TemplateRef {
    TemplateRef::new("users.html")
}

/// The parts of a question shown on every view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    /// Kind of the question
    pub kind: QuestionKind,
    /// The question text
    pub title: String,
    /// Options offered to participants
    pub choices: Vec<String>,
    /// Whether the answers are revealed
    pub revealed: bool,
}

impl QuestionView {
    fn new(question: &Question, show_revealed: bool) -> Self {
        Self {
            kind: question.kind(),
            title: question.title().to_owned(),
            choices: question.choices().to_vec(),
            revealed: show_revealed && question.revealed(),
        }
    }
}

/// The current question as seen by one participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantView {
    /// Template the view is rendered with
    pub template: TemplateRef,
    /// Name of the session
    pub session: String,
    /// Title of the session
    pub title: String,
    /// Index of the current question
    pub question_num: usize,
    /// Number of questions in the session
    pub count: usize,
    /// The current question
    pub question: QuestionView,
    /// The participant's own answer to the current question
    pub answer: Option<Answer>,
}

impl ParticipantView {
    /// Builds the view of `participant` on the current question
    ///
    /// The reveal flag is only passed through when `show_revealed` is set.
    pub fn new(
        session: &Session,
        state: &SessionState,
        participant: &Participant,
        show_revealed: bool,
    ) -> Self {
        let question_num = state.question_num();
        let question = state.current();

        Self {
            template: question.template().clone(),
            session: session.name().to_string(),
            title: session.title().to_owned(),
            question_num,
            count: state.len(),
            question: QuestionView::new(question, show_revealed),
            answer: participant
                .answer(question_num)
                .map(|recorded| recorded.answer.clone()),
        }
    }
}

/// One participant's response on the administrator view
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseView {
    /// Display name of the participant
    pub name: String,
    /// The recorded answer
    pub answer: Answer,
    /// When the answer was recorded
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub submitted_at: SystemTime,
}

/// The current question and its responses as seen by an administrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminView {
    /// Template the view is rendered with
    pub template: TemplateRef,
    /// Name of the session
    pub session: String,
    /// Title of the session
    pub title: String,
    /// Index of the current question
    pub question_num: usize,
    /// Number of questions in the session
    pub count: usize,
    /// The current question
    pub question: QuestionView,
    /// Responses to the current question, oldest first
    pub responses: Vec<ResponseView>,
    /// Number of participants who answered the current question
    pub answered_count: usize,
    /// Number of participants connected to the session
    pub participant_count: usize,
}

impl AdminView {
    /// Builds the administrator view from the participants of the session
    pub fn new(session: &Session, state: &SessionState, participants: &[(Id, Participant)]) -> Self {
        let question_num = state.question_num();
        let question = state.current();

        let mut responses = participants
            .iter()
            .filter_map(|(_, participant)| {
                participant
                    .answer(question_num)
                    .map(|recorded| ResponseView {
                        name: participant.name().to_owned(),
                        answer: recorded.answer.clone(),
                        submitted_at: recorded.submitted_at,
                    })
            })
            .collect::<Vec<_>>();
        responses.sort_by(|a, b| {
            a.submitted_at
                .cmp(&b.submitted_at)
                .then_with(|| a.name.cmp(&b.name))
        });

        Self {
            template: question.admin_template().clone(),
            session: session.name().to_string(),
            title: session.title().to_owned(),
            question_num,
            count: state.len(),
            question: QuestionView::new(question, true),
            answered_count: responses.len(),
            responses,
            participant_count: participants.len(),
        }
    }
}

/// One line of the administrator roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterEntry {
    /// Display name of the participant
    pub name: String,
    /// Whether the participant answered the current question
    pub answered: bool,
}

/// The participant roster shown next to the administrator view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SidebarView {
    /// Template the view is rendered with
    pub template: TemplateRef,
    /// Name of the session
    pub session: String,
    /// Index of the current question
    pub question_num: usize,
    /// Participants sorted by name, truncated to the roster limit
    pub participants: TruncatedVec<RosterEntry>,
}

impl SidebarView {
    /// Builds the roster from the participants of the session
    pub fn new(
        session: &Session,
        state: &SessionState,
        participants: &[(Id, Participant)],
        limit: usize,
    ) -> Self {
        let question_num = state.question_num();

        let mut roster = participants
            .iter()
            .map(|(_, participant)| RosterEntry {
                name: participant.name().to_owned(),
                answered: participant.has_answered(question_num),
            })
            .collect::<Vec<_>>();
        roster.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            template: sidebar_template(),
            session: session.name().to_string(),
            question_num,
            participants: TruncatedVec::new(roster.into_iter(), limit, participants.len()),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::quiz::{
        config::{QuestionConfig, QuizConfig},
        multiple_choice, speed,
    };
    use std::{sync::Arc, time::Duration};

    fn create_session() -> Session {
        let config = QuizConfig {
            title: "Pub quiz".to_owned(),
            questions: vec![
                QuestionConfig::MultipleChoice(multiple_choice::QuestionConfig::new(
                    "Capital of France?",
                    vec!["Paris".to_owned(), "Lyon".to_owned()],
                )),
                QuestionConfig::Speed(speed::QuestionConfig::new(
                    "Quick: 7 x 8?",
                    Duration::from_secs(5),
                )),
            ],
        };
        Session::new("quiz1", &config).unwrap()
    }

    fn participant(name: &str) -> Participant {
        Participant::new(Arc::from("quiz1"), name.to_owned())
    }

    #[tokio::test]
    async fn test_participant_view_shows_own_answer() {
        let session = create_session();
        let state = session.state().await;
        let mut p = participant("Brave Otter");
        p.record_answer(0, Answer::from("Paris"));

        let view = ParticipantView::new(&session, &state, &p, false);
        assert_eq!(view.template.as_str(), "multiple_choice.html");
        assert_eq!(view.session, "quiz1");
        assert_eq!(view.question_num, 0);
        assert_eq!(view.count, 2);
        assert_eq!(view.question.choices, ["Paris", "Lyon"]);
        assert_eq!(view.answer, Some(Answer::from("Paris")));
    }

    #[tokio::test]
    async fn test_reveal_is_hidden_from_participants_unless_enabled() {
        let session = create_session();
        let mut state = session.state().await;
        state.reveal(0).unwrap();
        let p = participant("Brave Otter");

        assert!(!ParticipantView::new(&session, &state, &p, false).question.revealed);
        assert!(ParticipantView::new(&session, &state, &p, true).question.revealed);
        assert!(AdminView::new(&session, &state, &[]).question.revealed);
    }

    #[tokio::test]
    async fn test_admin_view_lists_responses_in_submission_order() {
        let session = create_session();
        let state = session.state().await;

        let mut first = participant("Zesty Yak");
        first.record_answer(0, Answer::from("Lyon"));
        tokio::time::sleep(Duration::from_millis(5)).await;
        let mut second = participant("Able Ant");
        second.record_answer(0, Answer::from("Paris"));
        let silent = participant("Quiet Mole");

        let participants = vec![(Id::new(), second), (Id::new(), silent), (Id::new(), first)];
        let view = AdminView::new(&session, &state, &participants);

        assert_eq!(view.template.as_str(), "multiple_choice_admin.html");
        assert_eq!(view.answered_count, 2);
        assert_eq!(view.participant_count, 3);
        assert_eq!(
            view.responses
                .iter()
                .map(|response| response.name.as_str())
                .collect::<Vec<_>>(),
            ["Zesty Yak", "Able Ant"]
        );
    }

    #[tokio::test]
    async fn test_sidebar_is_sorted_and_truncated() {
        let session = create_session();
        let state = session.state().await;

        let mut answered = participant("Brave Otter");
        answered.record_answer(0, Answer::from("Paris"));
        let participants = vec![
            (Id::new(), participant("Calm Heron")),
            (Id::new(), answered),
            (Id::new(), participant("Able Ant")),
        ];

        let view = SidebarView::new(&session, &state, &participants, 2);
        assert_eq!(view.template.as_str(), "users.html");
        assert_eq!(view.participants.exact_count(), 3);
        assert_eq!(
            view.participants.items(),
            [
                RosterEntry {
                    name: "Able Ant".to_owned(),
                    answered: false,
                },
                RosterEntry {
                    name: "Brave Otter".to_owned(),
                    answered: true,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_views_serialize() {
        let session = create_session();
        let state = session.state().await;
        let mut p = participant("Brave Otter");
        p.record_answer(0, Answer::from("Paris"));

        let json = serde_json::to_string(&AdminView::new(&session, &state, &[(Id::new(), p)]))
            .unwrap();
        assert!(json.contains("\"submitted_at\":"));
        assert!(json.contains("\"answer\":\"Paris\""));
    }
}
