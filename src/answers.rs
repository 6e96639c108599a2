//! Answer collector
//!
//! Validates and records participant answers against the current question,
//! then reports which side effects the submission calls for. Submissions
//! for any question other than the current one are dropped silently.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::task::AbortHandle;

use crate::{
    AlarmMessage,
    quiz::{common::AnswerRules, config::Answer},
    registry::{self, Id, Participant, Registry},
    session::SessionState,
};

/// Reasons an answer is not recorded
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The answer targets a question that is not current
    #[error("answer for question {submitted} while question {current} is active")]
    Stale {
        /// The question the answer was meant for
        submitted: usize,
        /// The current question
        current: usize,
    },
    /// The question accepts a single answer and one is already recorded
    #[error("question only accepts a single answer")]
    Duplicate,
    /// The question does not accept this answer
    #[error("answer is not accepted by the question")]
    NotAccepted,
}

/// Outcome of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// The answer was recorded
    Recorded {
        /// The submitter should get a refreshed view
        echo: bool,
        /// This answer armed the automatic advance
        timer_armed: bool,
    },
    /// The answer was dropped
    Ignored(Rejection),
}

/// Records an answer for the current question of a session
///
/// Steps run in order: the index is checked against the current question,
/// the question's rules are applied, the answer is stored on the
/// participant, and finally the first-answer hook may arm a timer through
/// `schedule`. The caller must hold the session turn while calling this.
///
/// # Errors
///
/// Returns `registry::Error::NotFound` if the participant disconnected.
pub async fn submit<S>(
    state: &mut SessionState,
    participants: &Registry<Participant>,
    session: &str,
    id: Id,
    index: usize,
    answer: Answer,
    schedule: S,
) -> Result<Submission, registry::Error>
where
    S: FnOnce(AlarmMessage, Duration) -> AbortHandle,
{
    let current = state.question_num();
    if index != current {
        tracing::debug!(
            connection = %id,
            submitted = index,
            current,
            "Dropping answer for inactive question"
        );
        return Ok(Submission::Ignored(Rejection::Stale {
            submitted: index,
            current,
        }));
    }

    let participant = participants.get(id).await?;
    let question = state.current();
    if let Err(rejection) = question.check(&participant, index, &answer) {
        tracing::debug!(connection = %id, %rejection, "Dropping answer");
        return Ok(Submission::Ignored(rejection));
    }
    let echo = question.echoes_answer();

    participants
        .update(id, |participant| participant.record_answer(index, answer))
        .await?;

    let timer_armed = state.on_answer(session, schedule);
    if timer_armed {
        tracing::info!(session, question = index, "Armed automatic advance");
    }

    Ok(Submission::Recorded { echo, timer_armed })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::{
        quiz::{
            config::{QuestionConfig, QuizConfig},
            free_text, multiple_choice, speed,
        },
        session::Session,
    };
    use std::sync::Arc;

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
                QuestionConfig::FreeText(free_text::QuestionConfig::new("Anything else?")),
            ],
        };
        Session::new("quiz1", &config).unwrap()
    }

    async fn join(participants: &Registry<Participant>) -> Id {
        let id = Id::new();
        participants
            .add(id, Participant::new(Arc::from("quiz1"), "Brave Otter".to_owned()))
            .await
            .unwrap();
        id
    }

    fn no_timer(_: AlarmMessage, _: Duration) -> AbortHandle {
        unreachable!("no timer expected")
    }

    #[tokio::test]
    async fn test_stale_answer_is_dropped() {
        let session = create_session();
        let participants = Registry::default();
        let id = join(&participants).await;
        let mut state = session.state().await;

        let result = submit(
            &mut state,
            &participants,
            "quiz1",
            id,
            1,
            Answer::from("56"),
            no_timer,
        )
        .await;
        assert_eq!(
            result,
            Ok(Submission::Ignored(Rejection::Stale {
                submitted: 1,
                current: 0
            }))
        );
        assert!(!participants.get(id).await.unwrap().has_answered(1));
    }

    #[tokio::test]
    async fn test_multiple_choice_overwrites_and_echoes() {
        let session = create_session();
        let participants = Registry::default();
        let id = join(&participants).await;
        let mut state = session.state().await;

        for answer in ["Lyon", "Paris"] {
            let result = submit(
                &mut state,
                &participants,
                "quiz1",
                id,
                0,
                Answer::from(answer),
                no_timer,
            )
            .await;
            assert_eq!(
                result,
                Ok(Submission::Recorded {
                    echo: true,
                    timer_armed: false
                })
            );
        }
        let participant = participants.get(id).await.unwrap();
        assert_eq!(participant.answer(0).unwrap().answer, Answer::from("Paris"));

        let result = submit(
            &mut state,
            &participants,
            "quiz1",
            id,
            0,
            Answer::from("Nice"),
            no_timer,
        )
        .await;
        assert_eq!(result, Ok(Submission::Ignored(Rejection::NotAccepted)));
    }

    #[tokio::test]
    async fn test_speed_first_answer_arms_and_second_is_duplicate() {
        let session = create_session();
        let participants = Registry::default();
        let first = join(&participants).await;
        let second = join(&participants).await;
        let mut state = session.state().await;
        state.advance_to(1).unwrap();

        let mut alarms = Vec::new();
        let result = submit(
            &mut state,
            &participants,
            "quiz1",
            first,
            1,
            Answer::from("56"),
            |alarm, _| {
                alarms.push(alarm);
                tokio::spawn(async {}).abort_handle()
            },
        )
        .await;
        assert_eq!(
            result,
            Ok(Submission::Recorded {
                echo: false,
                timer_armed: true
            })
        );
        assert_eq!(alarms.len(), 1);

        let result = submit(
            &mut state,
            &participants,
            "quiz1",
            first,
            1,
            Answer::from("54"),
            no_timer,
        )
        .await;
        assert_eq!(result, Ok(Submission::Ignored(Rejection::Duplicate)));

        // other participants answer without re-arming
        let result = submit(
            &mut state,
            &participants,
            "quiz1",
            second,
            1,
            Answer::from("54"),
            no_timer,
        )
        .await;
        assert_eq!(
            result,
            Ok(Submission::Recorded {
                echo: false,
                timer_armed: false
            })
        );
    }

    #[tokio::test]
    async fn test_unknown_participant_is_not_found() {
        let session = create_session();
        let participants = Registry::default();
        let mut state = session.state().await;
        let id = Id::new();

        let result = submit(
            &mut state,
            &participants,
            "quiz1",
            id,
            0,
            Answer::from("Paris"),
            no_timer,
        )
        .await;
        assert_eq!(result, Err(registry::Error::NotFound(id)));
    }
}
