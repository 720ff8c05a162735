use std::sync::Arc;

use chrono::Duration;
use quiz_core::model::{
    AnswerSet, Attempt, AttemptId, Choice, ChoiceId, CourseId, Question, QuestionId,
    QuizDefinition, QuizDraft, QuizId,
};
use quiz_core::time::fixed_now;
use services::{
    AttemptResolver, BackendOperation, Clock, InMemoryQuizBackend, RemoteError, SessionError,
    SessionPhase,
    SubmitOutcome, SubmitTrigger,
};
use storage::{AnswerStore, InMemoryAnswerStore};

const QUIZ: QuizId = QuizId::new(11);
const COURSE: CourseId = CourseId::new(5);

/// Five one-point questions with a one minute limit.
fn timed_quiz() -> QuizDefinition {
    let questions = (1..=5)
        .map(|id| {
            Question::new(
                QuestionId::new(id),
                format!("Q{id}"),
                vec![
                    Choice::new(ChoiceId::new(id * 10), "yes"),
                    Choice::new(ChoiceId::new(id * 10 + 1), "no"),
                ],
                1,
                u32::try_from(id).unwrap(),
            )
        })
        .collect();
    QuizDefinition::new(QuizDraft {
        id: QUIZ,
        course_id: COURSE,
        title: "Async Rust".into(),
        description: String::new(),
        questions,
        time_limit_secs: Some(60),
        pass_threshold: None,
    })
    .unwrap()
}

fn three_of_five() -> AnswerSet {
    [
        (QuestionId::new(1), ChoiceId::new(10)),
        (QuestionId::new(2), ChoiceId::new(21)),
        (QuestionId::new(4), ChoiceId::new(40)),
    ]
    .into_iter()
    .collect()
}

/// An attempt started at the fixed timestamp, reopened `elapsed_secs` later.
async fn reopen_after(
    elapsed_secs: i64,
) -> (InMemoryQuizBackend, InMemoryAnswerStore, AttemptResolver) {
    let mut clock = Clock::fixed(fixed_now());
    clock.advance(Duration::seconds(elapsed_secs));

    let backend = InMemoryQuizBackend::new(clock);
    backend.add_quiz(timed_quiz(), (1..=5).map(|id| ChoiceId::new(id * 10)));
    backend.enroll(COURSE);
    backend.seed_attempt(Attempt::start(AttemptId::new(1), QUIZ, fixed_now()));

    let store = InMemoryAnswerStore::new();
    store.save(QUIZ, &three_of_five()).await.unwrap();

    let resolver = AttemptResolver::new(clock, Arc::new(backend.clone()), Arc::new(store.clone()));
    (backend, store, resolver)
}

#[tokio::test(start_paused = true)]
async fn expired_deadline_fires_on_open_and_sends_saved_answers() {
    let (backend, store, resolver) = reopen_after(65).await;
    let session = resolver.open(QUIZ).await.unwrap();
    assert_eq!(session.phase(), SessionPhase::AnsweringTimed);

    let timer = session.deadline_controller().unwrap();
    assert_eq!(timer.remaining_display(), "00:00");

    let before = tokio::time::Instant::now();
    let outcome = timer.drive(&session).await.unwrap();
    assert_eq!(before.elapsed(), std::time::Duration::ZERO);
    assert!(matches!(outcome, SubmitOutcome::Graded(_)));

    let submissions = backend.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].trigger, SubmitTrigger::Timeout);
    assert_eq!(submissions[0].answers, three_of_five().entries());

    assert_eq!(session.phase(), SessionPhase::Completed);
    assert!(store.load(QUIZ).await.unwrap().is_empty());
    assert!(timer.poll().is_none());
}

#[tokio::test(start_paused = true)]
async fn reload_keeps_counting_from_the_attempt_start() {
    let (_backend, _store, resolver) = reopen_after(45).await;
    let session = resolver.open(QUIZ).await.unwrap();
    assert_eq!(session.answers(), three_of_five());

    let timer = session.deadline_controller().unwrap();
    assert_eq!(timer.remaining_display(), "00:15");
    assert!(timer.poll().is_none());

    let before = tokio::time::Instant::now();
    assert!(timer.wait().await.is_some());
    assert_eq!(before.elapsed(), std::time::Duration::from_secs(15));
}

#[tokio::test(start_paused = true)]
async fn manual_submit_before_deadline_suppresses_the_timer() {
    let (backend, _store, resolver) = reopen_after(10).await;
    let session = resolver.open(QUIZ).await.unwrap();
    let timer = session.deadline_controller().unwrap();

    session.submit(SubmitTrigger::User).await.unwrap();
    let outcome = timer.drive(&session).await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Suppressed);
    assert_eq!(backend.calls(BackendOperation::SubmitAttempt), 1);
}

#[tokio::test(start_paused = true)]
async fn timer_of_a_finished_attempt_leaves_the_retake_alone() {
    let (backend, _store, resolver) = reopen_after(10).await;
    let session = resolver.open(QUIZ).await.unwrap();
    let old_timer = session.deadline_controller().unwrap();

    session.submit(SubmitTrigger::User).await.unwrap();
    session.retake().await.unwrap();
    assert_eq!(session.phase(), SessionPhase::AnsweringTimed);

    let outcome = old_timer.drive(&session).await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Suppressed);
    assert!(session.phase().is_answering());
    assert_eq!(backend.calls(BackendOperation::SubmitAttempt), 1);
}

#[tokio::test(start_paused = true)]
async fn answers_are_refused_once_time_is_up() {
    let (_backend, _store, resolver) = reopen_after(61).await;
    let session = resolver.open(QUIZ).await.unwrap();

    let err = session
        .record_answer(QuestionId::new(5), ChoiceId::new(50))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::DeadlinePassed));
    assert_eq!(session.answers(), three_of_five());

    let outcome = session.submit(SubmitTrigger::Timeout).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Graded(_)));
}

#[tokio::test(start_paused = true)]
async fn expired_attempt_with_nothing_answered_can_still_finish() {
    let (backend, store, resolver) = reopen_after(65).await;
    store.clear(QUIZ).await.unwrap();
    let session = resolver.open(QUIZ).await.unwrap();
    let timer = session.deadline_controller().unwrap();

    // The service refuses an empty answer list.
    let err = timer.drive(&session).await.unwrap_err();
    assert!(matches!(err, SessionError::Submit(RemoteError::Rejected(_))));
    assert_eq!(session.phase(), SessionPhase::AnsweringTimed);
    assert!(session.deadline_controller().unwrap().poll().is_none());

    session
        .record_answer(QuestionId::new(3), ChoiceId::new(30))
        .await
        .unwrap();
    let err = session
        .record_answer(QuestionId::new(4), ChoiceId::new(40))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::DeadlinePassed));

    let outcome = session.submit(SubmitTrigger::User).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Graded(ref r) if r.score == 1.0));
    assert_eq!(session.phase(), SessionPhase::Completed);
    assert_eq!(backend.calls(BackendOperation::SubmitAttempt), 2);
}
