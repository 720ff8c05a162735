use std::sync::Arc;

use quiz_core::model::{Choice, ChoiceId, CourseId, Question, QuestionId, QuizDefinition, QuizDraft, QuizId};
use quiz_core::time::fixed_now;
use services::{
    BackendOperation, Clock, InMemoryQuizBackend, QuizBackend, QuizServices, ResolveError,
    SessionPhase, SubmitOutcome, SubmitTrigger,
};
use storage::{AnswerStore, InMemoryAnswerStore, LocalStorage};

const QUIZ: QuizId = QuizId::new(7);
const COURSE: CourseId = CourseId::new(3);

fn question(id: u64, points: u32) -> Question {
    Question::new(
        QuestionId::new(id),
        format!("Question {id}"),
        vec![
            Choice::new(ChoiceId::new(id * 100), "correct"),
            Choice::new(ChoiceId::new(id * 100 + 1), "wrong"),
        ],
        points,
        u32::try_from(id).unwrap(),
    )
}

/// Four questions worth 10 points in total.
fn quiz() -> QuizDefinition {
    QuizDefinition::new(QuizDraft {
        id: QUIZ,
        course_id: COURSE,
        title: "Traits and generics".into(),
        description: "Checkpoint".into(),
        questions: vec![question(1, 1), question(2, 2), question(3, 3), question(4, 4)],
        time_limit_secs: None,
        pass_threshold: Some(70.0),
    })
    .unwrap()
}

fn correct(id: u64) -> ChoiceId {
    ChoiceId::new(id * 100)
}

fn wrong(id: u64) -> ChoiceId {
    ChoiceId::new(id * 100 + 1)
}

struct World {
    backend: InMemoryQuizBackend,
    store: InMemoryAnswerStore,
    services: QuizServices,
}

fn world() -> World {
    let clock = Clock::fixed(fixed_now());
    let backend = InMemoryQuizBackend::new(clock);
    backend.add_quiz(quiz(), (1..=4).map(correct));
    backend.enroll(COURSE);
    let store = InMemoryAnswerStore::new();
    let storage = LocalStorage {
        answers: Arc::new(store.clone()),
    };
    let services = QuizServices::new(clock, Arc::new(backend.clone()), storage);
    World {
        backend,
        store,
        services,
    }
}

#[tokio::test]
async fn persisted_answers_track_every_edit() {
    let w = world();
    let session = w.services.resolver().open(QUIZ).await.unwrap();

    let edits = [(1, wrong(1)), (2, correct(2)), (1, correct(1)), (3, wrong(3)), (2, wrong(2))];
    for (question, choice) in edits {
        session
            .record_answer(QuestionId::new(question), choice)
            .await
            .unwrap();
        assert_eq!(w.store.load(QUIZ).await.unwrap(), session.answers());
    }

    let answers = session.answers();
    assert_eq!(answers.len(), 3);
    assert_eq!(answers.get(QuestionId::new(1)), Some(correct(1)));
    assert_eq!(answers.get(QuestionId::new(2)), Some(wrong(2)));
    assert_eq!(w.backend.calls(BackendOperation::SubmitAttempt), 0);
}

#[tokio::test]
async fn starting_twice_returns_the_same_attempt() {
    let w = world();
    let first = w.backend.start_attempt(QUIZ).await.unwrap();
    let second = w.backend.start_attempt(QUIZ).await.unwrap();
    assert_eq!(first.id(), second.id());
    assert_eq!(w.backend.attempts(QUIZ).len(), 1);
}

#[tokio::test]
async fn reopening_restores_the_exact_answer_set() {
    let w = world();
    let session = w.services.resolver().open(QUIZ).await.unwrap();
    session.record_answer(QuestionId::new(2), correct(2)).await.unwrap();
    session.record_answer(QuestionId::new(4), wrong(4)).await.unwrap();
    let before = session.answers();
    let attempt_id = session.attempt().id();
    drop(session);

    let reloaded = w.services.resolver().open(QUIZ).await.unwrap();
    assert_eq!(reloaded.attempt().id(), attempt_id);
    assert_eq!(reloaded.answers(), before);
    assert_eq!(w.backend.calls(BackendOperation::StartAttempt), 1);
}

#[tokio::test]
async fn concurrent_submits_reach_the_service_once() {
    let w = world();
    let session = w.services.resolver().open(QUIZ).await.unwrap();
    session.record_answer(QuestionId::new(1), correct(1)).await.unwrap();

    let timer_side = session.clone();
    let (manual, forced) = tokio::join!(
        session.submit(SubmitTrigger::User),
        timer_side.submit(SubmitTrigger::Timeout)
    );

    let outcomes = [manual.unwrap(), forced.unwrap()];
    let graded = outcomes
        .iter()
        .filter(|o| matches!(o, SubmitOutcome::Graded(_)))
        .count();
    assert_eq!(graded, 1);
    assert!(outcomes.contains(&SubmitOutcome::Suppressed));
    assert_eq!(w.backend.calls(BackendOperation::SubmitAttempt), 1);
    assert_eq!(session.phase(), SessionPhase::Completed);
}

#[tokio::test]
async fn all_correct_reports_full_marks() {
    let w = world();
    let session = w.services.resolver().open(QUIZ).await.unwrap();
    for id in 1..=4 {
        session.record_answer(QuestionId::new(id), correct(id)).await.unwrap();
    }
    session.submit(SubmitTrigger::User).await.unwrap();

    let presenter = session.presenter().unwrap();
    assert_eq!(presenter.report.percentage_display(), "100.0%");
    assert_eq!(presenter.report.points_display, "10/10");
    assert_eq!(presenter.report.correct, Some(4));
    assert_eq!(presenter.report.incorrect, Some(0));
    assert_eq!(presenter.report.passed, Some(true));
}

#[tokio::test]
async fn retake_clears_saved_answers_and_starts_fresh() {
    let w = world();
    let session = w.services.resolver().open(QUIZ).await.unwrap();
    session.record_answer(QuestionId::new(1), wrong(1)).await.unwrap();
    session.submit(SubmitTrigger::User).await.unwrap();
    let first_attempt = session.attempt().id();

    // A stale record written by another tab must not survive the retake.
    w.store
        .save(QUIZ, &[(QuestionId::new(3), wrong(3))].into_iter().collect())
        .await
        .unwrap();

    session.presenter().unwrap().retake.invoke().await.unwrap();
    assert_eq!(session.phase(), SessionPhase::AnsweringUntimed);
    assert_ne!(session.attempt().id(), first_attempt);
    assert!(session.answers().is_empty());
    assert!(w.store.load(QUIZ).await.unwrap().is_empty());

    // The completed attempt is what a plain reopen shows once the retake is graded too.
    session.record_answer(QuestionId::new(1), correct(1)).await.unwrap();
    session.submit(SubmitTrigger::User).await.unwrap();
    let reopened = w.services.resolver().open(QUIZ).await.unwrap();
    assert_eq!(reopened.phase(), SessionPhase::Completed);
    assert_eq!(reopened.attempt().id(), session.attempt().id());
}

#[tokio::test]
async fn submit_failure_keeps_answers_for_a_retry() {
    let w = world();
    let session = w.services.resolver().open(QUIZ).await.unwrap();
    session.record_answer(QuestionId::new(1), correct(1)).await.unwrap();
    session.record_answer(QuestionId::new(2), wrong(2)).await.unwrap();
    w.backend.fail_next(BackendOperation::SubmitAttempt, 1);

    let err = session.submit(SubmitTrigger::User).await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(session.phase(), SessionPhase::AnsweringUntimed);
    assert_eq!(session.answers().len(), 2);
    assert!(session.last_error().is_some());
    assert_eq!(w.store.load(QUIZ).await.unwrap().len(), 2);

    let SubmitOutcome::Graded(result) = session.submit(SubmitTrigger::User).await.unwrap() else {
        panic!("retry should grade");
    };
    assert_eq!(result.score, 1.0);
    assert_eq!(w.backend.submissions().len(), 1);
}

#[tokio::test]
async fn enrollment_is_checked_before_any_attempt_work() {
    let clock = Clock::fixed(fixed_now());
    let backend = InMemoryQuizBackend::new(clock);
    backend.add_quiz(quiz(), (1..=4).map(correct));
    let services = QuizServices::new(clock, Arc::new(backend.clone()), LocalStorage::in_memory());

    let err = services.resolver().open(QUIZ).await.unwrap_err();
    assert!(matches!(err, ResolveError::EnrollmentDenied(course) if course == COURSE));
    assert!(!err.is_retryable());
    assert_eq!(backend.calls(BackendOperation::ListAttempts), 0);
    assert_eq!(backend.calls(BackendOperation::StartAttempt), 0);
    assert!(backend.attempts(QUIZ).is_empty());
}

#[tokio::test]
async fn sqlite_store_survives_a_reopen() {
    let clock = Clock::fixed(fixed_now());
    let backend = InMemoryQuizBackend::new(clock);
    backend.add_quiz(quiz(), (1..=4).map(correct));
    backend.enroll(COURSE);
    let url = "sqlite:file:attempt_flow_reopen?mode=memory&cache=shared";

    let storage = LocalStorage::sqlite(url).await.unwrap();
    let services = QuizServices::new(clock, Arc::new(backend.clone()), storage);
    let session = services.resolver().open(QUIZ).await.unwrap();
    session.record_answer(QuestionId::new(3), correct(3)).await.unwrap();

    let reopened_storage = LocalStorage::sqlite(url).await.unwrap();
    let reopened = QuizServices::new(clock, Arc::new(backend), reopened_storage);
    let restored = reopened.resolver().open(QUIZ).await.unwrap();
    assert_eq!(restored.answers(), session.answers());
    // Keep the first pool alive so the shared in-memory database is not dropped.
    drop(services);
}
