use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use quiz_core::Clock;
use quiz_core::model::{
    Attempt, AttemptId, ChoiceId, CourseId, GradingResult, QuizDefinition, QuizId,
};

use super::{QuizBackend, Submission};
use crate::error::RemoteError;

/// Operations of the grading service, used to count calls and inject failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOperation {
    FetchQuiz,
    ListAttempts,
    StartAttempt,
    SubmitAttempt,
    CheckEnrollment,
}

struct HostedQuiz {
    definition: QuizDefinition,
    correct: HashSet<ChoiceId>,
}

#[derive(Default)]
struct BackendState {
    quizzes: HashMap<QuizId, HostedQuiz>,
    attempts: Vec<Attempt>,
    submissions: Vec<Submission>,
    enrolled: HashSet<CourseId>,
    next_attempt_id: u64,
    calls: HashMap<BackendOperation, u32>,
    failures: HashMap<BackendOperation, u32>,
}

/// In-process stand-in for the grading service, for tests and prototyping.
///
/// Holds correctness data and grades submissions the way the service does,
/// including its refusal of an empty answer list.
/// Starting an attempt returns the open one when it exists.
#[derive(Clone)]
pub struct InMemoryQuizBackend {
    clock: Clock,
    state: Arc<Mutex<BackendState>>,
}

impl InMemoryQuizBackend {
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            state: Arc::new(Mutex::new(BackendState {
                next_attempt_id: 1,
                ..BackendState::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Host a quiz along with the ids of its correct choices.
    pub fn add_quiz(&self, definition: QuizDefinition, correct: impl IntoIterator<Item = ChoiceId>) {
        let hosted = HostedQuiz {
            correct: correct.into_iter().collect(),
            definition,
        };
        self.lock().quizzes.insert(hosted.definition.id(), hosted);
    }

    pub fn enroll(&self, course_id: CourseId) {
        self.lock().enrolled.insert(course_id);
    }

    /// Record an attempt as if it had been created in an earlier visit.
    pub fn seed_attempt(&self, attempt: Attempt) {
        let mut state = self.lock();
        state.next_attempt_id = state.next_attempt_id.max(attempt.id().value() + 1);
        state.attempts.push(attempt);
    }

    /// Make the next `times` calls of `op` fail with `RemoteError::Unavailable`.
    pub fn fail_next(&self, op: BackendOperation, times: u32) {
        self.lock().failures.insert(op, times);
    }

    /// Number of calls received for `op`.
    #[must_use]
    pub fn calls(&self, op: BackendOperation) -> u32 {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// The learner's attempts at a quiz, oldest first.
    #[must_use]
    pub fn attempts(&self, quiz_id: QuizId) -> Vec<Attempt> {
        self.lock()
            .attempts
            .iter()
            .filter(|a| a.quiz_id() == quiz_id)
            .cloned()
            .collect()
    }

    /// Every submission received, in arrival order.
    #[must_use]
    pub fn submissions(&self) -> Vec<Submission> {
        self.lock().submissions.clone()
    }

    fn begin(&self, op: BackendOperation) -> Result<MutexGuard<'_, BackendState>, RemoteError> {
        let mut state = self.lock();
        *state.calls.entry(op).or_insert(0) += 1;
        if let Some(remaining) = state.failures.get_mut(&op).filter(|r| **r > 0) {
            *remaining -= 1;
            return Err(RemoteError::Unavailable(format!("{op:?} failed")));
        }
        Ok(state)
    }
}

fn grade(hosted: &HostedQuiz, submission: &Submission) -> GradingResult {
    let quiz = &hosted.definition;
    let mut score = 0_u32;
    let mut correct = 0_u32;
    for entry in &submission.answers {
        let Some(question) = quiz.question(entry.question) else {
            continue;
        };
        if question.has_choice(entry.choice) && hosted.correct.contains(&entry.choice) {
            score += question.points();
            correct += 1;
        }
    }

    let question_count = u32::try_from(quiz.question_count()).unwrap_or(u32::MAX);
    let total_points = quiz.total_points();
    let percentage = if total_points > 0 {
        (f64::from(score) / f64::from(total_points) * 10_000.0).round() / 100.0
    } else {
        0.0
    };

    GradingResult {
        score: f64::from(score),
        total_points: f64::from(total_points),
        percentage: Some(percentage),
        correct: Some(correct),
        incorrect: Some(question_count.saturating_sub(correct)),
        total_questions: Some(question_count),
        points_display: None,
    }
}

#[async_trait]
impl QuizBackend for InMemoryQuizBackend {
    async fn fetch_quiz_definition(&self, quiz_id: QuizId) -> Result<QuizDefinition, RemoteError> {
        let state = self.begin(BackendOperation::FetchQuiz)?;
        state
            .quizzes
            .get(&quiz_id)
            .map(|hosted| hosted.definition.clone())
            .ok_or(RemoteError::NotFound)
    }

    async fn list_attempts(&self, quiz_id: QuizId) -> Result<Vec<Attempt>, RemoteError> {
        let state = self.begin(BackendOperation::ListAttempts)?;
        let mut attempts: Vec<Attempt> = state
            .attempts
            .iter()
            .filter(|a| a.quiz_id() == quiz_id)
            .cloned()
            .collect();
        attempts.sort_by_key(|a| std::cmp::Reverse(a.started_at()));
        Ok(attempts)
    }

    async fn start_attempt(&self, quiz_id: QuizId) -> Result<Attempt, RemoteError> {
        let mut state = self.begin(BackendOperation::StartAttempt)?;
        let course_id = state
            .quizzes
            .get(&quiz_id)
            .map(|hosted| hosted.definition.course_id())
            .ok_or(RemoteError::NotFound)?;
        if !state.enrolled.contains(&course_id) {
            return Err(RemoteError::Forbidden);
        }
        if let Some(open) = state
            .attempts
            .iter()
            .find(|a| a.quiz_id() == quiz_id && a.is_in_progress())
        {
            return Ok(open.clone());
        }

        let id = AttemptId::new(state.next_attempt_id);
        state.next_attempt_id += 1;
        let attempt = Attempt::start(id, quiz_id, self.clock.now());
        state.attempts.push(attempt.clone());
        Ok(attempt)
    }

    async fn submit_attempt(&self, submission: &Submission) -> Result<GradingResult, RemoteError> {
        // Grading completes on a later turn of the event loop, like a network round trip.
        tokio::task::yield_now().await;

        let mut state = self.begin(BackendOperation::SubmitAttempt)?;
        state.submissions.push(submission.clone());
        if submission.answers.is_empty() {
            return Err(RemoteError::Rejected("Answers cannot be empty.".into()));
        }
        let result = {
            let hosted = state
                .quizzes
                .get(&submission.quiz_id)
                .ok_or(RemoteError::NotFound)?;
            grade(hosted, submission)
        };

        let now = self.clock.now();
        let attempt = state
            .attempts
            .iter_mut()
            .find(|a| a.id() == submission.attempt_id)
            .ok_or(RemoteError::NotFound)?;
        attempt
            .complete(result.score, now)
            .map_err(|e| RemoteError::Rejected(e.to_string()))?;
        Ok(result)
    }

    async fn check_enrollment(&self, course_id: CourseId) -> Result<bool, RemoteError> {
        let state = self.begin(BackendOperation::CheckEnrollment)?;
        Ok(state.enrolled.contains(&course_id))
    }
}
