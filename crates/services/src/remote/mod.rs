//! Client-side contract for the remote grading service.

use async_trait::async_trait;
use quiz_core::model::{
    AnswerEntry, Attempt, AttemptId, CourseId, GradingResult, QuizDefinition, QuizId,
};

use crate::attempts::SubmitTrigger;
use crate::error::RemoteError;

mod http;
mod memory;
mod normalize;

pub use http::HttpQuizBackend;
pub use memory::{BackendOperation, InMemoryQuizBackend};
pub use normalize::normalize_list;

/// Answers sent for grading. Unanswered questions have no entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub quiz_id: QuizId,
    pub attempt_id: AttemptId,
    pub answers: Vec<AnswerEntry>,
    pub trigger: SubmitTrigger,
}

/// Operations the attempt core needs from the grading service.
#[async_trait]
pub trait QuizBackend: Send + Sync {
    /// Fetch the learner-facing quiz, without correctness data.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if the quiz cannot be fetched or decoded.
    async fn fetch_quiz_definition(&self, quiz_id: QuizId) -> Result<QuizDefinition, RemoteError>;

    /// List the learner's attempts at a quiz, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if the attempts cannot be fetched or decoded.
    async fn list_attempts(&self, quiz_id: QuizId) -> Result<Vec<Attempt>, RemoteError>;

    /// Start an attempt. Returns the existing in-progress attempt if there is one.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if the service refuses or cannot be reached.
    async fn start_attempt(&self, quiz_id: QuizId) -> Result<Attempt, RemoteError>;

    /// Submit answers for grading.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if grading fails.
    async fn submit_attempt(&self, submission: &Submission) -> Result<GradingResult, RemoteError>;

    /// Whether the learner is enrolled in the course.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if enrollment cannot be checked.
    async fn check_enrollment(&self, course_id: CourseId) -> Result<bool, RemoteError>;
}
