//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{ChoiceId, CourseId, QuestionId};
use storage::StorageError;
use storage::sqlite::SqliteInitError;

use crate::attempts::SessionPhase;

/// Errors emitted by `QuizBackend` implementations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RemoteError {
    #[error("grading service request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("grading service returned an unexpected payload: {0}")]
    Decode(String),
    #[error("grading service refused the request: {0}")]
    Rejected(String),
    #[error("grading service unavailable: {0}")]
    Unavailable(String),
    #[error("access denied")]
    Forbidden,
    #[error("not found")]
    NotFound,
}

/// Errors raised while reading backend configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("QUIZ_API_TOKEN is not set")]
    MissingToken,
    #[error("invalid base url {raw}: {source}")]
    InvalidBaseUrl {
        raw: String,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid QUIZ_HTTP_TIMEOUT_SECS value: {0}")]
    InvalidTimeout(String),
}

/// Errors emitted by `AttemptResolver` when a quiz is opened.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResolveError {
    #[error("quiz could not be loaded: {0}")]
    DefinitionFetch(#[source] RemoteError),
    #[error("learner is not enrolled in course {0}")]
    EnrollmentDenied(CourseId),
    #[error("enrollment could not be verified: {0}")]
    Enrollment(#[source] RemoteError),
    #[error("existing attempts could not be loaded: {0}")]
    AttemptLookup(#[source] RemoteError),
    #[error("attempt could not be started: {0}")]
    StartAttempt(#[source] RemoteError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ResolveError {
    /// Whether the learner can be offered a retry action.
    ///
    /// Definition and enrollment failures block entry until the learner navigates again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StartAttempt(_) | Self::Storage(_))
    }
}

/// Errors emitted by `AttemptSession`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("session is not accepting this action while {0:?}")]
    NotAnswering(SessionPhase),
    #[error("question {0} is not part of this quiz")]
    UnknownQuestion(QuestionId),
    #[error("choice {choice} does not belong to question {question}")]
    UnknownChoice {
        question: QuestionId,
        choice: ChoiceId,
    },
    #[error("time limit has expired")]
    DeadlinePassed,
    #[error("submission failed: {0}")]
    Submit(#[source] RemoteError),
    #[error("new attempt could not be started: {0}")]
    StartAttempt(#[source] RemoteError),
    #[error("retake is only available once the attempt is completed")]
    NotCompleted,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SessionError {
    /// Whether the same action may succeed if the learner tries again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Submit(_) | Self::StartAttempt(_) | Self::Storage(_)
        )
    }
}

/// Errors emitted while bootstrapping quiz services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}
