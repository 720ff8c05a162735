use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{AttemptId, QuizId};

//
// ─── ERRORS ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("attempt {0} is already completed")]
    AlreadyCompleted(AttemptId),

    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("unknown attempt status: {0}")]
    UnknownStatus(String),
}

//
// ─── STATUS ──────────────────────────────────────────────────────────────────
//

/// Lifecycle of an attempt. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    InProgress,
    Completed,
}

impl AttemptStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Completed => "completed",
        }
    }

    /// Parses the service's status string.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::UnknownStatus` for anything other than
    /// `in_progress` or `completed`.
    pub fn parse(raw: &str) -> Result<Self, AttemptError> {
        match raw {
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(AttemptError::UnknownStatus(other.to_owned())),
        }
    }
}

//
// ─── ATTEMPT ─────────────────────────────────────────────────────────────────
//

/// One learner's instance of taking a quiz.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    id: AttemptId,
    quiz_id: QuizId,
    status: AttemptStatus,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    score: Option<f64>,
}

impl Attempt {
    /// A fresh in-progress attempt.
    #[must_use]
    pub fn start(id: AttemptId, quiz_id: QuizId, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            quiz_id,
            status: AttemptStatus::InProgress,
            started_at,
            completed_at: None,
            score: None,
        }
    }

    /// Rehydrate an attempt reported by the grading service.
    ///
    /// The score is kept only for completed attempts.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::InvalidTimeRange` if `completed_at` precedes `started_at`.
    pub fn from_persisted(
        id: AttemptId,
        quiz_id: QuizId,
        status: AttemptStatus,
        started_at: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
        score: Option<f64>,
    ) -> Result<Self, AttemptError> {
        if completed_at.is_some_and(|done| done < started_at) {
            return Err(AttemptError::InvalidTimeRange);
        }
        let score = match status {
            AttemptStatus::Completed => score,
            AttemptStatus::InProgress => None,
        };
        Ok(Self {
            id,
            quiz_id,
            status,
            started_at,
            completed_at,
            score,
        })
    }

    /// Mark the attempt as graded.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::AlreadyCompleted` on a second call and
    /// `AttemptError::InvalidTimeRange` if `at` precedes the start.
    pub fn complete(&mut self, score: f64, at: DateTime<Utc>) -> Result<(), AttemptError> {
        if self.status == AttemptStatus::Completed {
            return Err(AttemptError::AlreadyCompleted(self.id));
        }
        if at < self.started_at {
            return Err(AttemptError::InvalidTimeRange);
        }
        self.status = AttemptStatus::Completed;
        self.completed_at = Some(at);
        self.score = Some(score);
        Ok(())
    }

    #[must_use]
    pub fn id(&self) -> AttemptId {
        self.id
    }

    #[must_use]
    pub fn quiz_id(&self) -> QuizId {
        self.quiz_id
    }

    #[must_use]
    pub fn status(&self) -> AttemptStatus {
        self.status
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == AttemptStatus::Completed
    }

    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        self.status == AttemptStatus::InProgress
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn score(&self) -> Option<f64> {
        self.score
    }
}

// ─── TESTS ───────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    #[test]
    fn completes_exactly_once() {
        let now = fixed_now();
        let mut attempt = Attempt::start(AttemptId::new(1), QuizId::new(2), now);
        assert!(attempt.is_in_progress());

        attempt.complete(7.0, now + Duration::minutes(3)).unwrap();
        assert!(attempt.is_completed());
        assert_eq!(attempt.score(), Some(7.0));

        let err = attempt.complete(9.0, now + Duration::minutes(4)).unwrap_err();
        assert_eq!(err, AttemptError::AlreadyCompleted(AttemptId::new(1)));
        assert_eq!(attempt.score(), Some(7.0));
    }

    #[test]
    fn in_progress_attempts_drop_scores() {
        let attempt = Attempt::from_persisted(
            AttemptId::new(1),
            QuizId::new(1),
            AttemptStatus::InProgress,
            fixed_now(),
            None,
            Some(0.0),
        )
        .unwrap();
        assert_eq!(attempt.score(), None);
    }

    #[test]
    fn rejects_inverted_time_range() {
        let now = fixed_now();
        let err = Attempt::from_persisted(
            AttemptId::new(1),
            QuizId::new(1),
            AttemptStatus::Completed,
            now,
            Some(now - Duration::seconds(1)),
            Some(1.0),
        )
        .unwrap_err();
        assert_eq!(err, AttemptError::InvalidTimeRange);
    }

    #[test]
    fn status_parsing() {
        assert_eq!(AttemptStatus::parse("completed").unwrap(), AttemptStatus::Completed);
        assert_eq!(AttemptStatus::InProgress.as_str(), "in_progress");
        assert!(AttemptStatus::parse("abandoned").is_err());
    }
}
