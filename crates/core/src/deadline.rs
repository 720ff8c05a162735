//! Deadline arithmetic for timed attempts.
//!
//! The deadline is always derived from the attempt's persisted start time, so
//! reloading a page cannot restart the countdown.

use chrono::{DateTime, Duration, Utc};

use crate::model::{Attempt, QuizDefinition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    started_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
}

impl Deadline {
    #[must_use]
    pub fn new(started_at: DateTime<Utc>, limit_secs: u32) -> Self {
        Self {
            started_at,
            ends_at: started_at + Duration::seconds(i64::from(limit_secs)),
        }
    }

    /// Deadline for `attempt`, or `None` for untimed quizzes.
    #[must_use]
    pub fn for_attempt(quiz: &QuizDefinition, attempt: &Attempt) -> Option<Self> {
        quiz.time_limit_secs()
            .map(|limit| Self::new(attempt.started_at(), limit))
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.ends_at
    }

    /// Time left at `now`, never negative.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.ends_at - now).max(Duration::zero())
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.ends_at
    }
}

/// Formats a remaining duration as `mm:ss`, rounding partial seconds up.
#[must_use]
pub fn format_countdown(remaining: Duration) -> String {
    let millis = remaining.num_milliseconds().max(0);
    let secs = (millis + 999) / 1000;
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
