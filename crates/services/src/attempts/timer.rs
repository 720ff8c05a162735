use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Duration;
use quiz_core::deadline::format_countdown;
use quiz_core::model::AttemptId;
use quiz_core::{Clock, Deadline};

use super::session::{AttemptSession, SubmitOutcome, SubmitTrigger};
use crate::error::SessionError;

/// The one-time event raised when a timed attempt runs out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForcedSubmit {
    pub attempt_id: AttemptId,
    pub deadline: Deadline,
}

/// Countdown for one timed attempt.
///
/// Remaining time is recomputed from the attempt's start on every call, so a
/// controller built after a reload picks up where the old one left off.
/// Clones share the fired flag; the forced submit is raised once per attempt.
#[derive(Debug, Clone)]
pub struct DeadlineController {
    deadline: Deadline,
    attempt_id: AttemptId,
    clock: Clock,
    fired: Arc<AtomicBool>,
}

impl DeadlineController {
    #[must_use]
    pub fn new(deadline: Deadline, attempt_id: AttemptId, clock: Clock) -> Self {
        Self {
            deadline,
            attempt_id,
            clock,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn deadline(&self) -> Deadline {
        self.deadline
    }

    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.remaining(self.clock.now())
    }

    /// Remaining time as `mm:ss`.
    #[must_use]
    pub fn remaining_display(&self) -> String {
        format_countdown(self.remaining())
    }

    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    fn fire(&self) -> Option<ForcedSubmit> {
        if self.fired.swap(true, Ordering::AcqRel) {
            return None;
        }
        tracing::info!(attempt_id = %self.attempt_id, "time limit reached, forcing submit");
        Some(ForcedSubmit {
            attempt_id: self.attempt_id,
            deadline: self.deadline,
        })
    }

    /// Non-blocking check. Fires the first time it is called at or after the deadline.
    pub fn poll(&self) -> Option<ForcedSubmit> {
        if self.deadline.is_expired(self.clock.now()) {
            self.fire()
        } else {
            None
        }
    }

    /// Sleep until the deadline, then fire. Returns `None` if already fired.
    pub async fn wait(&self) -> Option<ForcedSubmit> {
        if self.has_fired() {
            return None;
        }
        // Negative durations (already expired) fail `to_std` and skip the sleep.
        if let Ok(remaining) = self.remaining().to_std() {
            if !remaining.is_zero() {
                tokio::time::sleep(remaining).await;
            }
        }
        self.fire()
    }

    /// Wait for the deadline and submit `session` on the learner's behalf.
    ///
    /// Yields `SubmitOutcome::Suppressed` when the event already fired, when
    /// the learner submitted first, or when the session has moved on to
    /// another attempt.
    ///
    /// # Errors
    ///
    /// Returns the session's submit error; the session keeps its answers.
    pub async fn drive(&self, session: &AttemptSession) -> Result<SubmitOutcome, SessionError> {
        let Some(event) = self.wait().await else {
            return Ok(SubmitOutcome::Suppressed);
        };
        if session.attempt().id() != event.attempt_id {
            tracing::debug!(attempt_id = %event.attempt_id, "deadline belongs to a finished attempt");
            return Ok(SubmitOutcome::Suppressed);
        }
        session.submit(SubmitTrigger::Timeout).await
    }
}
