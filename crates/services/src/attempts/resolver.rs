use std::sync::Arc;

use quiz_core::Clock;
use quiz_core::model::{AnswerSet, Attempt, GradingResult, QuizDefinition, QuizId};
use storage::AnswerStore;

use super::session::AttemptSession;
use crate::error::ResolveError;
use crate::remote::QuizBackend;

/// Decides what a learner sees when they open a quiz: the previous result,
/// the attempt they left open, or a freshly started attempt.
#[derive(Clone)]
pub struct AttemptResolver {
    clock: Clock,
    backend: Arc<dyn QuizBackend>,
    answers: Arc<dyn AnswerStore>,
}

impl AttemptResolver {
    #[must_use]
    pub fn new(clock: Clock, backend: Arc<dyn QuizBackend>, answers: Arc<dyn AnswerStore>) -> Self {
        Self {
            clock,
            backend,
            answers,
        }
    }

    /// Open a quiz, showing an earlier result when one exists.
    ///
    /// # Errors
    ///
    /// See [`AttemptResolver::resolve`].
    pub async fn open(&self, quiz_id: QuizId) -> Result<AttemptSession, ResolveError> {
        self.resolve(quiz_id, false).await
    }

    /// Open a quiz for another go, skipping any earlier result.
    ///
    /// # Errors
    ///
    /// See [`AttemptResolver::resolve`].
    pub async fn open_retake(&self, quiz_id: QuizId) -> Result<AttemptSession, ResolveError> {
        self.resolve(quiz_id, true).await
    }

    /// Resolve the session for `quiz_id`.
    ///
    /// Enrollment is checked before any attempt is listed or created.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::DefinitionFetch`, `EnrollmentDenied`, `Enrollment`
    /// or `AttemptLookup` when the quiz cannot be entered at all, and
    /// `ResolveError::StartAttempt` or `Storage` when a new attempt could not be
    /// set up (both may be retried).
    pub async fn resolve(
        &self,
        quiz_id: QuizId,
        retake: bool,
    ) -> Result<AttemptSession, ResolveError> {
        let definition = self
            .backend
            .fetch_quiz_definition(quiz_id)
            .await
            .map_err(ResolveError::DefinitionFetch)?;
        let definition = Arc::new(definition);

        let course_id = definition.course_id();
        let enrolled = self
            .backend
            .check_enrollment(course_id)
            .await
            .map_err(ResolveError::Enrollment)?;
        if !enrolled {
            tracing::info!(%quiz_id, %course_id, "learner not enrolled, quiz blocked");
            return Err(ResolveError::EnrollmentDenied(course_id));
        }

        let attempts = self
            .backend
            .list_attempts(quiz_id)
            .await
            .map_err(ResolveError::AttemptLookup)?;

        if !retake {
            if let Some(done) = latest_completed(&attempts) {
                tracing::info!(%quiz_id, attempt_id = %done.id(), "showing completed attempt");
                let result = GradingResult::from_completed_attempt(done, definition.total_points());
                return Ok(AttemptSession::completed(
                    definition,
                    Arc::clone(&self.backend),
                    Arc::clone(&self.answers),
                    self.clock,
                    done.clone(),
                    result,
                ));
            }
        }

        if let Some(open) = attempts.iter().find(|a| a.is_in_progress()) {
            let answers = self.restore_answers(&definition).await;
            tracing::info!(
                %quiz_id,
                attempt_id = %open.id(),
                restored = answers.len(),
                "resuming attempt"
            );
            return Ok(self.answering(definition, open.clone(), answers));
        }

        // Nothing open: answers left over from an earlier attempt must not leak in.
        self.answers.clear(quiz_id).await?;
        let attempt = self
            .backend
            .start_attempt(quiz_id)
            .await
            .map_err(ResolveError::StartAttempt)?;
        tracing::info!(%quiz_id, attempt_id = %attempt.id(), retake, "started attempt");
        Ok(self.answering(definition, attempt, AnswerSet::new()))
    }

    fn answering(
        &self,
        definition: Arc<QuizDefinition>,
        attempt: Attempt,
        answers: AnswerSet,
    ) -> AttemptSession {
        AttemptSession::answering(
            definition,
            Arc::clone(&self.backend),
            Arc::clone(&self.answers),
            self.clock,
            attempt,
            answers,
        )
    }

    /// Saved answers for a resumed attempt, minus any that no longer fit the quiz.
    async fn restore_answers(&self, definition: &QuizDefinition) -> AnswerSet {
        let mut answers = match self.answers.load(definition.id()).await {
            Ok(answers) => answers,
            Err(err) => {
                tracing::warn!(%err, quiz_id = %definition.id(), "saved answers unreadable, starting empty");
                return AnswerSet::new();
            }
        };
        let before = answers.len();
        answers.retain(|question, choice| definition.contains_choice(question, choice));
        if answers.len() != before {
            tracing::debug!(dropped = before - answers.len(), "dropped stale saved answers");
        }
        answers
    }
}

/// Most recently completed attempt, regardless of list order.
fn latest_completed(attempts: &[Attempt]) -> Option<&Attempt> {
    attempts
        .iter()
        .filter(|a| a.is_completed())
        .max_by_key(|a| (a.completed_at(), a.started_at(), a.id()))
}
