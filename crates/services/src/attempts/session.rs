use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use quiz_core::model::{
    AnswerSet, Attempt, ChoiceId, GradingResult, QuestionId, QuizDefinition, QuizId,
};
use quiz_core::{Clock, Deadline};
use storage::{AnswerStore, StorageError};
use tokio::sync::Mutex as WriteLock;

use super::progress::AttemptProgress;
use super::report::{ResultPresenter, ResultReport, RetakeAction};
use super::timer::DeadlineController;
use crate::error::SessionError;
use crate::remote::{QuizBackend, Submission};

/// Where a session is in the attempt lifecycle.
///
/// `Loading -> Answering* -> Submitting -> Completed`, with `Completed -> Loading`
/// only through a retake and `Error` when a new attempt cannot be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Loading,
    AnsweringUntimed,
    AnsweringTimed,
    Submitting,
    Completed,
    Error,
}

impl SessionPhase {
    #[must_use]
    pub fn is_answering(self) -> bool {
        matches!(self, Self::AnsweringUntimed | Self::AnsweringTimed)
    }
}

/// What asked for the submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTrigger {
    User,
    Timeout,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// This call performed the submission.
    Graded(GradingResult),
    /// Another submission is in flight or already finished; nothing was sent.
    Suppressed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Submit,
    StartAttempt,
    Storage,
}

/// Last error shown inline next to the last known good state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFailure {
    pub kind: FailureKind,
    pub message: String,
}

struct SessionState {
    phase: SessionPhase,
    attempt: Attempt,
    answers: AnswerSet,
    result: Option<GradingResult>,
    last_error: Option<SessionFailure>,
    /// One countdown per attempt; replaced when a retake opens a new one.
    timer: Option<DeadlineController>,
}

/// State machine for one learner's attempt at a quiz.
///
/// Clones share the same state, so a timer and a submit button can hold the
/// session at once. The answer set is only changed through this type, and
/// every edit writes the full set to the local store.
#[derive(Clone)]
pub struct AttemptSession {
    definition: Arc<QuizDefinition>,
    backend: Arc<dyn QuizBackend>,
    store: Arc<dyn AnswerStore>,
    clock: Clock,
    state: Arc<Mutex<SessionState>>,
    writes: Arc<WriteLock<()>>,
}

impl AttemptSession {
    fn with_state(
        definition: Arc<QuizDefinition>,
        backend: Arc<dyn QuizBackend>,
        store: Arc<dyn AnswerStore>,
        clock: Clock,
        state: SessionState,
    ) -> Self {
        Self {
            definition,
            backend,
            store,
            clock,
            state: Arc::new(Mutex::new(state)),
            writes: Arc::new(WriteLock::new(())),
        }
    }

    /// A session accepting answers for an in-progress attempt.
    #[must_use]
    pub fn answering(
        definition: Arc<QuizDefinition>,
        backend: Arc<dyn QuizBackend>,
        store: Arc<dyn AnswerStore>,
        clock: Clock,
        attempt: Attempt,
        answers: AnswerSet,
    ) -> Self {
        let phase = answering_phase(&definition);
        let timer = countdown_for(&definition, &attempt, clock);
        Self::with_state(
            definition,
            backend,
            store,
            clock,
            SessionState {
                phase,
                attempt,
                answers,
                result: None,
                last_error: None,
                timer,
            },
        )
    }

    /// A session showing the result of an already graded attempt.
    #[must_use]
    pub fn completed(
        definition: Arc<QuizDefinition>,
        backend: Arc<dyn QuizBackend>,
        store: Arc<dyn AnswerStore>,
        clock: Clock,
        attempt: Attempt,
        result: GradingResult,
    ) -> Self {
        Self::with_state(
            definition,
            backend,
            store,
            clock,
            SessionState {
                phase: SessionPhase::Completed,
                attempt,
                answers: AnswerSet::new(),
                result: Some(result),
                last_error: None,
                timer: None,
            },
        )
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn quiz_id(&self) -> QuizId {
        self.definition.id()
    }

    #[must_use]
    pub fn definition(&self) -> &QuizDefinition {
        &self.definition
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.lock().phase
    }

    #[must_use]
    pub fn attempt(&self) -> Attempt {
        self.lock().attempt.clone()
    }

    /// Snapshot of the current selections.
    #[must_use]
    pub fn answers(&self) -> AnswerSet {
        self.lock().answers.clone()
    }

    #[must_use]
    pub fn result(&self) -> Option<GradingResult> {
        self.lock().result.clone()
    }

    #[must_use]
    pub fn last_error(&self) -> Option<SessionFailure> {
        self.lock().last_error.clone()
    }

    #[must_use]
    pub fn progress(&self) -> AttemptProgress {
        AttemptProgress::new(self.definition.question_count(), self.lock().answers.len())
    }

    /// Deadline of the open attempt, for timed quizzes only.
    #[must_use]
    pub fn deadline(&self) -> Option<Deadline> {
        let state = self.lock();
        if !state.attempt.is_in_progress() {
            return None;
        }
        Deadline::for_attempt(&self.definition, &state.attempt)
    }

    /// Countdown for the open attempt, recomputed from its persisted start.
    ///
    /// Every call hands out the same controller, so the forced submit fires
    /// once per attempt however often the countdown is rendered.
    #[must_use]
    pub fn deadline_controller(&self) -> Option<DeadlineController> {
        let state = self.lock();
        if !state.attempt.is_in_progress() {
            return None;
        }
        state.timer.clone()
    }

    #[must_use]
    pub fn report(&self) -> Option<ResultReport> {
        let result = self.result()?;
        Some(ResultReport::new(
            &result,
            self.definition.questions(),
            self.definition.pass_threshold(),
        ))
    }

    /// Result data plus the retake affordance, once the attempt is graded.
    #[must_use]
    pub fn presenter(&self) -> Option<ResultPresenter> {
        if self.phase() != SessionPhase::Completed {
            return None;
        }
        Some(ResultPresenter {
            report: self.report()?,
            retake: RetakeAction::new(self.clone()),
        })
    }

    /// Select `choice` for `question`, replacing any earlier selection.
    ///
    /// Purely local: the full answer set is written to the store, nothing is sent.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownQuestion`/`UnknownChoice` for ids outside the quiz,
    /// `SessionError::NotAnswering` outside an answering phase,
    /// `SessionError::DeadlinePassed` once a timed attempt has expired with at
    /// least one answer recorded, and
    /// `SessionError::Storage` if the write fails (the selection is kept in memory).
    pub async fn record_answer(
        &self,
        question: QuestionId,
        choice: ChoiceId,
    ) -> Result<(), SessionError> {
        let owner = self
            .definition
            .question(question)
            .ok_or(SessionError::UnknownQuestion(question))?;
        if !owner.has_choice(choice) {
            return Err(SessionError::UnknownChoice { question, choice });
        }

        {
            let mut state = self.lock();
            if !state.phase.is_answering() {
                return Err(SessionError::NotAnswering(state.phase));
            }
            let expired = Deadline::for_attempt(&self.definition, &state.attempt)
                .is_some_and(|deadline| deadline.is_expired(self.clock.now()));
            // The service refuses empty submissions, so an attempt that ran out
            // of time with nothing answered may still take a single answer.
            if expired && !state.answers.is_empty() {
                return Err(SessionError::DeadlinePassed);
            }
            state.answers.select(question, choice);
        }

        self.persist_answers().await
    }

    /// Write the latest answer set. Writes are serialised and each one takes a
    /// fresh snapshot, so the last write to land is never stale.
    async fn persist_answers(&self) -> Result<(), SessionError> {
        let _write = self.writes.lock().await;
        let snapshot = {
            let state = self.lock();
            if !(state.phase.is_answering() || state.phase == SessionPhase::Submitting) {
                return Ok(());
            }
            state.answers.clone()
        };
        self.store.save(self.quiz_id(), &snapshot).await?;
        Ok(())
    }

    async fn clear_saved_answers(&self) -> Result<(), StorageError> {
        let _write = self.writes.lock().await;
        self.store.clear(self.quiz_id()).await
    }

    /// Send the current answers for grading.
    ///
    /// Only the first call out of an answering phase submits; calls made while
    /// a submission is in flight or after completion return
    /// `SubmitOutcome::Suppressed` without contacting the service.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Submit` when grading fails; the session returns to
    /// its answering phase with every answer intact. Returns
    /// `SessionError::NotAnswering` while loading or after a failed retake.
    pub async fn submit(&self, trigger: SubmitTrigger) -> Result<SubmitOutcome, SessionError> {
        let (submission, resume_phase) = {
            let mut state = self.lock();
            match state.phase {
                SessionPhase::AnsweringUntimed | SessionPhase::AnsweringTimed => {}
                SessionPhase::Submitting | SessionPhase::Completed => {
                    tracing::debug!(?trigger, phase = ?state.phase, "duplicate submit suppressed");
                    return Ok(SubmitOutcome::Suppressed);
                }
                other => return Err(SessionError::NotAnswering(other)),
            }
            let resume_phase = state.phase;
            state.phase = SessionPhase::Submitting;
            state.last_error = None;
            let submission = Submission {
                quiz_id: self.quiz_id(),
                attempt_id: state.attempt.id(),
                answers: state.answers.entries(),
                trigger,
            };
            (submission, resume_phase)
        };

        tracing::info!(
            quiz_id = %submission.quiz_id,
            attempt_id = %submission.attempt_id,
            answered = submission.answers.len(),
            ?trigger,
            "submitting attempt"
        );

        match self.backend.submit_attempt(&submission).await {
            Ok(result) => {
                {
                    let mut state = self.lock();
                    let at = self.clock.now().max(state.attempt.started_at());
                    if let Err(err) = state.attempt.complete(result.score, at) {
                        tracing::warn!(%err, "attempt was already marked completed");
                    }
                    state.answers.clear();
                    state.result = Some(result.clone());
                    state.phase = SessionPhase::Completed;
                }
                if let Err(err) = self.clear_saved_answers().await {
                    tracing::warn!(%err, quiz_id = %self.quiz_id(), "could not clear saved answers");
                }
                Ok(SubmitOutcome::Graded(result))
            }
            Err(err) => {
                tracing::warn!(%err, attempt_id = %submission.attempt_id, "submission failed");
                let mut state = self.lock();
                state.phase = resume_phase;
                state.last_error = Some(SessionFailure {
                    kind: FailureKind::Submit,
                    message: err.to_string(),
                });
                Err(SessionError::Submit(err))
            }
        }
    }

    /// Discard the graded attempt's local state and start a new attempt.
    ///
    /// Also retries a retake whose start failed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotCompleted` unless the session is completed (or
    /// failed during an earlier retake), `SessionError::Storage` if the saved
    /// answers cannot be cleared and `SessionError::StartAttempt` if the service
    /// does not open a new attempt. Both failures leave the session in `Error`.
    pub async fn retake(&self) -> Result<(), SessionError> {
        {
            let mut state = self.lock();
            if !matches!(state.phase, SessionPhase::Completed | SessionPhase::Error) {
                return Err(SessionError::NotCompleted);
            }
            state.phase = SessionPhase::Loading;
            state.answers.clear();
            state.result = None;
            state.last_error = None;
        }
        tracing::info!(quiz_id = %self.quiz_id(), "retake requested");

        if let Err(err) = self.clear_saved_answers().await {
            self.fail(FailureKind::Storage, err.to_string());
            return Err(err.into());
        }

        match self.backend.start_attempt(self.quiz_id()).await {
            Ok(attempt) if attempt.is_in_progress() => {
                let mut state = self.lock();
                tracing::debug!(attempt_id = %attempt.id(), "new attempt started");
                state.timer = countdown_for(&self.definition, &attempt, self.clock);
                state.attempt = attempt;
                state.phase = answering_phase(&self.definition);
                Ok(())
            }
            Ok(attempt) => {
                let err = crate::error::RemoteError::Rejected(format!(
                    "attempt {} is not open",
                    attempt.id()
                ));
                self.fail(FailureKind::StartAttempt, err.to_string());
                Err(SessionError::StartAttempt(err))
            }
            Err(err) => {
                tracing::warn!(%err, "could not start a new attempt");
                self.fail(FailureKind::StartAttempt, err.to_string());
                Err(SessionError::StartAttempt(err))
            }
        }
    }

    fn fail(&self, kind: FailureKind, message: String) {
        let mut state = self.lock();
        state.phase = SessionPhase::Error;
        state.last_error = Some(SessionFailure { kind, message });
    }
}

impl std::fmt::Debug for AttemptSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("AttemptSession")
            .field("quiz_id", &self.definition.id())
            .field("attempt_id", &state.attempt.id())
            .field("phase", &state.phase)
            .field("answered", &state.answers.len())
            .finish()
    }
}

fn countdown_for(
    definition: &QuizDefinition,
    attempt: &Attempt,
    clock: Clock,
) -> Option<DeadlineController> {
    Deadline::for_attempt(definition, attempt)
        .map(|deadline| DeadlineController::new(deadline, attempt.id(), clock))
}

fn answering_phase(definition: &QuizDefinition) -> SessionPhase {
    if definition.is_timed() {
        SessionPhase::AnsweringTimed
    } else {
        SessionPhase::AnsweringUntimed
    }
}
