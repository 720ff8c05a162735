use quiz_core::model::{GradingResult, Question};

use super::session::AttemptSession;
use crate::error::SessionError;

/// Result data ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultReport {
    pub score: f64,
    pub total_points: f64,
    /// Rounded to one decimal place.
    pub percentage: f64,
    pub points_display: String,
    pub correct: Option<u32>,
    pub incorrect: Option<u32>,
    pub total_questions: u32,
    /// `None` when the quiz has no pass threshold.
    pub passed: Option<bool>,
}

impl ResultReport {
    /// Build the report for a graded attempt.
    ///
    /// Counts come from the grading service only. When it reports just the
    /// correct count, the incorrect count is the remainder of the questions.
    #[must_use]
    pub fn new(result: &GradingResult, questions: &[Question], pass_threshold: Option<f64>) -> Self {
        let question_count = u32::try_from(questions.len()).unwrap_or(u32::MAX);
        let total_questions = result.total_questions.unwrap_or(question_count);
        let incorrect = result
            .incorrect
            .or_else(|| result.correct.map(|c| total_questions.saturating_sub(c)));
        let raw_percentage = result.percentage();

        Self {
            score: result.score,
            total_points: result.total_points,
            percentage: (raw_percentage * 10.0).round() / 10.0,
            points_display: result.points_display.clone().unwrap_or_else(|| {
                format!(
                    "{}/{}",
                    format_points(result.score),
                    format_points(result.total_points)
                )
            }),
            correct: result.correct,
            incorrect,
            total_questions,
            passed: pass_threshold.map(|threshold| raw_percentage >= threshold),
        }
    }

    /// Percentage with one decimal and a trailing `%`, e.g. `100.0%`.
    #[must_use]
    pub fn percentage_display(&self) -> String {
        format!("{:.1}%", self.percentage)
    }
}

/// Format points without a trailing `.0` for whole numbers.
#[must_use]
pub fn format_points(points: f64) -> String {
    if points.fract() == 0.0 && points.abs() < 1e15 {
        format!("{points:.0}")
    } else {
        let formatted = format!("{points:.2}");
        formatted.trim_end_matches('0').trim_end_matches('.').to_owned()
    }
}

/// The "take the quiz again" affordance.
#[derive(Clone)]
pub struct RetakeAction {
    session: AttemptSession,
}

impl RetakeAction {
    pub(crate) fn new(session: AttemptSession) -> Self {
        Self { session }
    }

    /// Start a fresh attempt in the session.
    ///
    /// # Errors
    ///
    /// See [`AttemptSession::retake`].
    pub async fn invoke(&self) -> Result<(), SessionError> {
        self.session.retake().await
    }
}

impl std::fmt::Debug for RetakeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetakeAction")
            .field("quiz_id", &self.session.definition().id())
            .finish()
    }
}

/// What the result view needs: the numbers and the retake action.
#[derive(Debug, Clone)]
pub struct ResultPresenter {
    pub report: ResultReport,
    pub retake: RetakeAction,
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{Choice, ChoiceId, QuestionId};

    fn questions(points: &[u32]) -> Vec<Question> {
        points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let id = i as u64 + 1;
                Question::new(
                    QuestionId::new(id),
                    format!("Q{id}"),
                    vec![Choice::new(ChoiceId::new(id * 10), "a")],
                    *p,
                    i as u32,
                )
            })
            .collect()
    }

    #[test]
    fn perfect_score_formats_cleanly() {
        let mut result = GradingResult::new(10.0, 10.0);
        result.percentage = Some(100.0);
        result.correct = Some(4);
        result.incorrect = Some(0);
        let report = ResultReport::new(&result, &questions(&[1, 2, 3, 4]), None);

        assert_eq!(report.percentage_display(), "100.0%");
        assert_eq!(report.points_display, "10/10");
        assert_eq!(report.total_questions, 4);
        assert_eq!(report.passed, None);
    }

    #[test]
    fn zero_total_points_reports_zero_percent() {
        let report = ResultReport::new(&GradingResult::new(0.0, 0.0), &[], None);
        assert_eq!(report.percentage_display(), "0.0%");
        assert_eq!(report.points_display, "0/0");
    }

    #[test]
    fn incorrect_is_derived_from_correct_only() {
        let mut result = GradingResult::new(3.0, 5.0);
        result.correct = Some(3);
        let report = ResultReport::new(&result, &questions(&[1, 1, 1, 1, 1]), Some(60.0));
        assert_eq!(report.incorrect, Some(2));
        assert_eq!(report.passed, Some(true));
    }

    #[test]
    fn counts_stay_unknown_without_service_data() {
        let report = ResultReport::new(&GradingResult::new(7.5, 10.0), &questions(&[5, 5]), Some(80.0));
        assert_eq!(report.correct, None);
        assert_eq!(report.incorrect, None);
        assert_eq!(report.points_display, "7.5/10");
        assert_eq!(report.passed, Some(false));
    }

    #[test]
    fn service_points_string_wins() {
        let mut result = GradingResult::new(2.0, 3.0);
        result.points_display = Some("2 of 3".into());
        assert_eq!(ResultReport::new(&result, &[], None).points_display, "2 of 3");
    }

    #[test]
    fn points_formatting() {
        assert_eq!(format_points(10.0), "10");
        assert_eq!(format_points(7.5), "7.5");
        assert_eq!(format_points(2.25), "2.25");
    }
}
