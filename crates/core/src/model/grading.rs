use crate::model::attempt::Attempt;

/// Outcome of grading an attempt.
///
/// Produced by the grading service. The client never derives correctness
/// on its own; optional fields are simply absent when the service omits them.
#[derive(Debug, Clone, PartialEq)]
pub struct GradingResult {
    pub score: f64,
    pub total_points: f64,
    pub percentage: Option<f64>,
    pub correct: Option<u32>,
    pub incorrect: Option<u32>,
    pub total_questions: Option<u32>,
    pub points_display: Option<String>,
}

impl GradingResult {
    #[must_use]
    pub fn new(score: f64, total_points: f64) -> Self {
        Self {
            score,
            total_points,
            percentage: None,
            correct: None,
            incorrect: None,
            total_questions: None,
            points_display: None,
        }
    }

    /// Rebuild the result of an attempt that was graded in an earlier visit.
    ///
    /// Only the score survives on the attempt, so counts stay unknown.
    #[must_use]
    pub fn from_completed_attempt(attempt: &Attempt, total_points: u32) -> Self {
        Self::new(attempt.score().unwrap_or(0.0), f64::from(total_points))
    }

    /// Percentage score, preferring the service's own figure.
    ///
    /// Reports 0 when the quiz has no points.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        if let Some(pct) = self.percentage {
            return pct;
        }
        if self.total_points <= 0.0 {
            return 0.0;
        }
        self.score / self.total_points * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttemptId, AttemptStatus, QuizId};
    use crate::time::fixed_now;

    #[test]
    fn percentage_is_computed_when_missing() {
        assert!((GradingResult::new(7.0, 10.0).percentage() - 70.0).abs() < f64::EPSILON);
    }

    #[test]
    fn percentage_guards_zero_total() {
        assert_eq!(GradingResult::new(0.0, 0.0).percentage(), 0.0);
    }

    #[test]
    fn service_percentage_wins() {
        let mut result = GradingResult::new(1.0, 3.0);
        result.percentage = Some(33.33);
        assert_eq!(result.percentage(), 33.33);
    }

    #[test]
    fn rebuilt_from_attempt_score() {
        let attempt = Attempt::from_persisted(
            AttemptId::new(1),
            QuizId::new(1),
            AttemptStatus::Completed,
            fixed_now(),
            Some(fixed_now()),
            Some(6.0),
        )
        .unwrap();
        let result = GradingResult::from_completed_attempt(&attempt, 8);
        assert_eq!(result.total_points, 8.0);
        assert_eq!(result.percentage(), 75.0);
        assert_eq!(result.correct, None);
    }
}
