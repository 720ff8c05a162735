use std::collections::HashSet;

use thiserror::Error;

use crate::model::ids::{ChoiceId, CourseId, QuestionId, QuizId};

//
// ─── ERRORS ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("quiz title cannot be empty")]
    EmptyTitle,

    #[error("question {0} appears more than once")]
    DuplicateQuestion(QuestionId),

    #[error("choice {choice} appears more than once in question {question}")]
    DuplicateChoice {
        question: QuestionId,
        choice: ChoiceId,
    },

    #[error("question {0} must be worth at least one point")]
    ZeroPoints(QuestionId),

    #[error("time limit must be > 0 seconds")]
    ZeroTimeLimit,

    #[error("pass threshold must be within 0..=100, got {0}")]
    InvalidPassThreshold(f64),
}

//
// ─── CHOICE ──────────────────────────────────────────────────────────────────
//

/// One selectable answer option.
///
/// The correctness flag lives with the grading service only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    id: ChoiceId,
    text: String,
}

impl Choice {
    #[must_use]
    pub fn new(id: ChoiceId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn id(&self) -> ChoiceId {
        self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

//
// ─── QUESTION ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    prompt: String,
    choices: Vec<Choice>,
    points: u32,
    order: u32,
}

impl Question {
    #[must_use]
    pub fn new(
        id: QuestionId,
        prompt: impl Into<String>,
        choices: Vec<Choice>,
        points: u32,
        order: u32,
    ) -> Self {
        Self {
            id,
            prompt: prompt.into(),
            choices,
            points,
            order,
        }
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn choices(&self) -> &[Choice] {
        &self.choices
    }

    #[must_use]
    pub fn points(&self) -> u32 {
        self.points
    }

    #[must_use]
    pub fn order(&self) -> u32 {
        self.order
    }

    #[must_use]
    pub fn has_choice(&self, choice: ChoiceId) -> bool {
        self.choices.iter().any(|c| c.id == choice)
    }
}

//
// ─── QUIZ DEFINITION ─────────────────────────────────────────────────────────
//

/// Unvalidated quiz payload, as decoded from the grading service.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizDraft {
    pub id: QuizId,
    pub course_id: CourseId,
    pub title: String,
    pub description: String,
    pub questions: Vec<Question>,
    pub time_limit_secs: Option<u32>,
    pub pass_threshold: Option<f64>,
}

/// Read-only quiz as served to a learner.
///
/// Questions keep the order the service assigned them (by `order`, then id).
#[derive(Debug, Clone, PartialEq)]
pub struct QuizDefinition {
    id: QuizId,
    course_id: CourseId,
    title: String,
    description: String,
    questions: Vec<Question>,
    time_limit_secs: Option<u32>,
    pass_threshold: Option<f64>,
}

impl QuizDefinition {
    /// Validate a draft into a definition.
    ///
    /// # Errors
    ///
    /// Returns `QuizError` when the title is blank, ids repeat, a question is
    /// worth zero points, the time limit is zero or the pass threshold is out of range.
    pub fn new(draft: QuizDraft) -> Result<Self, QuizError> {
        let QuizDraft {
            id,
            course_id,
            title,
            description,
            mut questions,
            time_limit_secs,
            pass_threshold,
        } = draft;

        let title = title.trim().to_owned();
        if title.is_empty() {
            return Err(QuizError::EmptyTitle);
        }
        if time_limit_secs == Some(0) {
            return Err(QuizError::ZeroTimeLimit);
        }
        if let Some(threshold) = pass_threshold.filter(|t| !(0.0..=100.0).contains(t)) {
            return Err(QuizError::InvalidPassThreshold(threshold));
        }

        let mut seen = HashSet::with_capacity(questions.len());
        for question in &questions {
            if !seen.insert(question.id) {
                return Err(QuizError::DuplicateQuestion(question.id));
            }
            if question.points == 0 {
                return Err(QuizError::ZeroPoints(question.id));
            }
            let mut choices = HashSet::with_capacity(question.choices.len());
            for choice in &question.choices {
                if !choices.insert(choice.id) {
                    return Err(QuizError::DuplicateChoice {
                        question: question.id,
                        choice: choice.id,
                    });
                }
            }
        }

        questions.sort_by_key(|q| (q.order, q.id));

        Ok(Self {
            id,
            course_id,
            title,
            description,
            questions,
            time_limit_secs,
            pass_threshold,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuizId {
        self.id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// Sum of all question points.
    #[must_use]
    pub fn total_points(&self) -> u32 {
        self.questions
            .iter()
            .fold(0_u32, |acc, q| acc.saturating_add(q.points))
    }

    #[must_use]
    pub fn time_limit_secs(&self) -> Option<u32> {
        self.time_limit_secs
    }

    #[must_use]
    pub fn is_timed(&self) -> bool {
        self.time_limit_secs.is_some()
    }

    /// Minimum percentage needed to pass, if the quiz defines one.
    #[must_use]
    pub fn pass_threshold(&self) -> Option<f64> {
        self.pass_threshold
    }

    #[must_use]
    pub fn contains_choice(&self, question: QuestionId, choice: ChoiceId) -> bool {
        self.question(question)
            .is_some_and(|q| q.has_choice(choice))
    }
}

//
// ─── TESTS ───────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: u64, order: u32, points: u32) -> Question {
        Question::new(
            QuestionId::new(id),
            format!("Q{id}"),
            vec![
                Choice::new(ChoiceId::new(id * 10 + 1), "a"),
                Choice::new(ChoiceId::new(id * 10 + 2), "b"),
            ],
            points,
            order,
        )
    }

    fn draft(questions: Vec<Question>) -> QuizDraft {
        QuizDraft {
            id: QuizId::new(1),
            course_id: CourseId::new(2),
            title: " Rust basics ".into(),
            description: String::new(),
            questions,
            time_limit_secs: None,
            pass_threshold: None,
        }
    }

    #[test]
    fn orders_questions_and_sums_points() {
        let quiz =
            QuizDefinition::new(draft(vec![question(2, 1, 3), question(1, 0, 2)])).unwrap();

        assert_eq!(quiz.title(), "Rust basics");
        assert_eq!(quiz.questions()[0].id(), QuestionId::new(1));
        assert_eq!(quiz.total_points(), 5);
        assert_eq!(quiz.question_count(), 2);
        assert!(!quiz.is_timed());
    }

    #[test]
    fn rejects_duplicate_questions() {
        let err = QuizDefinition::new(draft(vec![question(1, 0, 1), question(1, 1, 1)]))
            .unwrap_err();
        assert_eq!(err, QuizError::DuplicateQuestion(QuestionId::new(1)));
    }

    #[test]
    fn rejects_duplicate_choices() {
        let q = Question::new(
            QuestionId::new(1),
            "Q",
            vec![
                Choice::new(ChoiceId::new(5), "a"),
                Choice::new(ChoiceId::new(5), "b"),
            ],
            1,
            0,
        );
        let err = QuizDefinition::new(draft(vec![q])).unwrap_err();
        assert!(matches!(err, QuizError::DuplicateChoice { .. }));
    }

    #[test]
    fn rejects_zero_time_limit_and_bad_threshold() {
        let mut d = draft(vec![question(1, 0, 1)]);
        d.time_limit_secs = Some(0);
        assert_eq!(QuizDefinition::new(d).unwrap_err(), QuizError::ZeroTimeLimit);

        let mut d = draft(vec![question(1, 0, 1)]);
        d.pass_threshold = Some(120.0);
        assert!(matches!(
            QuizDefinition::new(d).unwrap_err(),
            QuizError::InvalidPassThreshold(_)
        ));
    }

    #[test]
    fn choice_membership_is_per_question() {
        let quiz = QuizDefinition::new(draft(vec![question(1, 0, 1), question(2, 1, 1)])).unwrap();
        assert!(quiz.contains_choice(QuestionId::new(1), ChoiceId::new(11)));
        assert!(!quiz.contains_choice(QuestionId::new(1), ChoiceId::new(21)));
        assert!(!quiz.contains_choice(QuestionId::new(9), ChoiceId::new(11)));
    }
}
