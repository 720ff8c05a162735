mod answers;
mod attempt;
mod grading;
mod ids;
mod quiz;

pub use ids::{AttemptId, ChoiceId, CourseId, ParseIdError, QuestionId, QuizId};

pub use answers::{AnswerEntry, AnswerSet};
pub use attempt::{Attempt, AttemptError, AttemptStatus};
pub use grading::GradingResult;
pub use quiz::{Choice, Question, QuizDefinition, QuizDraft, QuizError};
