use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use quiz_core::model::{
    Attempt, AttemptId, AttemptStatus, Choice, ChoiceId, CourseId, GradingResult, Question,
    QuestionId, QuizDefinition, QuizDraft, QuizId,
};

use super::normalize::normalize_list;
use super::{QuizBackend, Submission};
use crate::config::BackendConfig;
use crate::error::RemoteError;

/// `QuizBackend` speaking JSON to the grading service's REST API.
#[derive(Clone)]
pub struct HttpQuizBackend {
    client: Client,
    config: BackendConfig,
}

impl HttpQuizBackend {
    /// Build a client with the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Http` if the HTTP client cannot be constructed.
    pub fn new(config: BackendConfig) -> Result<Self, RemoteError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    async fn get_json(&self, path: &str) -> Result<Value, RemoteError> {
        let url = self.config.endpoint(path);
        tracing::debug!(%url, "GET");
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.config.token)
            .send()
            .await?;
        read_json(response).await
    }

    async fn post_json<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<Value, RemoteError> {
        let url = self.config.endpoint(path);
        tracing::debug!(%url, "POST");
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.token)
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }
}

async fn read_json(response: Response) -> Result<Value, RemoteError> {
    match response.status() {
        status if status.is_success() => Ok(response.json().await?),
        StatusCode::NOT_FOUND => Err(RemoteError::NotFound),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(RemoteError::Forbidden),
        StatusCode::BAD_REQUEST => {
            let detail = response.text().await.unwrap_or_default();
            Err(RemoteError::Rejected(detail))
        }
        status => Err(RemoteError::HttpStatus(status)),
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, RemoteError> {
    serde_json::from_value(value).map_err(|e| RemoteError::Decode(e.to_string()))
}

#[async_trait]
impl QuizBackend for HttpQuizBackend {
    async fn fetch_quiz_definition(&self, quiz_id: QuizId) -> Result<QuizDefinition, RemoteError> {
        let body = self.get_json(&format!("quizzes/{quiz_id}/")).await?;
        decode::<QuizDto>(body)?.into_definition()
    }

    async fn list_attempts(&self, quiz_id: QuizId) -> Result<Vec<Attempt>, RemoteError> {
        let body = self
            .get_json(&format!("quizzes/{quiz_id}/attempts/me/"))
            .await?;
        normalize_list(body)
            .into_iter()
            .map(|item| decode::<AttemptDto>(item)?.into_attempt())
            .collect()
    }

    async fn start_attempt(&self, quiz_id: QuizId) -> Result<Attempt, RemoteError> {
        let body = self
            .post_json(&format!("quizzes/{quiz_id}/start/"), &serde_json::json!({}))
            .await?;
        decode::<AttemptDto>(body)?.into_attempt()
    }

    async fn submit_attempt(&self, submission: &Submission) -> Result<GradingResult, RemoteError> {
        let payload = SubmitRequest {
            attempt: submission.attempt_id.value(),
            answers: submission
                .answers
                .iter()
                .map(|entry| SubmitAnswer {
                    question: entry.question.value(),
                    selected_choice: entry.choice.value(),
                })
                .collect(),
        };
        let body = self
            .post_json(&format!("quizzes/{}/submit/", submission.quiz_id), &payload)
            .await?;
        Ok(decode::<SubmitResponse>(body)?.into_result())
    }

    async fn check_enrollment(&self, course_id: CourseId) -> Result<bool, RemoteError> {
        let body = self.get_json("enrollments/me/").await?;
        let enrolled = normalize_list(body)
            .into_iter()
            .filter_map(|item| serde_json::from_value::<EnrollmentDto>(item).ok())
            .any(|enrollment| enrollment.course.id() == course_id.value());
        Ok(enrolled)
    }
}

#[derive(Debug, Deserialize)]
struct QuizDto {
    id: u64,
    course: u64,
    title: String,
    #[serde(default)]
    description: Option<String>,
    /// Minutes on the wire.
    #[serde(default)]
    time_limit: Option<u32>,
    #[serde(default)]
    pass_threshold: Option<f64>,
    #[serde(default)]
    questions: Vec<QuestionDto>,
}

#[derive(Debug, Deserialize)]
struct QuestionDto {
    id: u64,
    text: String,
    #[serde(default = "default_points")]
    points: u32,
    #[serde(default)]
    order: u32,
    #[serde(default)]
    choices: Vec<ChoiceDto>,
}

fn default_points() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct ChoiceDto {
    id: u64,
    text: String,
}

impl QuizDto {
    fn into_definition(self) -> Result<QuizDefinition, RemoteError> {
        // A zero limit means "untimed" on the service side.
        let time_limit_secs = match self.time_limit {
            None | Some(0) => None,
            Some(minutes) => Some(minutes.checked_mul(60).ok_or_else(|| {
                RemoteError::Decode(format!("time limit of {minutes} minutes is too large"))
            })?),
        };
        let questions = self
            .questions
            .into_iter()
            .map(|q| {
                let choices = q
                    .choices
                    .into_iter()
                    .map(|c| Choice::new(ChoiceId::new(c.id), c.text))
                    .collect();
                Question::new(QuestionId::new(q.id), q.text, choices, q.points, q.order)
            })
            .collect();

        QuizDefinition::new(QuizDraft {
            id: QuizId::new(self.id),
            course_id: CourseId::new(self.course),
            title: self.title,
            description: self.description.unwrap_or_default(),
            questions,
            time_limit_secs,
            pass_threshold: self.pass_threshold,
        })
        .map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct AttemptDto {
    id: u64,
    quiz: u64,
    started_at: DateTime<Utc>,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    score: Option<f64>,
    status: String,
}

impl AttemptDto {
    fn into_attempt(self) -> Result<Attempt, RemoteError> {
        let status =
            AttemptStatus::parse(&self.status).map_err(|e| RemoteError::Decode(e.to_string()))?;
        Attempt::from_persisted(
            AttemptId::new(self.id),
            QuizId::new(self.quiz),
            status,
            self.started_at,
            self.completed_at,
            self.score,
        )
        .map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

#[derive(Debug, Serialize)]
struct SubmitRequest {
    attempt: u64,
    answers: Vec<SubmitAnswer>,
}

#[derive(Debug, Serialize)]
struct SubmitAnswer {
    question: u64,
    selected_choice: u64,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    score: f64,
    total_points: f64,
    #[serde(default)]
    percentage: Option<f64>,
    #[serde(default, alias = "correct_answers", alias = "correct_count")]
    correct: Option<u32>,
    #[serde(default, alias = "incorrect_answers", alias = "incorrect_count")]
    incorrect: Option<u32>,
    #[serde(default)]
    total_questions: Option<u32>,
    #[serde(default)]
    points_display: Option<String>,
}

impl SubmitResponse {
    fn into_result(self) -> GradingResult {
        GradingResult {
            score: self.score,
            total_points: self.total_points,
            percentage: self.percentage,
            correct: self.correct,
            incorrect: self.incorrect,
            total_questions: self.total_questions,
            points_display: self.points_display,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EnrollmentDto {
    course: CourseRef,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CourseRef {
    Id(u64),
    Nested { id: u64 },
}

impl CourseRef {
    fn id(&self) -> u64 {
        match self {
            CourseRef::Id(id) | CourseRef::Nested { id } => *id,
        }
    }
}
