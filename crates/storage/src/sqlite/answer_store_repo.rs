use async_trait::async_trait;
use chrono::Utc;
use quiz_core::model::{AnswerSet, QuizId};
use sqlx::Row;

use crate::repository::{AnswerStore, StorageError, answers_key, decode_answers, encode_answers};

use super::SqliteRepository;

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl AnswerStore for SqliteRepository {
    async fn save(&self, quiz_id: QuizId, answers: &AnswerSet) -> Result<(), StorageError> {
        let value = encode_answers(answers)?;
        sqlx::query(
            r"
            INSERT INTO local_state (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            ",
        )
        .bind(answers_key(quiz_id))
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn load(&self, quiz_id: QuizId) -> Result<AnswerSet, StorageError> {
        let row = sqlx::query("SELECT value FROM local_state WHERE key = ?1")
            .bind(answers_key(quiz_id))
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        let Some(row) = row else {
            return Ok(AnswerSet::new());
        };
        let raw: String = row
            .try_get("value")
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        decode_answers(&raw)
    }

    async fn clear(&self, quiz_id: QuizId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM local_state WHERE key = ?1")
            .bind(answers_key(quiz_id))
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}
