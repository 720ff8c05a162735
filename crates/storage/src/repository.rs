use async_trait::async_trait;
use quiz_core::model::{AnswerSet, QuizId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Namespaced key under which a quiz's in-progress answers are stored.
#[must_use]
pub fn answers_key(quiz_id: QuizId) -> String {
    format!("quiz_{quiz_id}_answers")
}

pub(crate) fn encode_answers(answers: &AnswerSet) -> Result<String, StorageError> {
    serde_json::to_string(answers).map_err(|e| StorageError::Serialization(e.to_string()))
}

pub(crate) fn decode_answers(raw: &str) -> Result<AnswerSet, StorageError> {
    serde_json::from_str(raw).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Durable per-learner persistence of in-progress answers.
///
/// Each write replaces the whole record for the quiz, so the last write
/// always reflects the latest in-memory set.
#[async_trait]
pub trait AnswerStore: Send + Sync {
    /// Replace the stored answers for a quiz.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be written.
    async fn save(&self, quiz_id: QuizId, answers: &AnswerSet) -> Result<(), StorageError>;

    /// Load stored answers; a quiz with no record yields an empty set.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` for corrupt records, or other storage errors.
    async fn load(&self, quiz_id: QuizId) -> Result<AnswerSet, StorageError>;

    /// Drop the record for a quiz. Clearing a missing record is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be removed.
    async fn clear(&self, quiz_id: QuizId) -> Result<(), StorageError>;
}

/// Key/value store kept in memory, mirroring the browser's string storage.
#[derive(Clone, Default)]
pub struct InMemoryAnswerStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryAnswerStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Store a raw value under `key`, bypassing encoding.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store lock is poisoned.
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<String>) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.into(), value.into());
        Ok(())
    }

    /// Returns the raw stored value for `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store lock is poisoned.
    pub fn raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }
}

#[async_trait]
impl AnswerStore for InMemoryAnswerStore {
    async fn save(&self, quiz_id: QuizId, answers: &AnswerSet) -> Result<(), StorageError> {
        let encoded = encode_answers(answers)?;
        self.insert_raw(answers_key(quiz_id), encoded)
    }

    async fn load(&self, quiz_id: QuizId) -> Result<AnswerSet, StorageError> {
        match self.raw(&answers_key(quiz_id))? {
            Some(raw) => decode_answers(&raw),
            None => Ok(AnswerSet::new()),
        }
    }

    async fn clear(&self, quiz_id: QuizId) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(&answers_key(quiz_id));
        Ok(())
    }
}

/// Local persistence handed to services behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct LocalStorage {
    pub answers: Arc<dyn AnswerStore>,
}

impl LocalStorage {
    #[must_use]
    pub fn in_memory() -> Self {
        let answers: Arc<dyn AnswerStore> = Arc::new(InMemoryAnswerStore::new());
        Self { answers }
    }
}
