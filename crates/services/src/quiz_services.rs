use std::sync::Arc;

use storage::LocalStorage;

use crate::Clock;
use crate::attempts::AttemptResolver;
use crate::config::BackendConfig;
use crate::error::QuizServicesError;
use crate::remote::{HttpQuizBackend, QuizBackend};

/// Wires the grading service and local storage into app-facing services.
#[derive(Clone)]
pub struct QuizServices {
    resolver: Arc<AttemptResolver>,
    backend: Arc<dyn QuizBackend>,
    storage: LocalStorage,
}

impl QuizServices {
    #[must_use]
    pub fn new(clock: Clock, backend: Arc<dyn QuizBackend>, storage: LocalStorage) -> Self {
        let resolver = Arc::new(AttemptResolver::new(
            clock,
            Arc::clone(&backend),
            Arc::clone(&storage.answers),
        ));
        Self {
            resolver,
            backend,
            storage,
        }
    }

    /// Build services talking HTTP to the grading service, with answers kept in `SQLite`.
    ///
    /// # Errors
    ///
    /// Returns `QuizServicesError` if storage initialization or HTTP client setup fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        config: BackendConfig,
    ) -> Result<Self, QuizServicesError> {
        let storage = LocalStorage::sqlite(db_url).await?;
        let backend: Arc<dyn QuizBackend> = Arc::new(HttpQuizBackend::new(config)?);
        Ok(Self::new(clock, backend, storage))
    }

    #[must_use]
    pub fn resolver(&self) -> Arc<AttemptResolver> {
        Arc::clone(&self.resolver)
    }

    #[must_use]
    pub fn backend(&self) -> Arc<dyn QuizBackend> {
        Arc::clone(&self.backend)
    }

    #[must_use]
    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }
}
