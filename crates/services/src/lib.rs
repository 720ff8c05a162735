#![forbid(unsafe_code)]

pub mod attempts;
pub mod config;
pub mod error;
pub mod quiz_services;
pub mod remote;

pub use quiz_core::Clock;

pub use attempts::{
    AttemptProgress, AttemptResolver, AttemptSession, DeadlineController, FailureKind,
    ForcedSubmit, ResultPresenter, ResultReport, RetakeAction, SessionFailure, SessionPhase,
    SubmitOutcome, SubmitTrigger,
};
pub use config::BackendConfig;
pub use error::{ConfigError, QuizServicesError, RemoteError, ResolveError, SessionError};
pub use quiz_services::QuizServices;
pub use remote::{
    BackendOperation, HttpQuizBackend, InMemoryQuizBackend, QuizBackend, Submission,
    normalize_list,
};
