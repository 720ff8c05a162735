mod progress;
mod report;
mod resolver;
mod session;
mod timer;

// Public API of the attempt subsystem.
pub use crate::error::{ResolveError, SessionError};
pub use progress::AttemptProgress;
pub use report::{ResultPresenter, ResultReport, RetakeAction, format_points};
pub use resolver::AttemptResolver;
pub use session::{
    AttemptSession, FailureKind, SessionFailure, SessionPhase, SubmitOutcome, SubmitTrigger,
};
pub use timer::{DeadlineController, ForcedSubmit};
