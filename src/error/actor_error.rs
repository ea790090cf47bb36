//! Run-time actor failures and the recoverable/fatal taxonomy.

use thiserror::Error;

use super::ScriptError;

/// Whether a failure may be suppressed by `warn_on_failure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Operational failure: a timeout, a remote 4xx/5xx, a resource that was
    /// legitimately absent. Suppressible by `warn_on_failure`.
    Recoverable,
    /// Programming or configuration error. Always terminates the run.
    Fatal,
}

/// Every failure an actor can surface from construction or execution.
#[derive(Debug, Error)]
pub enum ActorError {
    /// The execution body outlived its deadline. The body keeps running
    /// detached; this error only notifies the caller.
    #[error("execution exceeded deadline: {timeout}s")]
    ActorTimedOut { timeout: f64 },
    #[error("{0}")]
    Recoverable(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unable to resolve \"{0}\" to a registered actor")]
    InvalidActor(String),
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    #[error("missing context tokens: {}", .0.join(", "))]
    MissingContext(Vec<String>),
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
    #[error("{failed} of {total} actors in group failed")]
    GroupFailed {
        failed: usize,
        total: usize,
        fatal: bool,
    },
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error("{0}")]
    Fatal(String),
}

impl ActorError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ActorError::ActorTimedOut { .. }
            | ActorError::Recoverable(_)
            | ActorError::BadRequest(_) => FailureKind::Recoverable,
            ActorError::GroupFailed { fatal, .. } => {
                if *fatal {
                    FailureKind::Fatal
                } else {
                    FailureKind::Recoverable
                }
            }
            ActorError::InvalidActor(_)
            | ActorError::InvalidOptions(_)
            | ActorError::MissingContext(_)
            | ActorError::InvalidCredentials(_)
            | ActorError::Script(_)
            | ActorError::Fatal(_) => FailureKind::Fatal,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.kind() == FailureKind::Recoverable
    }
}
