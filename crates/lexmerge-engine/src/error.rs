use lexmerge_core::{ExitCode, LexiconError, WordId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("no active merge for parents {parents:?} and children {children:?}")]
    MergeRecordNotFound {
        parents: Vec<WordId>,
        children: Vec<WordId>,
    },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage busy, retry later: {0}")]
    Transient(String),

    #[error("storage error: {0}")]
    Storage(LexiconError),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Transient,
    Internal,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) | Self::MergeRecordNotFound { .. } => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Transient(_) => ErrorKind::Transient,
            Self::Storage(_) | Self::Task(_) => ErrorKind::Internal,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        match self.kind() {
            ErrorKind::Validation => ExitCode::InvalidArgs,
            ErrorKind::NotFound => ExitCode::NotFound,
            ErrorKind::Conflict => ExitCode::Conflict,
            ErrorKind::Transient => ExitCode::NetworkError,
            ErrorKind::Internal => ExitCode::GeneralError,
        }
    }
}

impl From<LexiconError> for EngineError {
    fn from(err: LexiconError) -> Self {
        if err.is_transient() {
            return Self::Transient(err.to_string());
        }
        match err {
            LexiconError::WordNotFound(id) => Self::NotFound(format!("word {id}")),
            LexiconError::SenseNotFound(guid) => Self::NotFound(format!("sense {guid}")),
            LexiconError::MergeRecordNotFound { parents, children } => {
                Self::MergeRecordNotFound { parents, children }
            }
            LexiconError::ValidationError(msg) => Self::Validation(msg),
            LexiconError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Storage(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
