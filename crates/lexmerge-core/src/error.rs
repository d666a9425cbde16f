use thiserror::Error;

/// All errors that can occur in lexmerge-core.
#[derive(Debug, Error)]
pub enum LexiconError {
    #[error("Word not found: {0}")]
    WordNotFound(String),

    #[error("Sense not found: {0}")]
    SenseNotFound(String),

    #[error("Merge record not found for parents {parents:?} and children {children:?}")]
    MergeRecordNotFound {
        parents: Vec<String>,
        children: Vec<String>,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Database connection poisoned")]
    LockPoisoned,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl LexiconError {
    /// SQLite reported the database busy or locked; the caller may retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Database(rusqlite::Error::SqliteFailure(err, _))
                if matches!(
                    err.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                )
        )
    }
}

/// Exit codes shared by the CLI.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NotFound = 2,
    InvalidArgs = 3,
    FileSystemError = 4,
    NetworkError = 6,
    Conflict = 7,
}

pub type Result<T> = std::result::Result<T, LexiconError>;
