//! Lexmerge engine: bulk duplicate search, merge orchestration and the
//! async backend the CLI drives.

pub mod backend;
pub mod dedup;
pub mod defunct;
pub mod error;
pub mod jobs;
pub mod merge;
pub mod sqlite;

pub use backend::LexiconBackend;
pub use dedup::DuplicateFinder;
pub use defunct::{DefunctTracker, QueuedEdit};
pub use error::{EngineError, ErrorKind, Result};
pub use jobs::DedupJobs;
pub use merge::{MergeOrchestrator, MergeReport};
pub use sqlite::SqliteBackend;
