pub mod config;
pub mod error;
pub mod models;
pub mod sense_merge;
pub mod similarity;
pub mod storage;
pub mod suggest;

pub use config::{CoreConfig, DedupConfig, LexiconConfig, SuggestConfig};
pub use error::{ExitCode, LexiconError, Result};
pub use models::*;

pub use similarity::distance;
pub use suggest::{DuplicateSuggester, StringSuggester, duplicates_from_frontier};

pub use storage::database::{ConnectionPool, Database, open_database, open_in_memory};
pub use storage::repositories::{
    MergeRepository, Repository, ReviewRepository, SqliteMergeRepository,
    SqliteReviewRepository, SqliteWordRepository, WordRepository,
};
