use std::sync::Arc;

use async_trait::async_trait;
use lexmerge_core::{Database, MergeUnit, Scope, Word, WordId};

use crate::error::Result;

/// Lexicon operations the duplicate workflows run against. Every call is
/// scoped to one project and acting user.
#[async_trait]
pub trait LexiconBackend: Send + Sync {
    // ── Frontier ──

    async fn frontier_words(&self, scope: &Scope) -> Result<Vec<Word>>;
    async fn create_word(&self, scope: &Scope, word: Word) -> Result<Word>;
    /// Store a new version of `word.id`. The returned word has a fresh id.
    async fn update_word(&self, scope: &Scope, word: Word) -> Result<Word>;
    async fn delete_frontier_word(&self, scope: &Scope, id: &str) -> Result<()>;
    async fn duplicate_id(&self, scope: &Scope, word: &Word) -> Result<Option<WordId>>;
    async fn update_duplicate(&self, scope: &Scope, dup_id: &str, word: &Word) -> Result<WordId>;

    // ── Merges ──

    /// One result per unit, in order. A failed unit leaves no trace and does
    /// not stop the rest.
    async fn merge_words(&self, scope: &Scope, units: Vec<MergeUnit>)
        -> Vec<Result<Option<WordId>>>;
    async fn undo_merge(
        &self,
        scope: &Scope,
        parent_ids: &[WordId],
        child_ids: &[WordId],
    ) -> Result<()>;

    // ── Review lists ──

    async fn blacklist_add(&self, scope: &Scope, ids: &[WordId]) -> Result<()>;
    async fn graylist_add(&self, scope: &Scope, ids: &[WordId]) -> Result<()>;
    async fn has_graylist_entries(&self, scope: &Scope) -> Result<bool>;
    async fn graylist_entries(&self, scope: &Scope, max_lists: usize) -> Result<Vec<Vec<Word>>>;

    // ── Bulk duplicate finder ──

    /// Start a background search and return at once. Poll with
    /// `retrieve_potential_duplicates`.
    async fn find_potential_duplicates(
        &self,
        scope: &Scope,
        max_in_list: usize,
        max_lists: usize,
    ) -> Result<()>;
    /// The latest finished search for this project and user. Empty while a
    /// search is running or if none has run.
    async fn retrieve_potential_duplicates(&self, scope: &Scope) -> Result<Vec<Vec<Word>>>;
}

/// Run a synchronous storage call on the blocking pool.
pub(crate) async fn on_blocking_pool<T, F>(db: &Arc<Database>, call: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Database) -> lexmerge_core::Result<T> + Send + 'static,
{
    let db = Arc::clone(db);
    Ok(tokio::task::spawn_blocking(move || call(&db)).await??)
}
