use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use lexmerge_core::{
    Database, DedupConfig, LexiconError, MergeRecord, MergeUnit, Scope, Word, WordId, sorted_ids,
};
use tracing::{debug, info, warn};

use crate::backend::{LexiconBackend, on_blocking_pool};
use crate::dedup::DuplicateFinder;
use crate::defunct::{DefunctTracker, QueuedEdit};
use crate::error::{EngineError, Result};
use crate::jobs::DedupJobs;
use crate::merge::MergeOrchestrator;

/// `LexiconBackend` over the SQLite store in `lexmerge-core`.
pub struct SqliteBackend {
    db: Arc<Database>,
    defunct: Arc<DefunctTracker<Word>>,
    orchestrator: MergeOrchestrator,
    jobs: Arc<DedupJobs>,
    finder: DuplicateFinder,
    follow_ups: Mutex<Vec<QueuedEdit<Word>>>,
}

impl SqliteBackend {
    pub fn new(db: Database) -> Self {
        Self::with_config(db, &DedupConfig::default())
    }

    pub fn with_config(db: Database, config: &DedupConfig) -> Self {
        let db = Arc::new(db);
        let defunct = Arc::new(DefunctTracker::new());
        Self {
            orchestrator: MergeOrchestrator::new(Arc::clone(&db), Arc::clone(&defunct)),
            db,
            defunct,
            jobs: Arc::new(DedupJobs::new()),
            finder: DuplicateFinder::from_config(config),
            follow_ups: Mutex::new(Vec::new()),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn defunct(&self) -> &DefunctTracker<Word> {
        &self.defunct
    }

    /// Hold a new version of a word whose mutation is still in flight. It
    /// comes back from `take_follow_ups` once the mutation settles.
    pub fn queue_edit(&self, word: Word) -> Result<()> {
        let id = word.id.clone();
        self.defunct.queue(&id, word)
    }

    /// Edits released by settled mutations, addressed to the surviving id.
    pub fn take_follow_ups(&self) -> Result<Vec<QueuedEdit<Word>>> {
        let mut follow_ups = self
            .follow_ups
            .lock()
            .map_err(|_| EngineError::Storage(LexiconError::LockPoisoned))?;
        Ok(std::mem::take(&mut *follow_ups))
    }

    pub fn is_search_running(&self, scope: &Scope) -> Result<bool> {
        self.jobs.is_running(scope)
    }

    pub async fn merge_history(&self, scope: &Scope, limit: usize) -> Result<Vec<MergeRecord>> {
        let project = scope.project_id.clone();
        on_blocking_pool(&self.db, move |db| db.merge_history(&project, limit)).await
    }

    fn stash(&self, edits: Vec<QueuedEdit<Word>>) -> Result<()> {
        if edits.is_empty() {
            return Ok(());
        }
        self.follow_ups
            .lock()
            .map_err(|_| EngineError::Storage(LexiconError::LockPoisoned))?
            .extend(edits);
        Ok(())
    }

    /// Settle the mark on `id`, keeping whatever edits were queued on it.
    fn settle(&self, id: &str, successor: Option<&str>) -> Result<()> {
        let edits = match successor {
            Some(next) => self.defunct.resolve(id, next)?,
            None => self.defunct.release(id)?,
        };
        self.stash(edits)
    }
}

#[async_trait]
impl LexiconBackend for SqliteBackend {
    // ── Frontier ──

    async fn frontier_words(&self, scope: &Scope) -> Result<Vec<Word>> {
        let project = scope.project_id.clone();
        on_blocking_pool(&self.db, move |db| db.frontier_words(&project)).await
    }

    async fn create_word(&self, scope: &Scope, word: Word) -> Result<Word> {
        let scope = scope.clone();
        on_blocking_pool(&self.db, move |db| db.create_word(&scope, word)).await
    }

    async fn update_word(&self, scope: &Scope, word: Word) -> Result<Word> {
        let old_id = word.id.clone();
        self.defunct.mark(&old_id)?;

        let call_scope = scope.clone();
        let outcome = on_blocking_pool(&self.db, move |db| db.update_word(&call_scope, word)).await;

        let successor = outcome.as_ref().ok().map(|w| w.id.as_str());
        self.settle(&old_id, successor)?;
        outcome
    }

    async fn delete_frontier_word(&self, scope: &Scope, id: &str) -> Result<()> {
        self.defunct.mark(id)?;

        let call_scope = scope.clone();
        let call_id = id.to_string();
        let outcome = on_blocking_pool(&self.db, move |db| {
            db.delete_frontier_word(&call_scope, &call_id)
        })
        .await;

        self.settle(id, None)?;
        outcome
    }

    async fn duplicate_id(&self, scope: &Scope, word: &Word) -> Result<Option<WordId>> {
        let scope = scope.clone();
        let word = word.clone();
        on_blocking_pool(&self.db, move |db| db.duplicate_id(&scope, &word)).await
    }

    async fn update_duplicate(&self, scope: &Scope, dup_id: &str, word: &Word) -> Result<WordId> {
        self.defunct.mark(dup_id)?;

        let call_scope = scope.clone();
        let call_id = dup_id.to_string();
        let word = word.clone();
        let outcome = on_blocking_pool(&self.db, move |db| {
            db.update_duplicate(&call_scope, &call_id, &word)
        })
        .await;

        self.settle(dup_id, outcome.as_ref().ok().map(String::as_str))?;
        outcome
    }

    // ── Merges ──

    async fn merge_words(
        &self,
        scope: &Scope,
        units: Vec<MergeUnit>,
    ) -> Vec<Result<Option<WordId>>> {
        let report = self.orchestrator.merge_words(scope, units).await;
        if let Err(err) = self.stash(report.follow_ups) {
            warn!(error = %err, "dropped follow-up edits");
        }
        report.results
    }

    async fn undo_merge(
        &self,
        scope: &Scope,
        parent_ids: &[WordId],
        child_ids: &[WordId],
    ) -> Result<()> {
        let released = self.orchestrator.undo_merge(scope, parent_ids, child_ids).await?;
        self.stash(released)
    }

    // ── Review lists ──

    async fn blacklist_add(&self, scope: &Scope, ids: &[WordId]) -> Result<()> {
        let scope = scope.clone();
        let ids = ids.to_vec();
        on_blocking_pool(&self.db, move |db| db.blacklist_add(&scope, &ids)).await
    }

    async fn graylist_add(&self, scope: &Scope, ids: &[WordId]) -> Result<()> {
        let scope = scope.clone();
        let ids = ids.to_vec();
        on_blocking_pool(&self.db, move |db| db.graylist_add(&scope, &ids)).await
    }

    async fn has_graylist_entries(&self, scope: &Scope) -> Result<bool> {
        let scope = scope.clone();
        on_blocking_pool(&self.db, move |db| db.has_graylist_entries(&scope)).await
    }

    async fn graylist_entries(&self, scope: &Scope, max_lists: usize) -> Result<Vec<Vec<Word>>> {
        let scope = scope.clone();
        on_blocking_pool(&self.db, move |db| db.graylist_entries(&scope, max_lists)).await
    }

    // ── Bulk duplicate finder ──

    async fn find_potential_duplicates(
        &self,
        scope: &Scope,
        max_in_list: usize,
        max_lists: usize,
    ) -> Result<()> {
        if !self.jobs.start(scope)? {
            debug!(project = %scope.project_id, user = %scope.user_id, "duplicate search already running");
            return Ok(());
        }

        let finder = self
            .finder
            .clone()
            .with_max_in_list(max_in_list)
            .with_max_lists(max_lists);
        let db = Arc::clone(&self.db);
        let jobs = Arc::clone(&self.jobs);
        let scope = scope.clone();

        info!(project = %scope.project_id, user = %scope.user_id, max_in_list, max_lists, "duplicate search started");
        tokio::spawn(async move {
            let started = Instant::now();
            let search_scope = scope.clone();
            let outcome = on_blocking_pool(&db, move |db| {
                let words = db.frontier_words(&search_scope.project_id)?;
                let excluded = db.excluded_sets(&search_scope)?;
                Ok(finder.find_clusters(&words, &excluded))
            })
            .await;

            let stored = match outcome {
                Ok(clusters) => {
                    info!(
                        project = %scope.project_id,
                        user = %scope.user_id,
                        clusters = clusters.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "duplicate search finished"
                    );
                    jobs.finish(&scope, clusters)
                }
                Err(err) => {
                    warn!(project = %scope.project_id, user = %scope.user_id, error = %err, "duplicate search failed");
                    jobs.fail(&scope)
                }
            };
            if let Err(err) = stored {
                warn!(error = %err, "could not store duplicate search result");
            }
        });

        Ok(())
    }

    async fn retrieve_potential_duplicates(&self, scope: &Scope) -> Result<Vec<Vec<Word>>> {
        let Some(clusters) = self.jobs.latest(scope)? else {
            return Ok(Vec::new());
        };

        // Drop clusters that went stale or were filed after the search ran.
        let search_scope = scope.clone();
        let (live, excluded) = on_blocking_pool(&self.db, move |db| {
            let live: HashSet<WordId> = db
                .frontier_words(&search_scope.project_id)?
                .into_iter()
                .map(|w| w.id)
                .collect();
            let excluded: HashSet<Vec<WordId>> = db.excluded_sets(&search_scope)?.into_iter().collect();
            Ok((live, excluded))
        })
        .await?;

        Ok(clusters
            .into_iter()
            .filter(|cluster| cluster.iter().all(|w| live.contains(&w.id)))
            .filter(|cluster| !excluded.contains(&sorted_ids(cluster.iter().map(|w| w.id.clone()))))
            .collect())
    }
}
