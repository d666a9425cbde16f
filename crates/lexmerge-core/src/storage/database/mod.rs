mod connection;
mod migrations;
mod schema;

pub use connection::ConnectionPool;
pub use migrations::{Migration, get_applied_versions, run_migrations};
pub use schema::{SCHEMA_VERSION, init_schema};

use std::path::Path;

use chrono::Utc;
use tracing::{debug, info};

use crate::error::{LexiconError, Result};
use crate::models::{
    MergeRecord, MergeUnit, ReviewListKind, Scope, Word, WordId, new_word_id, sorted_ids,
};
use crate::sense_merge::{is_duplicate_of, merge_senses_into};

use super::repositories::{
    MergeRepository, Repository, ReviewRepository, SqliteMergeRepository,
    SqliteReviewRepository, SqliteWordRepository, WordRepository,
};

pub fn open_database(path: &Path) -> Result<ConnectionPool> {
    let pool = ConnectionPool::open(path)?;
    {
        let conn = pool.get_connection()?;
        run_migrations(&conn)?;
    }
    Ok(pool)
}

pub fn open_in_memory() -> Result<ConnectionPool> {
    let pool = ConnectionPool::open_in_memory()?;
    {
        let conn = pool.get_connection()?;
        run_migrations(&conn)?;
    }
    Ok(pool)
}

/// Lexicon store. Every mutation that touches more than one row runs in a
/// single transaction.
pub struct Database {
    pool: ConnectionPool,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let pool = open_database(path)?;
        Ok(Self { pool })
    }

    pub fn open_in_memory() -> Result<Self> {
        let pool = open_in_memory()?;
        Ok(Self { pool })
    }

    pub fn path(&self) -> Option<&str> {
        self.pool.path()
    }

    // ─── Words ─────────────────────────────────────────────

    pub fn frontier_words(&self, project_id: &str) -> Result<Vec<Word>> {
        let conn = self.pool.get_connection()?;
        SqliteWordRepository::new(&conn, project_id).list_frontier()
    }

    pub fn frontier_word(&self, project_id: &str, id: &str) -> Result<Option<Word>> {
        let conn = self.pool.get_connection()?;
        SqliteWordRepository::new(&conn, project_id).find_frontier(id)
    }

    /// Any stored version, retired or not.
    pub fn get_word(&self, project_id: &str, id: &str) -> Result<Word> {
        let conn = self.pool.get_connection()?;
        SqliteWordRepository::new(&conn, project_id)
            .find_by_id(&id.to_string())?
            .ok_or_else(|| LexiconError::WordNotFound(id.to_string()))
    }

    pub fn count_frontier(&self, project_id: &str) -> Result<usize> {
        let conn = self.pool.get_connection()?;
        SqliteWordRepository::new(&conn, project_id).count_frontier()
    }

    pub fn create_word(&self, scope: &Scope, mut word: Word) -> Result<Word> {
        check_vernacular(&word)?;

        let now = Utc::now();
        word.id = new_word_id();
        word.created = now;
        word.modified = now;

        let conn = self.pool.get_connection()?;
        SqliteWordRepository::new(&conn, &scope.project_id).save(&word)?;
        debug!(project = %scope.project_id, id = %word.id, "created word");
        Ok(word)
    }

    /// Store `word` as the next version of the frontier word with the same id.
    /// The new version gets a fresh id and the old one moves to its history.
    pub fn update_word(&self, scope: &Scope, word: Word) -> Result<Word> {
        check_vernacular(&word)?;
        let mut conn = self.pool.get_connection()?;
        let tx = conn.transaction()?;
        let words = SqliteWordRepository::new(&tx, &scope.project_id);

        let previous = words
            .find_frontier(&word.id)?
            .ok_or_else(|| LexiconError::WordNotFound(word.id.clone()))?;

        let mut next = word;
        next.id = new_word_id();
        next.guid = previous.guid;
        next.created = previous.created;
        next.record_ancestor(&previous.id);
        next.touch();

        words.retire(&previous.id)?;
        words.save(&next)?;
        tx.commit()?;

        debug!(project = %scope.project_id, old = %previous.id, new = %next.id, "updated word");
        Ok(next)
    }

    pub fn delete_frontier_word(&self, scope: &Scope, id: &str) -> Result<()> {
        let conn = self.pool.get_connection()?;
        if !SqliteWordRepository::new(&conn, &scope.project_id).retire(id)? {
            return Err(LexiconError::WordNotFound(id.to_string()));
        }
        info!(project = %scope.project_id, user = %scope.user_id, id, "deleted word");
        Ok(())
    }

    /// A frontier word that already covers everything `word` would add.
    pub fn duplicate_id(&self, scope: &Scope, word: &Word) -> Result<Option<WordId>> {
        let conn = self.pool.get_connection()?;
        let candidates = SqliteWordRepository::new(&conn, &scope.project_id)
            .find_frontier_by_vernacular(&word.vernacular)?;

        Ok(candidates
            .into_iter()
            .find(|existing| existing.id != word.id && is_duplicate_of(word, existing))
            .map(|existing| existing.id))
    }

    /// Fold `word`'s senses into the frontier word `dup_id`, producing a new
    /// version of it.
    pub fn update_duplicate(&self, scope: &Scope, dup_id: &str, word: &Word) -> Result<WordId> {
        check_vernacular(word)?;
        let mut conn = self.pool.get_connection()?;
        let tx = conn.transaction()?;
        let words = SqliteWordRepository::new(&tx, &scope.project_id);

        let existing = words
            .find_frontier(dup_id)?
            .ok_or_else(|| LexiconError::WordNotFound(dup_id.to_string()))?;

        let mut merged = merge_senses_into(&existing, word);
        merged.id = new_word_id();
        merged.record_ancestor(&existing.id);
        merged.touch();

        words.retire(&existing.id)?;
        words.save(&merged)?;
        tx.commit()?;

        debug!(project = %scope.project_id, old = %existing.id, new = %merged.id, "merged into duplicate");
        Ok(merged.id)
    }

    // ─── Merges ────────────────────────────────────────────

    /// Execute one merge unit atomically. Returns the id of the new parent
    /// version, or `None` for delete-only units.
    pub fn merge_unit(&self, scope: &Scope, unit: &MergeUnit) -> Result<Option<WordId>> {
        unit.validate()?;
        let child_ids = unit.child_ids();

        let mut conn = self.pool.get_connection()?;
        let tx = conn.transaction()?;
        let words = SqliteWordRepository::new(&tx, &scope.project_id);
        let merges = SqliteMergeRepository::new(&tx, &scope.project_id);

        let mut snapshots = Vec::with_capacity(child_ids.len() + 1);
        for id in &child_ids {
            let child = words
                .find_frontier(id)?
                .ok_or_else(|| LexiconError::WordNotFound(id.clone()))?;
            snapshots.push(child);
        }

        if unit.delete_only {
            for id in &child_ids {
                words.retire(id)?;
            }
            let record = MergeRecord::new(
                &scope.project_id,
                &scope.user_id,
                Vec::new(),
                child_ids.clone(),
                snapshots,
            );
            merges.save(&record)?;
            tx.commit()?;

            info!(project = %scope.project_id, user = %scope.user_id, children = child_ids.len(), "deleted merge children");
            return Ok(None);
        }

        let mut parent = unit.parent.clone();
        let previous_id = parent.id.clone();
        if !previous_id.is_empty() && !child_ids.contains(&previous_id) {
            if let Some(previous) = words.find_frontier(&previous_id)? {
                words.retire(&previous_id)?;
                parent.record_ancestor(&previous_id);
                snapshots.push(previous);
            }
        }

        for source in &unit.children {
            let id = &source.src_word_id;
            words.retire(id)?;
            parent.record_ancestor(id);

            if source.audio && *id != previous_id {
                if let Some(child) = snapshots.iter().find(|w| &w.id == id) {
                    parent.audio.extend(child.audio.iter().cloned());
                }
            }
        }

        parent.id = new_word_id();
        parent.touch();
        words.save(&parent)?;

        let record = MergeRecord::new(
            &scope.project_id,
            &scope.user_id,
            vec![parent.id.clone()],
            child_ids,
            snapshots,
        );
        merges.save(&record)?;
        tx.commit()?;

        info!(
            project = %scope.project_id,
            user = %scope.user_id,
            parent = %parent.id,
            children = record.child_ids.len(),
            "merged words"
        );
        Ok(Some(parent.id))
    }

    /// Inverse of a recorded merge: retire the surviving parents and restore
    /// every snapshot verbatim.
    pub fn undo_merge(
        &self,
        scope: &Scope,
        parent_ids: &[WordId],
        child_ids: &[WordId],
    ) -> Result<()> {
        let mut conn = self.pool.get_connection()?;
        let tx = conn.transaction()?;
        let words = SqliteWordRepository::new(&tx, &scope.project_id);
        let merges = SqliteMergeRepository::new(&tx, &scope.project_id);

        let record = merges.find_active(parent_ids, child_ids)?.ok_or_else(|| {
            LexiconError::MergeRecordNotFound {
                parents: sorted_ids(parent_ids.iter().cloned()),
                children: sorted_ids(child_ids.iter().cloned()),
            }
        })?;

        for id in &record.parent_ids {
            if !words.retire(id)? {
                return Err(LexiconError::Conflict(format!(
                    "merge parent {id} is no longer in the frontier"
                )));
            }
        }
        for snapshot in &record.snapshots {
            words.save(snapshot)?;
        }
        merges.mark_undone(&record.id)?;
        tx.commit()?;

        info!(
            project = %scope.project_id,
            user = %scope.user_id,
            record = %record.id,
            restored = record.snapshots.len(),
            "undid merge"
        );
        Ok(())
    }

    pub fn merge_history(&self, project_id: &str, limit: usize) -> Result<Vec<MergeRecord>> {
        let conn = self.pool.get_connection()?;
        SqliteMergeRepository::new(&conn, project_id).list_recent(limit)
    }

    // ─── Review lists ──────────────────────────────────────

    /// File a set as "not duplicates" for the whole project. The same set is
    /// dropped from the user's deferred list.
    pub fn blacklist_add(&self, scope: &Scope, ids: &[WordId]) -> Result<()> {
        let ids = review_set(ids)?;

        let mut conn = self.pool.get_connection()?;
        let tx = conn.transaction()?;
        let review = SqliteReviewRepository::new(&tx, &scope.project_id);
        review.add(ReviewListKind::Blacklist, None, &ids)?;
        review.remove(ReviewListKind::Graylist, Some(&scope.user_id), &ids)?;
        tx.commit()?;

        info!(project = %scope.project_id, user = %scope.user_id, words = ids.len(), "blacklisted cluster");
        Ok(())
    }

    /// Defer a set for this user.
    pub fn graylist_add(&self, scope: &Scope, ids: &[WordId]) -> Result<()> {
        let ids = review_set(ids)?;

        let conn = self.pool.get_connection()?;
        SqliteReviewRepository::new(&conn, &scope.project_id).add(
            ReviewListKind::Graylist,
            Some(&scope.user_id),
            &ids,
        )?;

        info!(project = %scope.project_id, user = %scope.user_id, words = ids.len(), "graylisted cluster");
        Ok(())
    }

    pub fn blacklist_sets(&self, project_id: &str) -> Result<Vec<Vec<WordId>>> {
        let conn = self.pool.get_connection()?;
        SqliteReviewRepository::new(&conn, project_id).id_sets(ReviewListKind::Blacklist)
    }

    pub fn graylist_sets(&self, scope: &Scope) -> Result<Vec<Vec<WordId>>> {
        let conn = self.pool.get_connection()?;
        let entries = SqliteReviewRepository::new(&conn, &scope.project_id)
            .list(ReviewListKind::Graylist, Some(&scope.user_id))?;
        Ok(entries.into_iter().map(|e| e.word_ids).collect())
    }

    /// Id sets the bulk finder must not propose to this user.
    pub fn excluded_sets(&self, scope: &Scope) -> Result<Vec<Vec<WordId>>> {
        let mut sets = self.blacklist_sets(&scope.project_id)?;
        sets.extend(self.graylist_sets(scope)?);
        Ok(sets)
    }

    /// The user's deferred clusters resolved against the frontier. Entries
    /// with fewer than two frontier words left are pruned.
    pub fn graylist_entries(&self, scope: &Scope, max_lists: usize) -> Result<Vec<Vec<Word>>> {
        let mut conn = self.pool.get_connection()?;
        let tx = conn.transaction()?;
        let words = SqliteWordRepository::new(&tx, &scope.project_id);
        let review = SqliteReviewRepository::new(&tx, &scope.project_id);

        let mut clusters = Vec::new();
        let mut pruned = 0usize;
        for entry in review.list(ReviewListKind::Graylist, Some(&scope.user_id))? {
            let mut cluster = Vec::with_capacity(entry.word_ids.len());
            for id in &entry.word_ids {
                if let Some(word) = words.find_frontier(id)? {
                    cluster.push(word);
                }
            }

            if cluster.len() < 2 {
                review.remove(ReviewListKind::Graylist, Some(&scope.user_id), &entry.word_ids)?;
                pruned += 1;
            } else if clusters.len() < max_lists {
                clusters.push(cluster);
            }
        }
        tx.commit()?;

        if pruned > 0 {
            debug!(project = %scope.project_id, user = %scope.user_id, pruned, "pruned stale graylist entries");
        }
        Ok(clusters)
    }

    pub fn has_graylist_entries(&self, scope: &Scope) -> Result<bool> {
        let conn = self.pool.get_connection()?;
        let words = SqliteWordRepository::new(&conn, &scope.project_id);
        let review = SqliteReviewRepository::new(&conn, &scope.project_id);

        for entry in review.list(ReviewListKind::Graylist, Some(&scope.user_id))? {
            let mut live = 0;
            for id in &entry.word_ids {
                if words.find_frontier(id)?.is_some() {
                    live += 1;
                }
            }
            if live >= 2 {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn check_vernacular(word: &Word) -> Result<()> {
    if word.vernacular.trim().is_empty() {
        return Err(LexiconError::ValidationError(
            "vernacular must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn review_set(ids: &[WordId]) -> Result<Vec<WordId>> {
    let ids = sorted_ids(ids.iter().cloned());
    if ids.len() < 2 {
        return Err(LexiconError::ValidationError(
            "a review list entry needs at least two distinct words".to_string(),
        ));
    }
    Ok(ids)
}
