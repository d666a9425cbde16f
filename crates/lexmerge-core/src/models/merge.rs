use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Word, WordId, sorted_ids};
use crate::error::{LexiconError, Result};

/// One word folded into (or deleted alongside) a merge parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSource {
    pub src_word_id: WordId,

    /// Append this word's audio to the parent.
    #[serde(default)]
    pub audio: bool,
}

impl MergeSource {
    pub fn new(src_word_id: impl Into<WordId>, audio: bool) -> Self {
        Self {
            src_word_id: src_word_id.into(),
            audio,
        }
    }
}

/// A single atomic merge or deletion.
///
/// For a regular unit `parent` already carries the merged senses and fields;
/// the children are retired into its history. For `delete_only` units the
/// parent is ignored and the children are simply removed from the frontier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeUnit {
    pub parent: Word,
    pub children: Vec<MergeSource>,
    #[serde(default)]
    pub delete_only: bool,
}

impl MergeUnit {
    pub fn merge(parent: Word, children: Vec<MergeSource>) -> Self {
        Self {
            parent,
            children,
            delete_only: false,
        }
    }

    pub fn delete_only(children: Vec<MergeSource>) -> Self {
        Self {
            parent: Word::new(String::new()),
            children,
            delete_only: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.children.is_empty() {
            return Err(LexiconError::ValidationError(
                "merge unit has no children".to_string(),
            ));
        }
        if !self.delete_only && self.parent.vernacular.trim().is_empty() {
            return Err(LexiconError::ValidationError(
                "merge parent has an empty vernacular".to_string(),
            ));
        }

        let ids = self.child_ids();
        if ids.len() != self.children.len() {
            return Err(LexiconError::ValidationError(
                "merge unit lists the same child twice".to_string(),
            ));
        }
        if ids.iter().any(String::is_empty) {
            return Err(LexiconError::ValidationError(
                "merge child has an empty id".to_string(),
            ));
        }
        Ok(())
    }

    /// Sorted, de-duplicated child ids.
    pub fn child_ids(&self) -> Vec<WordId> {
        sorted_ids(self.children.iter().map(|c| c.src_word_id.clone()))
    }
}

/// Durable audit of one executed merge unit, sufficient to undo it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeRecord {
    pub id: Uuid,
    pub project_id: String,
    pub user_id: String,
    /// Ids that survived the merge. Empty for delete-only units.
    pub parent_ids: Vec<WordId>,
    /// The unit's child ids, sorted.
    pub child_ids: Vec<WordId>,
    /// Verbatim pre-merge records of every retired id, including a parent
    /// version that was in the frontier.
    pub snapshots: Vec<Word>,
    pub created_at: DateTime<Utc>,
    pub undone: bool,
}

impl MergeRecord {
    pub fn new(
        project_id: &str,
        user_id: &str,
        parent_ids: Vec<WordId>,
        child_ids: Vec<WordId>,
        snapshots: Vec<Word>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            project_id: project_id.to_string(),
            user_id: user_id.to_string(),
            parent_ids: sorted_ids(parent_ids),
            child_ids: sorted_ids(child_ids),
            snapshots,
            created_at: Utc::now(),
            undone: false,
        }
    }
}
