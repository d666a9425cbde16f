use std::sync::Arc;

use lexmerge_core::{Database, MergeUnit, Scope, Word, WordId};
use tracing::{info, warn};

use crate::backend::on_blocking_pool;
use crate::defunct::{DefunctTracker, QueuedEdit};
use crate::error::Result;

/// Outcome of a merge batch.
#[derive(Debug)]
pub struct MergeReport {
    /// One entry per unit: the surviving id, `None` for delete-only units.
    pub results: Vec<Result<Option<WordId>>>,
    /// Edits queued against retired ids while their unit ran.
    pub follow_ups: Vec<QueuedEdit<Word>>,
}

/// Executes merge units one at a time. Each unit is atomic; the batch is not.
pub struct MergeOrchestrator {
    db: Arc<Database>,
    defunct: Arc<DefunctTracker<Word>>,
}

impl MergeOrchestrator {
    pub fn new(db: Arc<Database>, defunct: Arc<DefunctTracker<Word>>) -> Self {
        Self { db, defunct }
    }

    pub async fn merge_words(&self, scope: &Scope, units: Vec<MergeUnit>) -> MergeReport {
        let mut report = MergeReport {
            results: Vec::with_capacity(units.len()),
            follow_ups: Vec::new(),
        };

        for (idx, unit) in units.into_iter().enumerate() {
            let result = self.merge_unit(scope, unit, &mut report.follow_ups).await;
            if let Err(err) = &result {
                warn!(project = %scope.project_id, unit = idx, error = %err, "merge unit failed");
            }
            report.results.push(result);
        }

        let merged = report.results.iter().filter(|r| r.is_ok()).count();
        info!(
            project = %scope.project_id,
            user = %scope.user_id,
            units = report.results.len(),
            merged,
            "merge batch finished"
        );
        report
    }

    async fn merge_unit(
        &self,
        scope: &Scope,
        unit: MergeUnit,
        follow_ups: &mut Vec<QueuedEdit<Word>>,
    ) -> Result<Option<WordId>> {
        unit.validate()?;

        let retiring = retiring_ids(&unit);
        self.defunct.mark_all(&retiring)?;

        let call_scope = scope.clone();
        let outcome = on_blocking_pool(&self.db, move |db| db.merge_unit(&call_scope, &unit)).await;

        match &outcome {
            Ok(Some(parent_id)) => {
                for id in &retiring {
                    follow_ups.extend(self.defunct.resolve(id, parent_id)?);
                }
            }
            Ok(None) | Err(_) => follow_ups.extend(self.defunct.release_all(&retiring)?),
        }
        outcome
    }

    pub async fn undo_merge(
        &self,
        scope: &Scope,
        parent_ids: &[WordId],
        child_ids: &[WordId],
    ) -> Result<Vec<QueuedEdit<Word>>> {
        self.defunct.mark_all(parent_ids)?;

        let call_scope = scope.clone();
        let parents = parent_ids.to_vec();
        let children = child_ids.to_vec();
        let outcome = on_blocking_pool(&self.db, move |db| {
            db.undo_merge(&call_scope, &parents, &children)
        })
        .await;

        let released = self.defunct.release_all(parent_ids)?;
        outcome.map(|()| released)
    }
}

/// Every id a unit takes out of the frontier: its children, plus the
/// parent's previous id for a regular merge.
fn retiring_ids(unit: &MergeUnit) -> Vec<WordId> {
    let mut ids = unit.child_ids();
    let parent = &unit.parent.id;
    if !unit.delete_only && !parent.is_empty() && !ids.contains(parent) {
        ids.push(parent.clone());
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EngineError, ErrorKind};
    use lexmerge_core::{MergeSource, Pronunciation, Sense};

    fn setup() -> (Arc<Database>, MergeOrchestrator, Scope) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let orchestrator = MergeOrchestrator::new(Arc::clone(&db), Arc::new(DefunctTracker::new()));
        (db, orchestrator, Scope::new("p1", "u1"))
    }

    fn add(db: &Database, scope: &Scope, vernacular: &str) -> Word {
        let word = Word::new(vernacular).with_sense(Sense::new().with_gloss("en", vernacular));
        db.create_word(scope, word).unwrap()
    }

    #[tokio::test]
    async fn batch_reports_each_unit_independently() {
        let (db, orchestrator, scope) = setup();
        let a = add(&db, &scope, "test");
        let b = add(&db, &scope, "tost");

        let units = vec![
            MergeUnit::merge(
                a.clone(),
                vec![
                    MergeSource::new(a.id.clone(), false),
                    MergeSource::new(b.id.clone(), false),
                ],
            ),
            MergeUnit::merge(Word::new("x"), vec![]),
            MergeUnit::merge(a.clone(), vec![MergeSource::new(b.id.clone(), false)]),
        ];
        let report = orchestrator.merge_words(&scope, units).await;

        assert_eq!(report.results.len(), 3);
        assert!(matches!(report.results[0], Ok(Some(_))));
        assert!(matches!(report.results[1], Err(EngineError::Validation(_))));
        assert_eq!(
            report.results[2].as_ref().unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(db.count_frontier("p1").unwrap(), 1);
    }

    #[tokio::test]
    async fn audio_child_adds_pronunciations() {
        let (db, orchestrator, scope) = setup();
        let mut parent = Word::new("test").with_sense(Sense::new().with_gloss("en", "x"));
        parent.audio.push(Pronunciation::new("a.wav"));
        let parent = db.create_word(&scope, parent).unwrap();

        let mut child = Word::new("tset").with_sense(Sense::new().with_gloss("en", "x"));
        child.audio.push(Pronunciation::new("b.wav"));
        child.audio.push(Pronunciation::new("c.wav"));
        let child = db.create_word(&scope, child).unwrap();

        let unit = MergeUnit::merge(parent.clone(), vec![MergeSource::new(child.id.clone(), true)]);
        let report = orchestrator.merge_words(&scope, vec![unit]).await;
        let new_id = report.results[0].as_ref().unwrap().clone().unwrap();

        let merged = db.frontier_word("p1", &new_id).unwrap().unwrap();
        assert_eq!(merged.audio.len(), parent.audio.len() + child.audio.len());
        assert!(db.frontier_word("p1", &child.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn in_flight_ids_are_rejected() {
        let (db, orchestrator, scope) = setup();
        let a = add(&db, &scope, "a");
        let b = add(&db, &scope, "b");

        orchestrator.defunct.mark(&b.id).unwrap();
        let unit = MergeUnit::merge(a.clone(), vec![MergeSource::new(b.id.clone(), false)]);
        let report = orchestrator.merge_words(&scope, vec![unit]).await;

        assert!(matches!(report.results[0], Err(EngineError::Conflict(_))));
        assert_eq!(db.count_frontier("p1").unwrap(), 2);
        assert!(!orchestrator.defunct.is_defunct(&a.id).unwrap());
    }

    #[tokio::test]
    async fn undo_restores_children() {
        let (db, orchestrator, scope) = setup();
        let a = add(&db, &scope, "test");
        let b = add(&db, &scope, "tost");

        let unit = MergeUnit::merge(a.clone(), vec![MergeSource::new(b.id.clone(), false)]);
        let report = orchestrator.merge_words(&scope, vec![unit]).await;
        let new_id = report.results[0].as_ref().unwrap().clone().unwrap();

        orchestrator
            .undo_merge(&scope, &[new_id.clone()], &[b.id.clone()])
            .await
            .unwrap();
        assert_eq!(db.frontier_word("p1", &b.id).unwrap(), Some(b.clone()));
        assert_eq!(db.frontier_word("p1", &a.id).unwrap(), Some(a));

        let again = orchestrator.undo_merge(&scope, &[new_id], &[b.id]).await;
        assert!(matches!(again, Err(EngineError::MergeRecordNotFound { .. })));
    }

    #[test]
    fn retiring_ids_include_previous_parent() {
        let parent = Word::new("a");
        let unit = MergeUnit::merge(parent.clone(), vec![MergeSource::new("c", false)]);
        let ids = retiring_ids(&unit);
        assert!(ids.contains(&parent.id));
        assert!(ids.contains(&"c".to_string()));

        let delete = MergeUnit::delete_only(vec![MergeSource::new("c", false)]);
        assert_eq!(retiring_ids(&delete), vec!["c".to_string()]);
    }
}
