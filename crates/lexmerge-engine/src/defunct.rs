use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use lexmerge_core::{LexiconError, WordId};

use crate::error::{EngineError, Result};

/// An edit queued against a word while a mutation on it was in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedEdit<E> {
    pub word_id: WordId,
    pub edit: E,
}

/// Tracks word ids that have a mutation in flight.
///
/// A mutation marks every id it will retire. Until the mutation settles a
/// second mutation on any of those ids fails with `Conflict`, while plain
/// edits may be queued. Settling hands the queued edits back, addressed to
/// the successor id when there is one.
#[derive(Debug)]
pub struct DefunctTracker<E> {
    entries: Mutex<HashMap<WordId, Vec<E>>>,
}

impl<E> Default for DefunctTracker<E> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<E> DefunctTracker<E> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<WordId, Vec<E>>>> {
        self.entries
            .lock()
            .map_err(|_| EngineError::Storage(LexiconError::LockPoisoned))
    }

    /// Mark all `ids` or none of them.
    pub fn mark_all(&self, ids: &[WordId]) -> Result<()> {
        let mut entries = self.lock()?;
        if let Some(busy) = ids.iter().find(|id| entries.contains_key(*id)) {
            return Err(EngineError::Conflict(format!(
                "word {busy} is already being modified"
            )));
        }
        for id in ids {
            entries.insert(id.clone(), Vec::new());
        }
        Ok(())
    }

    pub fn mark(&self, id: &str) -> Result<()> {
        self.mark_all(&[id.to_string()])
    }

    pub fn is_defunct(&self, id: &str) -> Result<bool> {
        Ok(self.lock()?.contains_key(id))
    }

    /// Hold `edit` until the in-flight mutation on `id` settles. Fails with
    /// `NotFound` when nothing is in flight; apply the edit directly then.
    pub fn queue(&self, id: &str, edit: E) -> Result<()> {
        let mut entries = self.lock()?;
        match entries.get_mut(id) {
            Some(pending) => {
                pending.push(edit);
                Ok(())
            }
            None => Err(EngineError::NotFound(format!(
                "no mutation in flight for word {id}"
            ))),
        }
    }

    /// The mutation on `id` succeeded and `successor` replaced it.
    pub fn resolve(&self, id: &str, successor: &str) -> Result<Vec<QueuedEdit<E>>> {
        let pending = self.lock()?.remove(id).unwrap_or_default();
        Ok(addressed(successor, pending))
    }

    /// The mutation on `id` failed or left no successor. Queued edits stay
    /// addressed to `id`.
    pub fn release(&self, id: &str) -> Result<Vec<QueuedEdit<E>>> {
        let pending = self.lock()?.remove(id).unwrap_or_default();
        Ok(addressed(id, pending))
    }

    pub fn release_all(&self, ids: &[WordId]) -> Result<Vec<QueuedEdit<E>>> {
        let mut released = Vec::new();
        for id in ids {
            released.extend(self.release(id)?);
        }
        Ok(released)
    }

    pub fn in_flight(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }
}

fn addressed<E>(id: &str, pending: Vec<E>) -> Vec<QueuedEdit<E>> {
    pending
        .into_iter()
        .map(|edit| QueuedEdit {
            word_id: id.to_string(),
            edit,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn second_mutation_on_same_id_conflicts() {
        let tracker: DefunctTracker<String> = DefunctTracker::new();
        tracker.mark("w1").unwrap();

        let err = tracker.mark("w1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(tracker.mark("w2").is_ok());
    }

    #[test]
    fn mark_all_is_all_or_nothing() {
        let tracker: DefunctTracker<String> = DefunctTracker::new();
        tracker.mark("b").unwrap();

        let ids = vec!["a".to_string(), "b".to_string()];
        assert!(tracker.mark_all(&ids).is_err());
        assert!(!tracker.is_defunct("a").unwrap());
        assert_eq!(tracker.in_flight().unwrap(), 1);
    }

    #[test]
    fn queued_edits_follow_the_successor() {
        let tracker = DefunctTracker::new();
        tracker.mark("old").unwrap();
        tracker.queue("old", "fix gloss".to_string()).unwrap();
        tracker.queue("old", "add domain".to_string()).unwrap();

        let edits = tracker.resolve("old", "new").unwrap();
        assert_eq!(edits.len(), 2);
        assert!(edits.iter().all(|e| e.word_id == "new"));
        assert_eq!(edits[0].edit, "fix gloss");
        assert!(!tracker.is_defunct("old").unwrap());
    }

    #[test]
    fn queue_without_mutation_is_not_found() {
        let tracker = DefunctTracker::new();
        let err = tracker.queue("w1", 1u32).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn release_keeps_original_address() {
        let tracker = DefunctTracker::new();
        tracker.mark("w1").unwrap();
        tracker.queue("w1", 7u32).unwrap();

        let edits = tracker.release("w1").unwrap();
        assert_eq!(edits, vec![QueuedEdit { word_id: "w1".to_string(), edit: 7 }]);
        assert!(tracker.mark("w1").is_ok());
    }
}
