use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use lexmerge_core::{LexiconError, Scope, Word};

use crate::error::{EngineError, Result};

#[derive(Debug, Clone)]
enum JobState {
    Running,
    Done(Vec<Vec<Word>>),
}

/// Latest bulk duplicate search per project and user.
#[derive(Debug, Default)]
pub struct DedupJobs {
    states: Mutex<HashMap<Scope, JobState>>,
}

impl DedupJobs {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Scope, JobState>>> {
        self.states
            .lock()
            .map_err(|_| EngineError::Storage(LexiconError::LockPoisoned))
    }

    /// Returns false if a search for `scope` is already running.
    pub fn start(&self, scope: &Scope) -> Result<bool> {
        let mut states = self.lock()?;
        if matches!(states.get(scope), Some(JobState::Running)) {
            return Ok(false);
        }
        states.insert(scope.clone(), JobState::Running);
        Ok(true)
    }

    pub fn finish(&self, scope: &Scope, clusters: Vec<Vec<Word>>) -> Result<()> {
        self.lock()?.insert(scope.clone(), JobState::Done(clusters));
        Ok(())
    }

    /// Drop a failed search. The previous result is already gone.
    pub fn fail(&self, scope: &Scope) -> Result<()> {
        self.lock()?.remove(scope);
        Ok(())
    }

    pub fn is_running(&self, scope: &Scope) -> Result<bool> {
        Ok(matches!(self.lock()?.get(scope), Some(JobState::Running)))
    }

    /// The finished result, or `None` while running or before any search.
    pub fn latest(&self, scope: &Scope) -> Result<Option<Vec<Vec<Word>>>> {
        Ok(match self.lock()?.get(scope) {
            Some(JobState::Done(clusters)) => Some(clusters.clone()),
            _ => None,
        })
    }
}
