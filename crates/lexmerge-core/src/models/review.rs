use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::WordId;

/// Project and acting user, threaded explicitly through every call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub project_id: String,
    pub user_id: String,
}

impl Scope {
    pub fn new(project_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            user_id: user_id.into(),
        }
    }
}

/// Which review list a cluster was filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewListKind {
    /// Judged "not duplicates". Never proposed again.
    Blacklist,
    /// Judged "duplicates, but not now". Offered again on request.
    Graylist,
}

impl std::fmt::Display for ReviewListKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blacklist => write!(f, "blacklist"),
            Self::Graylist => write!(f, "graylist"),
        }
    }
}

impl std::str::FromStr for ReviewListKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blacklist" => Ok(Self::Blacklist),
            "graylist" => Ok(Self::Graylist),
            _ => Err(format!("Invalid ReviewListKind: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewEntry {
    pub kind: ReviewListKind,
    pub project_id: String,
    /// Graylist entries belong to the user who deferred them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Sorted, de-duplicated.
    pub word_ids: Vec<WordId>,
    pub created_at: DateTime<Utc>,
}

/// Canonical form of an id set: sorted and de-duplicated.
pub fn sorted_ids<I>(ids: I) -> Vec<WordId>
where
    I: IntoIterator<Item = WordId>,
{
    let mut ids: Vec<WordId> = ids.into_iter().collect();
    ids.sort();
    ids.dedup();
    ids
}
