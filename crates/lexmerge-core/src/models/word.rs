use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Accessibility, Sense};

pub type WordId = String;

/// Generate a fresh word id.
pub fn new_word_id() -> WordId {
    Uuid::now_v7().to_string()
}

/// A reference to an uploaded pronunciation recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pronunciation {
    pub file_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_id: Option<String>,

    #[serde(default)]
    pub protected: bool,
}

impl Pronunciation {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            speaker_id: None,
            protected: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub language: String,
    pub text: String,
}

/// A lexicon entry.
///
/// `id` names one version of the entry; every update produces a new id and
/// pushes the old one onto `history`. `guid` stays the same across versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub id: WordId,
    pub guid: Uuid,
    pub vernacular: String,

    #[serde(default)]
    pub senses: Vec<Sense>,

    #[serde(default)]
    pub audio: Vec<Pronunciation>,

    #[serde(default)]
    pub history: Vec<WordId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<Note>,

    #[serde(default)]
    pub accessibility: Accessibility,

    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Word {
    pub fn new(vernacular: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_word_id(),
            guid: Uuid::new_v4(),
            vernacular: vernacular.into(),
            senses: Vec::new(),
            audio: Vec::new(),
            history: Vec::new(),
            note: None,
            accessibility: Accessibility::Active,
            created: now,
            modified: now,
        }
    }

    pub fn with_sense(mut self, sense: Sense) -> Self {
        self.senses.push(sense);
        self
    }

    pub fn touch(&mut self) {
        self.modified = Utc::now();
    }

    pub fn has_active_sense(&self) -> bool {
        self.senses.iter().any(Sense::is_active)
    }

    /// Push `id` onto history unless it is already recorded.
    pub fn record_ancestor(&mut self, id: &str) {
        if !self.history.iter().any(|h| h == id) {
            self.history.push(id.to_string());
        }
    }
}
