use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accessibility {
    #[default]
    Active,
    Deleted,
    Duplicate,
    Protected,
}

impl std::fmt::Display for Accessibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Deleted => write!(f, "deleted"),
            Self::Duplicate => write!(f, "duplicate"),
            Self::Protected => write!(f, "protected"),
        }
    }
}

impl std::str::FromStr for Accessibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "deleted" => Ok(Self::Deleted),
            "duplicate" => Ok(Self::Duplicate),
            "protected" => Ok(Self::Protected),
            _ => Err(format!("Invalid Accessibility: {s}")),
        }
    }
}

/// A semantic-domain tag. Identity is `id` ("2.1.1"); `user_id` and
/// `created` record who attached it to a sense and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticDomain {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub lang: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl SemanticDomain {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            lang: String::new(),
            user_id: None,
            created: None,
        }
    }

    /// Copy of this domain stamped with the contributing user and time.
    pub fn stamped(&self, user_id: &str, at: DateTime<Utc>) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            created: Some(at),
            ..self.clone()
        }
    }
}

/// One gloss+domain grouping within a word.
///
/// `glosses` maps analysis-language code to gloss text, so a sense can
/// never carry two glosses in the same language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sense {
    pub guid: Uuid,

    #[serde(default)]
    pub glosses: BTreeMap<String, String>,

    #[serde(default)]
    pub semantic_domains: Vec<SemanticDomain>,

    #[serde(default)]
    pub accessibility: Accessibility,
}

impl Sense {
    pub fn new() -> Self {
        Self {
            guid: Uuid::new_v4(),
            glosses: BTreeMap::new(),
            semantic_domains: Vec::new(),
            accessibility: Accessibility::Active,
        }
    }

    pub fn with_gloss(mut self, language: impl Into<String>, text: impl Into<String>) -> Self {
        self.glosses.insert(language.into(), text.into());
        self
    }

    pub fn with_domain(mut self, domain: SemanticDomain) -> Self {
        if !self.has_domain(&domain.id) {
            self.semantic_domains.push(domain);
        }
        self
    }

    pub fn gloss(&self, language: &str) -> Option<&str> {
        self.glosses.get(language).map(String::as_str)
    }

    pub fn has_domain(&self, domain_id: &str) -> bool {
        self.semantic_domains.iter().any(|d| d.id == domain_id)
    }

    pub fn is_active(&self) -> bool {
        self.accessibility == Accessibility::Active
    }
}

impl Default for Sense {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessibility_roundtrip() {
        for status in [
            Accessibility::Active,
            Accessibility::Deleted,
            Accessibility::Duplicate,
            Accessibility::Protected,
        ] {
            assert_eq!(status.to_string().parse::<Accessibility>().unwrap(), status);
        }
        assert!("gone".parse::<Accessibility>().is_err());
    }

    #[test]
    fn test_one_gloss_per_language() {
        let sense = Sense::new().with_gloss("en", "dog").with_gloss("en", "hound");
        assert_eq!(sense.glosses.len(), 1);
        assert_eq!(sense.gloss("en"), Some("hound"));
    }

    #[test]
    fn test_with_domain_skips_existing_id() {
        let sense = Sense::new()
            .with_domain(SemanticDomain::new("1.6", "Animal"))
            .with_domain(SemanticDomain::new("1.6", "Animal"));
        assert_eq!(sense.semantic_domains.len(), 1);
    }
}
