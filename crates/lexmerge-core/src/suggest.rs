//! Live duplicate suggestions against the in-memory frontier.
//!
//! Everything here is synchronous and allocation-light so it can run on
//! every keystroke; debouncing is the caller's business.

use crate::config::SuggestConfig;
use crate::models::{Word, WordId};
use crate::similarity::distance;

pub const DEFAULT_MAX_COUNT: usize = 5;
pub const DEFAULT_THRESHOLD: usize = 2;
pub const DEFAULT_GENERAL_THRESHOLD: usize = 3;

/// Finds frontier words whose vernacular is within `threshold` edits of
/// the text being typed.
#[derive(Debug, Clone)]
pub struct DuplicateSuggester {
    max_count: usize,
    threshold: usize,
}

impl Default for DuplicateSuggester {
    fn default() -> Self {
        Self {
            max_count: DEFAULT_MAX_COUNT,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl DuplicateSuggester {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &SuggestConfig) -> Self {
        Self {
            max_count: config.max_count,
            threshold: config.threshold,
        }
    }

    pub fn with_max_count(mut self, max_count: usize) -> Self {
        self.max_count = max_count;
        self
    }

    /// Matches must be strictly closer than `threshold`.
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    /// Ids of the closest frontier words, nearest first. Ties keep frontier
    /// order. `exclude` is the entry being edited, so it never matches itself.
    pub fn duplicates_from_frontier(
        &self,
        frontier: &[Word],
        text: &str,
        exclude: Option<&str>,
    ) -> Vec<WordId> {
        let mut scored: Vec<(usize, &Word)> = frontier
            .iter()
            .filter(|word| word.has_active_sense())
            .filter(|word| exclude != Some(word.id.as_str()))
            .map(|word| (distance(text, &word.vernacular), word))
            .filter(|(score, _)| *score < self.threshold)
            .collect();

        scored.sort_by_key(|(score, _)| *score);
        scored
            .into_iter()
            .take(self.max_count)
            .map(|(_, word)| word.id.clone())
            .collect()
    }
}

/// [`DuplicateSuggester`] with the default threshold.
pub fn duplicates_from_frontier(
    frontier: &[Word],
    text: &str,
    exclude: Option<&str>,
    max_count: usize,
) -> Vec<WordId> {
    DuplicateSuggester::new()
        .with_max_count(max_count)
        .duplicates_from_frontier(frontier, text, exclude)
}

/// General-purpose suggester for glosses and spellings: prefix matches
/// first, shortest first, then the nearest remaining strings by edit
/// distance.
#[derive(Debug, Clone)]
pub struct StringSuggester {
    max_count: usize,
    threshold: usize,
}

impl Default for StringSuggester {
    fn default() -> Self {
        Self {
            max_count: DEFAULT_MAX_COUNT,
            threshold: DEFAULT_GENERAL_THRESHOLD,
        }
    }
}

impl StringSuggester {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &SuggestConfig) -> Self {
        Self {
            max_count: config.max_count,
            threshold: config.general_threshold,
        }
    }

    pub fn with_max_count(mut self, max_count: usize) -> Self {
        self.max_count = max_count;
        self
    }

    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn suggest<S: AsRef<str>>(&self, text: &str, candidates: &[S]) -> Vec<String> {
        if text.is_empty() || self.max_count == 0 {
            return Vec::new();
        }

        let mut chosen: Vec<&str> = Vec::new();

        let mut prefixed: Vec<&str> = candidates
            .iter()
            .map(AsRef::as_ref)
            .filter(|candidate| candidate.starts_with(text))
            .collect();
        prefixed.sort_by_key(|candidate| candidate.chars().count());
        for candidate in prefixed {
            if chosen.len() == self.max_count {
                break;
            }
            if !chosen.contains(&candidate) {
                chosen.push(candidate);
            }
        }

        if chosen.len() < self.max_count {
            let mut near: Vec<(usize, &str)> = candidates
                .iter()
                .map(AsRef::as_ref)
                .filter(|candidate| !chosen.contains(candidate))
                .map(|candidate| (distance(text, candidate), candidate))
                .filter(|(score, _)| *score < self.threshold)
                .collect();
            near.sort_by_key(|(score, _)| *score);
            for (_, candidate) in near {
                if chosen.len() == self.max_count {
                    break;
                }
                if !chosen.contains(&candidate) {
                    chosen.push(candidate);
                }
            }
        }

        chosen.into_iter().map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Accessibility, Sense};

    fn word(id: &str, vernacular: &str) -> Word {
        let mut word = Word::new(vernacular).with_sense(Sense::new().with_gloss("en", "gloss"));
        word.id = id.to_string();
        word
    }

    #[test]
    fn test_empty_frontier_yields_nothing() {
        for n in [0, 1, 5, 100] {
            assert!(duplicates_from_frontier(&[], "x", None, n).is_empty());
        }
    }

    #[test]
    fn test_exact_match_and_exclusion() {
        let frontier = vec![word("1234567890", "test")];
        assert_eq!(
            duplicates_from_frontier(&frontier, "test", None, 5),
            vec!["1234567890".to_string()]
        );
        assert!(duplicates_from_frontier(&frontier, "test", Some("1234567890"), 5).is_empty());
    }

    #[test]
    fn test_sorted_by_distance_then_frontier_order() {
        let frontier = vec![
            word("a", "tosts"),
            word("b", "tost"),
            word("c", "test"),
            word("d", "tast"),
            word("e", "zzzz"),
        ];
        let ids = DuplicateSuggester::new()
            .with_threshold(3)
            .duplicates_from_frontier(&frontier, "test", None);
        assert_eq!(ids, vec!["c", "b", "d", "a"]);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let frontier = vec![word("a", "tast"), word("b", "taat")];
        let ids = duplicates_from_frontier(&frontier, "test", None, 5);
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn test_truncates_to_max_count() {
        let frontier: Vec<Word> = (0..10).map(|i| word(&i.to_string(), "test")).collect();
        assert_eq!(duplicates_from_frontier(&frontier, "test", None, 3).len(), 3);
    }

    #[test]
    fn test_skips_words_without_active_sense() {
        let mut deleted = word("gone", "test");
        deleted.senses[0].accessibility = Accessibility::Deleted;
        let bare = {
            let mut w = Word::new("test");
            w.id = "bare".to_string();
            w
        };
        let frontier = vec![deleted, bare, word("live", "test")];
        assert_eq!(duplicates_from_frontier(&frontier, "test", None, 5), vec!["live"]);
    }

    #[test]
    fn test_string_suggester_prefers_prefix_by_length() {
        let candidates = ["bookshelf", "book", "books", "boot", "cook", "rook"];
        let got = StringSuggester::new().suggest("boo", &candidates);
        assert_eq!(got, vec!["book", "boot", "books", "bookshelf", "cook"]);
    }

    #[test]
    fn test_string_suggester_fills_with_near_matches() {
        let candidates = ["dog", "dig", "dug", "cat", "dogs"];
        let got = StringSuggester::new().with_max_count(3).suggest("dog", &candidates);
        assert_eq!(got, vec!["dog", "dogs", "dig"]);
    }

    #[test]
    fn test_string_suggester_empty_query() {
        assert!(StringSuggester::new().suggest("", &["a", "b"]).is_empty());
    }

    #[test]
    fn test_suggesters_follow_config() {
        let config = SuggestConfig {
            max_count: 1,
            threshold: 2,
            general_threshold: 2,
        };
        let got = StringSuggester::from_config(&config).suggest("dog", &["cat", "dig", "dug"]);
        assert_eq!(got, vec!["dig"]);

        let frontier = vec![word("a", "tost"), word("b", "test")];
        let ids = DuplicateSuggester::from_config(&config).duplicates_from_frontier(&frontier, "test", None);
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn test_string_suggester_no_repeats() {
        let candidates = ["walk", "walk", "wall"];
        let got = StringSuggester::new().suggest("wal", &candidates);
        assert_eq!(got, vec!["walk", "wall"]);
    }
}
