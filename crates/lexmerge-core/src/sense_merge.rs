//! Pure operations that fold glosses and semantic domains into a word.
//!
//! Every function takes the word by reference and returns a new one; the
//! input is never touched. None of them drop a gloss, a domain or audio.

use chrono::Utc;
use uuid::Uuid;

use crate::error::{LexiconError, Result};
use crate::models::{SemanticDomain, Sense, Word};

/// Append a new active sense carrying one gloss and one domain.
pub fn add_sense(domain: &SemanticDomain, word: &Word, gloss_text: &str, language: &str) -> Word {
    let mut updated = word.clone();
    updated.senses.push(
        Sense::new()
            .with_gloss(language, gloss_text)
            .with_domain(domain.clone()),
    );
    updated
}

/// Tag a sense with a domain, stamped with `user_id` and the current time.
/// Tagging with a domain id the sense already has returns the word as is.
pub fn add_domain_to_sense(
    domain: &SemanticDomain,
    word: &Word,
    sense_guid: &Uuid,
    user_id: &str,
) -> Result<Word> {
    let idx = sense_index(word, sense_guid)?;
    if word.senses[idx].has_domain(&domain.id) {
        return Ok(word.clone());
    }

    let mut updated = word.clone();
    updated.senses[idx]
        .semantic_domains
        .push(domain.stamped(user_id, Utc::now()));
    Ok(updated)
}

/// Change the gloss shown under `domain_id` without changing what the
/// sense's other domains describe.
///
/// If `domain_id` is the only domain on the sense the gloss is updated in
/// place. Otherwise the sense keeps its guid, its old gloss and the other
/// domains, and a new sense holding just `domain_id` and `new_gloss` is
/// inserted right after it.
pub fn split_sense_on_gloss_change(
    word: &Word,
    sense_guid: &Uuid,
    new_gloss: &str,
    domain_id: &str,
    language: &str,
) -> Result<Word> {
    let idx = sense_index(word, sense_guid)?;
    let sense = &word.senses[idx];

    let edited = sense
        .semantic_domains
        .iter()
        .find(|d| d.id == domain_id)
        .cloned();
    let remaining: Vec<SemanticDomain> = sense
        .semantic_domains
        .iter()
        .filter(|d| d.id != domain_id)
        .cloned()
        .collect();

    let mut updated = word.clone();
    if remaining.is_empty() {
        updated.senses[idx]
            .glosses
            .insert(language.to_string(), new_gloss.to_string());
        return Ok(updated);
    }

    let Some(edited) = edited else {
        return Err(LexiconError::ValidationError(format!(
            "sense {sense_guid} does not carry domain {domain_id}"
        )));
    };

    updated.senses[idx].semantic_domains = remaining;
    updated.senses.insert(
        idx + 1,
        Sense::new()
            .with_gloss(language, new_gloss)
            .with_domain(edited),
    );
    Ok(updated)
}

/// Fold every active sense of `incoming` into `target`.
///
/// A sense whose glosses agree with an active sense of `target` contributes
/// its missing glosses and domains to that sense; any other sense is
/// appended. Inactive incoming senses are left out. Audio is appended
/// unless the identical recording is already there.
pub fn merge_senses_into(target: &Word, incoming: &Word) -> Word {
    let mut merged = target.clone();

    for sense in incoming.senses.iter().filter(|s| s.is_active()) {
        match merged
            .senses
            .iter()
            .position(|existing| existing.is_active() && glosses_agree(existing, sense))
        {
            Some(idx) => {
                let existing = &mut merged.senses[idx];
                for (language, text) in &sense.glosses {
                    existing
                        .glosses
                        .entry(language.clone())
                        .or_insert_with(|| text.clone());
                }
                for domain in &sense.semantic_domains {
                    if !existing.has_domain(&domain.id) {
                        existing.semantic_domains.push(domain.clone());
                    }
                }
            }
            None => {
                let mut appended = sense.clone();
                if merged.senses.iter().any(|s| s.guid == appended.guid) {
                    appended.guid = Uuid::new_v4();
                }
                merged.senses.push(appended);
            }
        }
    }

    for recording in &incoming.audio {
        if !merged.audio.contains(recording) {
            merged.audio.push(recording.clone());
        }
    }

    if merged.note.is_none() {
        merged.note = incoming.note.clone();
    }

    merged
}

/// True when `candidate` adds nothing `existing` does not already hold:
/// same vernacular, and every active sense of the candidate is covered by an
/// active sense of `existing` with agreeing glosses and a superset of its
/// domain ids.
pub fn is_duplicate_of(candidate: &Word, existing: &Word) -> bool {
    if candidate.vernacular != existing.vernacular {
        return false;
    }
    candidate
        .senses
        .iter()
        .filter(|s| s.is_active())
        .all(|sense| existing.senses.iter().any(|e| covers(e, sense)))
}

fn covers(existing: &Sense, sense: &Sense) -> bool {
    existing.is_active()
        && glosses_agree(existing, sense)
        && sense
            .semantic_domains
            .iter()
            .all(|domain| existing.has_domain(&domain.id))
}

/// Glosses agree when the senses share at least one language and every
/// shared language carries the same text.
fn glosses_agree(a: &Sense, b: &Sense) -> bool {
    let mut shared = 0usize;
    for (language, text) in &b.glosses {
        if let Some(other) = a.glosses.get(language) {
            if other != text {
                return false;
            }
            shared += 1;
        }
    }
    shared > 0
}

fn sense_index(word: &Word, sense_guid: &Uuid) -> Result<usize> {
    word.senses
        .iter()
        .position(|s| s.guid == *sense_guid)
        .ok_or_else(|| LexiconError::SenseNotFound(sense_guid.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Accessibility, Pronunciation};

    fn domain(id: &str) -> SemanticDomain {
        SemanticDomain::new(id, format!("domain {id}"))
    }

    #[test]
    fn test_add_sense_appends_active_sense() {
        let word = Word::new("mti");
        let updated = add_sense(&domain("1.5"), &word, "tree", "en");

        assert!(word.senses.is_empty(), "input must not change");
        assert_eq!(updated.senses.len(), 1);
        let sense = &updated.senses[0];
        assert_eq!(sense.gloss("en"), Some("tree"));
        assert_eq!(sense.semantic_domains, vec![domain("1.5")]);
        assert_eq!(sense.accessibility, Accessibility::Active);
    }

    #[test]
    fn test_add_sense_uses_fresh_guid() {
        let word = add_sense(&domain("1"), &Word::new("a"), "x", "en");
        let word = add_sense(&domain("1"), &word, "x", "en");
        assert_ne!(word.senses[0].guid, word.senses[1].guid);
    }

    #[test]
    fn test_add_domain_stamps_user() {
        let word = add_sense(&domain("1"), &Word::new("a"), "x", "en");
        let guid = word.senses[0].guid;

        let updated = add_domain_to_sense(&domain("2"), &word, &guid, "user-7").unwrap();
        let added = &updated.senses[0].semantic_domains[1];
        assert_eq!(added.id, "2");
        assert_eq!(added.user_id.as_deref(), Some("user-7"));
        assert!(added.created.is_some());
    }

    #[test]
    fn test_add_domain_is_idempotent() {
        let word = add_sense(&domain("1"), &Word::new("a"), "x", "en");
        let guid = word.senses[0].guid;

        let once = add_domain_to_sense(&domain("2"), &word, &guid, "u").unwrap();
        let twice = add_domain_to_sense(&domain("2"), &once, &guid, "u").unwrap();
        assert_eq!(once, twice);
        assert_eq!(twice.senses[0].semantic_domains.len(), 2);
    }

    #[test]
    fn test_add_domain_unknown_sense() {
        let word = Word::new("a");
        let err = add_domain_to_sense(&domain("2"), &word, &Uuid::new_v4(), "u").unwrap_err();
        assert!(matches!(err, LexiconError::SenseNotFound(_)));
    }

    #[test]
    fn test_split_two_domains() {
        let sense = Sense::new()
            .with_gloss("en", "old")
            .with_domain(domain("A"))
            .with_domain(domain("B"));
        let guid = sense.guid;
        let word = Word::new("w").with_sense(sense);

        let updated = split_sense_on_gloss_change(&word, &guid, "new", "A", "en").unwrap();

        assert_eq!(updated.senses.len(), 2);
        let kept = &updated.senses[0];
        assert_eq!(kept.guid, guid);
        assert_eq!(kept.gloss("en"), Some("old"));
        assert_eq!(kept.semantic_domains, vec![domain("B")]);

        let split = &updated.senses[1];
        assert_ne!(split.guid, guid);
        assert_eq!(split.gloss("en"), Some("new"));
        assert_eq!(split.semantic_domains, vec![domain("A")]);
    }

    #[test]
    fn test_split_single_domain_updates_in_place() {
        let sense = Sense::new().with_gloss("en", "old").with_domain(domain("A"));
        let guid = sense.guid;
        let word = Word::new("w").with_sense(sense);

        let updated = split_sense_on_gloss_change(&word, &guid, "new", "A", "en").unwrap();

        assert_eq!(updated.senses.len(), 1);
        assert_eq!(updated.senses[0].guid, guid);
        assert_eq!(updated.senses[0].gloss("en"), Some("new"));
        assert_eq!(updated.senses[0].semantic_domains, vec![domain("A")]);
        assert_eq!(word.senses[0].gloss("en"), Some("old"));
    }

    #[test]
    fn test_split_never_leaves_sense_without_domains() {
        let sense = Sense::new()
            .with_gloss("en", "old")
            .with_domain(domain("A"))
            .with_domain(domain("B"))
            .with_domain(domain("C"));
        let guid = sense.guid;
        let word = Word::new("w").with_sense(sense);

        let updated = split_sense_on_gloss_change(&word, &guid, "new", "B", "en").unwrap();
        assert!(updated.senses.iter().all(|s| !s.semantic_domains.is_empty()));
        assert_eq!(updated.senses[0].semantic_domains.len(), 2);
    }

    #[test]
    fn test_split_rejects_foreign_domain() {
        let sense = Sense::new()
            .with_gloss("en", "old")
            .with_domain(domain("A"))
            .with_domain(domain("B"));
        let guid = sense.guid;
        let word = Word::new("w").with_sense(sense);

        assert!(split_sense_on_gloss_change(&word, &guid, "new", "Z", "en").is_err());
    }

    #[test]
    fn test_merge_senses_unions_domains_of_agreeing_sense() {
        let target = Word::new("kitabu").with_sense(
            Sense::new().with_gloss("en", "book").with_domain(domain("3.5")),
        );
        let incoming = Word::new("kitabu").with_sense(
            Sense::new()
                .with_gloss("en", "book")
                .with_gloss("fr", "livre")
                .with_domain(domain("3.5"))
                .with_domain(domain("6.1")),
        );

        let merged = merge_senses_into(&target, &incoming);
        assert_eq!(merged.senses.len(), 1);
        assert_eq!(merged.senses[0].semantic_domains.len(), 2);
        assert_eq!(merged.senses[0].gloss("fr"), Some("livre"));
    }

    #[test]
    fn test_merge_senses_appends_distinct_sense_and_audio() {
        let mut target = Word::new("bank").with_sense(Sense::new().with_gloss("en", "river edge"));
        target.audio.push(Pronunciation::new("bank1.mp3"));
        let mut incoming = Word::new("bank").with_sense(Sense::new().with_gloss("en", "money house"));
        incoming.audio.push(Pronunciation::new("bank1.mp3"));
        incoming.audio.push(Pronunciation::new("bank2.mp3"));

        let merged = merge_senses_into(&target, &incoming);
        assert_eq!(merged.senses.len(), 2);
        assert_eq!(merged.audio.len(), 2);
        assert_eq!(merged.id, target.id);
    }

    #[test]
    fn test_merge_senses_renews_colliding_guid() {
        let target = Word::new("a").with_sense(Sense::new().with_gloss("en", "one"));
        let mut clash = Sense::new().with_gloss("en", "two");
        clash.guid = target.senses[0].guid;
        let incoming = Word::new("a").with_sense(clash);

        let merged = merge_senses_into(&target, &incoming);
        assert_eq!(merged.senses.len(), 2);
        assert_ne!(merged.senses[0].guid, merged.senses[1].guid);
    }

    #[test]
    fn test_is_duplicate_of() {
        let existing = Word::new("mbwa").with_sense(
            Sense::new()
                .with_gloss("en", "dog")
                .with_domain(domain("1.6"))
                .with_domain(domain("6.3")),
        );
        let same = Word::new("mbwa").with_sense(Sense::new().with_gloss("en", "dog").with_domain(domain("1.6")));
        let other_meaning = Word::new("mbwa").with_sense(Sense::new().with_gloss("en", "wolf"));
        let other_form = Word::new("mbwe").with_sense(Sense::new().with_gloss("en", "dog"));

        assert!(is_duplicate_of(&same, &existing));
        assert!(!is_duplicate_of(&other_meaning, &existing));
        assert!(!is_duplicate_of(&other_form, &existing));
    }

    #[test]
    fn test_is_duplicate_of_needs_domain_subset() {
        let existing = Word::new("mbwa").with_sense(Sense::new().with_gloss("en", "dog").with_domain(domain("1.6")));
        let extra_domain = Word::new("mbwa").with_sense(
            Sense::new()
                .with_gloss("en", "dog")
                .with_domain(domain("1.6"))
                .with_domain(domain("4.2")),
        );
        assert!(!is_duplicate_of(&extra_domain, &existing));
    }

    #[test]
    fn test_merge_senses_keeps_recordings_by_other_speakers() {
        let mut target = Word::new("mbwa");
        target.audio.push(Pronunciation::new("mbwa.wav"));
        let mut incoming = Word::new("mbwa");
        let mut other_speaker = Pronunciation::new("mbwa.wav");
        other_speaker.speaker_id = Some("speaker-2".to_string());
        incoming.audio.push(Pronunciation::new("mbwa.wav"));
        incoming.audio.push(other_speaker.clone());

        let merged = merge_senses_into(&target, &incoming);
        assert_eq!(merged.audio.len(), 2);
        assert_eq!(merged.audio[1], other_speaker);
    }

    #[test]
    fn test_merge_senses_skips_inactive_incoming_sense() {
        let target = Word::new("kitabu").with_sense(Sense::new().with_gloss("en", "book").with_domain(domain("3.5")));
        let mut deleted = Sense::new().with_gloss("en", "book").with_domain(domain("9.9"));
        deleted.accessibility = Accessibility::Deleted;
        let incoming = Word::new("kitabu").with_sense(deleted);

        let merged = merge_senses_into(&target, &incoming);
        assert_eq!(merged.senses.len(), 1);
        assert_eq!(merged.senses[0].semantic_domains, vec![domain("3.5")]);
    }
}
