//! Character-level edit distance between vernacular forms.

/// Minimum number of single-character insertions, deletions and
/// substitutions turning `a` into `b`.
///
/// Counts Unicode scalar values, not bytes, and is case-sensitive:
/// vernacular orthographies often use case contrastively.
pub fn distance(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }
    strsim::levenshtein(a, b)
}

/// Distance budget for a vernacular of the given length. Very short forms
/// tolerate only a single edit, otherwise almost everything would match.
pub fn max_distance_for(len: usize, max_score: usize) -> usize {
    if len <= 3 { max_score.min(1) } else { max_score }
}
