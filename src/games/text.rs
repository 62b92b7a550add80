//! Answer normalization and fuzzy matching shared by both engines.
//!
//! Pure functions, no state. Accent folding is a fixed table covering the
//! French diacritics that show up in track titles and artist names; the
//! similarity metric is `1 - levenshtein(a, b) / max(|a|, |b|)` over the
//! normalized forms.

/// Similarity above this threshold counts as a match.
pub const SIMILARITY_THRESHOLD: f64 = 0.7;

fn fold_accent(c: char) -> char {
    match c {
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'à' | 'â' | 'ä' => 'a',
        'ô' | 'ö' => 'o',
        'ù' | 'û' | 'ü' => 'u',
        'î' | 'ï' => 'i',
        'ç' => 'c',
        _ => c,
    }
}

/// Lowercase, trim, fold accents, strip punctuation, collapse whitespace.
pub fn normalize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_space = false;
    for c in input.trim().chars().flat_map(char::to_lowercase) {
        let c = fold_accent(c);
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else {
            // Punctuation and whitespace both act as soft separators.
            pending_space = true;
        }
    }
    out
}

/// Classic Levenshtein distance with a two-row buffer.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr: Vec<usize> = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Normalized similarity in `[0, 1]`. Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - (levenshtein(a, b) as f64) / (max_len as f64)
}

/// Whether a free-form Blind Test answer matches a track.
///
/// True iff the normalized answer is a substring of the normalized title (or
/// vice versa), the same for the artist, or either similarity exceeds
/// [`SIMILARITY_THRESHOLD`].
pub fn matches_track(answer: &str, title: &str, artist: &str) -> bool {
    let answer = normalize(answer);
    if answer.is_empty() {
        return false;
    }
    let title = normalize(title);
    let artist = normalize(artist);

    contains_either_way(&answer, &title)
        || contains_either_way(&answer, &artist)
        || similarity(&answer, &title) > SIMILARITY_THRESHOLD
        || similarity(&answer, &artist) > SIMILARITY_THRESHOLD
}

fn contains_either_way(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(b) || b.contains(a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn normalize_folds_accents_and_case() {
        assert_eq!(normalize("Éléphant"), "elephant");
        assert_eq!(normalize("  À l'Ombre  "), "a l ombre");
        assert_eq!(normalize("Français, ça!"), "francais ca");
    }

    #[test]
    fn normalize_strips_punctuation() {
        assert_eq!(normalize("Don't Stop Me Now!"), "don t stop me now");
        assert_eq!(normalize("..."), "");
    }

    #[test]
    fn levenshtein_known_distances() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", "abc"), 0);
        assert_eq!(levenshtein("flaw", "lawn"), 2);
    }

    #[test]
    fn similarity_of_close_strings_exceeds_threshold() {
        assert!(similarity("thriler", "thriller") > SIMILARITY_THRESHOLD);
        assert!(similarity("billie jeen", "billie jean") > SIMILARITY_THRESHOLD);
        assert!(similarity("xyz", "billie jean") < SIMILARITY_THRESHOLD);
    }

    #[test]
    fn matches_title_substring_and_typo() {
        assert!(matches_track("thriller", "Thriller", "Michael Jackson"));
        assert!(matches_track("thriler", "Thriller", "Michael Jackson"));
        assert!(matches_track("michael jackson", "Thriller", "Michael Jackson"));
        assert!(matches_track("Billie Jeen", "Billie Jean", "Michael Jackson"));
        assert!(!matches_track("xyz", "Billie Jean", "Michael Jackson"));
    }

    #[test]
    fn empty_answer_never_matches() {
        assert!(!matches_track("   ", "Thriller", "Michael Jackson"));
        assert!(!matches_track("!!!", "Thriller", "Michael Jackson"));
    }

    #[test]
    fn accented_answer_matches_plain_title() {
        assert!(matches_track("désenchantée", "Desenchantee", "Mylène Farmer"));
        assert!(matches_track("mylene farmer", "Désenchantée", "Mylène Farmer"));
    }

    proptest! {
        #[test]
        fn distance_is_symmetric(a in ".{0,24}", b in ".{0,24}") {
            prop_assert_eq!(levenshtein(&a, &b), levenshtein(&b, &a));
        }

        #[test]
        fn distance_zero_iff_equal(a in ".{0,24}") {
            prop_assert_eq!(levenshtein(&a, &a), 0);
        }

        #[test]
        fn distance_bounded_by_longer_input(a in ".{0,24}", b in ".{0,24}") {
            let d = levenshtein(&a, &b);
            prop_assert!(d <= a.chars().count().max(b.chars().count()));
        }

        #[test]
        fn normalize_is_idempotent(a in ".{0,48}") {
            let once = normalize(&a);
            prop_assert_eq!(normalize(&once), once.clone());
        }

        #[test]
        fn exact_title_always_matches(title in "[a-zA-Z]{1,16}( [a-zA-Z]{1,16}){0,2}") {
            prop_assert!(matches_track(&title, &title, "someone"));
        }
    }
}
