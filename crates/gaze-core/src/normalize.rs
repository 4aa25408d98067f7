//! Text canonicalisation for dictionary lookup keys.
//!
//! Two keys are derived from an entry's text:
//! - the *hash key* buckets entries for existence checks, usage counting and
//!   capture resolution (letters only, no diacritics, lowercase, runs of the
//!   same letter collapsed, phrases folded to their initials);
//! - the *completion key* drives prefix completion and n-gram indexing
//!   (no diacritics, lowercase, everything else kept).
//!
//! Persisted user dictionaries are re-hashed on load, but a lookup built
//! with one version of `hash_key` will not find entries hashed by another,
//! so the algorithm must stay stable.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalized hash key for `text`. Total and idempotent; blank input gives
/// an empty key.
pub fn hash_key(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    // Phrases hash to the initials of their words ("see you soon" → "sys").
    let letters: String = if trimmed.contains(' ') {
        trimmed
            .split(' ')
            .filter_map(|word| word.chars().next())
            .filter(|c| c.is_alphabetic())
            .collect()
    } else {
        trimmed.chars().filter(|c| c.is_alphabetic()).collect()
    };

    let folded: String = strip_diacritics(&letters)
        .chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphabetic())
        .collect();

    // Initials collapse too, so a phrase key hashes to itself.
    collapse_repeats(&folded)
}

/// Alias of [`hash_key`].
pub fn normalize(text: &str) -> String {
    hash_key(text)
}

/// Key used for prefix completion and n-grams.
pub fn completion_key(text: &str) -> String {
    strip_diacritics(text.trim())
        .chars()
        .flat_map(char::to_lowercase)
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// First character of the completion key, if any. Applied to every captured
/// key value before it is counted in a dwell histogram.
pub fn first_normalized_char(value: &str) -> Option<char> {
    completion_key(value).chars().next()
}

/// Compatibility-decompose and drop combining marks (Mn, Mc, Me).
pub fn strip_diacritics(text: &str) -> String {
    text.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Collapse runs of identical characters to a single character.
pub fn collapse_repeats(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev: Option<char> = None;
    for c in text.chars() {
        if prev != Some(c) {
            out.push(c);
        }
        prev = Some(c);
    }
    out
}

/// True when every character of `text` is an uppercase letter. Non-letters
/// make the whole text count as not all-caps.
pub fn is_all_uppercase(text: &str) -> bool {
    text.chars().all(char::is_uppercase)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharCategory {
    NewLine,
    Space,
    Tab,
    Visible,
    Other,
}

fn char_category(c: char) -> CharCategory {
    match c {
        '\n' => CharCategory::NewLine,
        ' ' => CharCategory::Space,
        '\t' => CharCategory::Tab,
        // letters, digits, symbols, punctuation and combining marks
        c if !c.is_whitespace() && !c.is_control() => CharCategory::Visible,
        _ => CharCategory::Other,
    }
}

/// The word surrounding `cursor` (a char index): the maximal run of
/// non-whitespace characters sharing the category of the character just
/// before the cursor. `None` when the cursor follows whitespace.
pub fn in_progress_word(text: &str, cursor: usize) -> Option<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.iter().all(|c| c.is_whitespace()) || cursor == 0 || cursor > chars.len() {
        return None;
    }
    if chars[cursor - 1].is_whitespace() {
        return None;
    }

    let category = char_category(chars[cursor - 1]);
    let same = |c: char| !c.is_whitespace() && char_category(c) == category;

    let mut start = cursor;
    while start > 0 && same(chars[start - 1]) {
        start -= 1;
    }
    let mut end = start;
    while end < chars.len() && same(chars[end]) {
        end += 1;
    }
    Some(chars[start..end].iter().collect())
}

/// In-progress word at the end of `text`.
pub fn trailing_word(text: &str) -> Option<String> {
    in_progress_word(text, text.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_hash_key_basic() {
        assert_eq!(hash_key("Hello"), "helo");
        assert_eq!(hash_key("bookkeeper"), "bokeper");
        assert_eq!(hash_key("  cat  "), "cat");
        assert_eq!(hash_key(""), "");
        assert_eq!(hash_key("   "), "");
    }

    #[test]
    fn test_hash_key_diacritics_and_punctuation() {
        assert_eq!(hash_key("Café"), "cafe");
        assert_eq!(hash_key("naïve"), "naive");
        assert_eq!(hash_key("don't"), "dont");
        assert_eq!(hash_key("Ångström"), "angstrom");
    }

    #[test]
    fn test_hash_key_phrases() {
        assert_eq!(hash_key("see you later"), "syl");
        assert_eq!(hash_key("see see soon"), "s");
        assert_eq!(hash_key("oh oh no"), "on");
        assert_eq!(hash_key(&hash_key("see see soon")), "s");
        assert_eq!(hash_key("I  am"), "ia");
    }

    #[test]
    fn test_completion_key() {
        assert_eq!(completion_key(" Éclair "), "eclair");
        assert_eq!(completion_key("Book-keeper"), "book-keeper");
        assert_eq!(completion_key(""), "");
    }

    #[test]
    fn test_first_normalized_char() {
        assert_eq!(first_normalized_char("Ä"), Some('a'));
        assert_eq!(first_normalized_char("b"), Some('b'));
        assert_eq!(first_normalized_char(""), None);
    }

    #[test]
    fn test_is_all_uppercase() {
        assert!(is_all_uppercase("NASA"));
        assert!(!is_all_uppercase("Nasa"));
        assert!(!is_all_uppercase("A-B"));
    }

    #[test]
    fn test_in_progress_word() {
        assert_eq!(trailing_word("hello wor"), Some("wor".to_string()));
        assert_eq!(trailing_word("hello "), None);
        assert_eq!(trailing_word(""), None);
        assert_eq!(in_progress_word("hello world", 3), Some("hello".to_string()));
        assert_eq!(trailing_word("line\nnext"), Some("next".to_string()));
    }

    proptest! {
        #[test]
        fn hash_key_is_idempotent(s in "[a-zA-Z àéîõüçñÅß'-]{0,24}") {
            let once = hash_key(&s);
            prop_assert_eq!(hash_key(&once), once.clone());
        }

        #[test]
        fn completion_key_is_idempotent(s in "[a-zA-Z àéîõüçñ'-]{0,24}") {
            let once = completion_key(&s);
            prop_assert_eq!(completion_key(&once), once.clone());
        }
    }
}
