//! Post-processing of raw suggestion lists for display.

use std::collections::HashSet;

use serde::Deserialize;

use crate::normalize::trailing_word;

/// State of the shift key when suggestions are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShiftState {
    #[default]
    Up,
    Down,
    #[serde(alias = "locked")]
    LockedDown,
}

impl ShiftState {
    fn is_down(self) -> bool {
        matches!(self, Self::Down | Self::LockedDown)
    }

    fn is_locked(self) -> bool {
        self == Self::LockedDown
    }
}

/// Rank `raw` for display after `text`.
///
/// Unless predicting the next word, the word being typed is kept first
/// (inserted, or swapped to the front when already present ignoring case).
/// Suggestions are then cased from the shift state and the typed word,
/// deduplicated, and capped at `max`.
pub fn rank_suggestions(
    raw: Vec<String>,
    text: &str,
    next_word: bool,
    shift: ShiftState,
    max: usize,
) -> Vec<String> {
    let mut suggestions = raw;
    suggestions.truncate(max);
    let in_progress = trailing_word(text);

    if let Some(word) = in_progress.as_deref().filter(|_| !next_word) {
        let lowered = word.to_lowercase();
        match suggestions.iter().position(|s| s.to_lowercase() == lowered) {
            Some(index) => suggestions.swap(0, index),
            None => {
                suggestions.insert(0, word.to_string());
                suggestions.truncate(max);
            }
        }
    }

    let word = in_progress.as_deref().filter(|_| !next_word);
    let mut seen = HashSet::new();
    suggestions
        .into_iter()
        .map(|s| apply_casing(&s, word, shift))
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

/// Uppercase the characters of `suggestion` the user would have typed in
/// upper case. Never lowercases.
fn apply_casing(suggestion: &str, in_progress: Option<&str>, shift: ShiftState) -> String {
    let word_chars: Vec<char> = in_progress.map(|w| w.chars().collect()).unwrap_or_default();
    let mut out = String::with_capacity(suggestion.len());
    for (i, c) in suggestion.chars().enumerate() {
        let upper = match in_progress {
            None => (i == 0 && shift.is_down()) || (i > 0 && shift.is_locked()),
            Some(_) => match i.cmp(&word_chars.len()) {
                std::cmp::Ordering::Less => word_chars[i].is_uppercase(),
                std::cmp::Ordering::Equal => shift.is_down(),
                std::cmp::Ordering::Greater => shift.is_locked(),
            },
        };
        if upper {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn locked_shift_uppercases_everything() {
        let out = rank_suggestions(words(&["house"]), "", true, ShiftState::LockedDown, 5);
        assert_eq!(out, vec!["HOUSE"]);
    }

    #[test]
    fn shift_down_capitalises_first_letter() {
        let out = rank_suggestions(words(&["house"]), "", true, ShiftState::Down, 5);
        assert_eq!(out, vec!["House"]);
        let out = rank_suggestions(words(&["house"]), "my ", false, ShiftState::Down, 5);
        assert_eq!(out, vec!["House"]);
    }

    #[test]
    fn in_progress_word_inserted_first() {
        let out = rank_suggestions(
            words(&["hello", "help"]),
            "say hel",
            false,
            ShiftState::Up,
            5,
        );
        assert_eq!(out, vec!["hel", "hello", "help"]);
    }

    #[test]
    fn in_progress_insert_respects_cap() {
        let out = rank_suggestions(
            words(&["hello", "help", "helm"]),
            "hel",
            false,
            ShiftState::Up,
            3,
        );
        assert_eq!(out, vec!["hel", "hello", "help"]);
    }

    #[test]
    fn existing_match_is_swapped_to_front() {
        let out = rank_suggestions(
            words(&["hello", "help", "Hel"]),
            "hel",
            false,
            ShiftState::Up,
            5,
        );
        // Swap, not shift: "hello" takes the old slot of "Hel".
        assert_eq!(out, vec!["Hel", "help", "hello"]);
    }

    #[test]
    fn casing_follows_typed_word() {
        let out = rank_suggestions(words(&["hello"]), "HEl", false, ShiftState::Up, 5);
        assert_eq!(out, vec!["HEl", "HEllo"]);
        let out = rank_suggestions(words(&["hello"]), "hel", false, ShiftState::Down, 5);
        assert_eq!(out, vec!["hel", "helLo"]);
        let out = rank_suggestions(words(&["hello"]), "hel", false, ShiftState::LockedDown, 5);
        assert_eq!(out, vec!["hel", "helLO"]);
    }

    #[test]
    fn next_word_skips_in_progress_insertion() {
        let out = rank_suggestions(words(&["world"]), "hello", true, ShiftState::Up, 5);
        assert_eq!(out, vec!["world"]);
    }

    #[test]
    fn casing_collisions_are_deduplicated() {
        let out = rank_suggestions(words(&["am", "AM", "an"]), "", true, ShiftState::LockedDown, 5);
        assert_eq!(out, vec!["AM", "AN"]);
    }

    #[test]
    fn truncates_before_insertion() {
        let out = rank_suggestions(words(&["a1", "a2", "a3", "ab"]), "ab", false, ShiftState::Up, 2);
        assert_eq!(out, vec!["ab", "a1"]);
    }
}
