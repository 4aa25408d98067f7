//! Prefix completion ranked by usage.

use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;

use tracing::{debug, debug_span};

use super::{
    insert_unique, push_unique, remove_from, Bucket, DictError, Entries, EntryRef,
    SuggestionStore,
};
use crate::normalize::{completion_key, hash_key, trailing_word};

/// Hash buckets plus a sorted completion index so a prefix maps to a
/// contiguous key range.
///
/// Phrases are indexed twice for completion: by their full completion key
/// and by their initials, so "see you later" completes from "see y" and
/// from "syl".
#[derive(Default)]
pub struct BasicStore {
    entries: Entries,
    completions: BTreeMap<String, Bucket>,
}

impl BasicStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn index_completion(&mut self, key: String, entry: EntryRef) {
        if key.trim().is_empty() {
            return;
        }
        push_unique(self.completions.entry(key).or_default(), entry);
    }

    fn unindex_completion(&mut self, key: &str, text: &str) {
        if let Some(bucket) = self.completions.get_mut(key) {
            bucket.retain(|e| e.text() != text);
            if bucket.is_empty() {
                self.completions.remove(key);
            }
        }
    }

    /// Usage-ranked completions of `root`.
    pub(super) fn complete(&self, root: &str) -> Vec<String> {
        let _span = debug_span!("basic_complete", root).entered();
        let Some(word) = trailing_word(root) else {
            return Vec::new();
        };
        // A word must start with a letter.
        if !word.chars().next().is_some_and(char::is_alphabetic) {
            return Vec::new();
        }

        let prefix = completion_key(root);
        let root_len = root.chars().count();
        let mut seen = HashSet::new();
        let mut matches: Vec<&EntryRef> = self
            .completions
            .range::<str, _>((Bound::Included(prefix.as_str()), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix.as_str()))
            .flat_map(|(_, bucket)| bucket.iter())
            .filter(|e| e.text().chars().count() >= root_len)
            .filter(|e| seen.insert(e.text().to_string()))
            .collect();

        matches.sort_by(|a, b| {
            b.usage_count()
                .cmp(&a.usage_count())
                .then(a.text().chars().count().cmp(&b.text().chars().count()))
        });
        debug!(match_count = matches.len());
        matches.into_iter().map(|e| e.text().to_string()).collect()
    }
}

impl SuggestionStore for BasicStore {
    fn add_entry(&mut self, text: &str, entry: EntryRef, hash: Option<&str>) -> bool {
        let hash = match hash {
            Some(h) => h.to_string(),
            None => hash_key(text),
        };
        if hash.is_empty() {
            return false;
        }

        let (live, added) = insert_unique(&mut self.entries, &hash, entry);
        self.index_completion(completion_key(text), live.clone());
        if text.trim().contains(' ') {
            self.index_completion(hash, live);
        }
        added
    }

    fn remove_entry(&mut self, text: &str) {
        let hash = hash_key(text);
        remove_from(&mut self.entries, &hash, text);
        self.unindex_completion(&completion_key(text), text);
        if text.trim().contains(' ') {
            self.unindex_completion(&hash, text);
        }
    }

    fn entries(&self) -> &Entries {
        &self.entries
    }

    fn suggestions(&self, root: Option<&str>, _next_word: bool) -> Result<Vec<String>, DictError> {
        Ok(root.map(|r| self.complete(r)).unwrap_or_default())
    }

    fn clear(&mut self) {
        debug!("clearing basic store");
        self.entries.clear();
        self.completions.clear();
    }
}
