//! Fuzzy completion via character n-grams.
//!
//! A word is padded (`leading` spaces + completion key + `trailing` spaces)
//! and cut into overlapping grams. A candidate scores
//! `2 · shared / (root_grams + entry_grams)`, so more leading/trailing
//! padding weights the start/end of the word more heavily.

use std::collections::HashMap;

use tracing::{debug, debug_span};

use super::{insert_unique, remove_from, DictError, Entries, EntryRef, SuggestionStore};
use crate::normalize::{completion_key, hash_key};

/// Posting in the gram index: the entry plus how many grams it produced.
/// Lives only in the gram index, never in the hash buckets.
struct GramPosting {
    entry: EntryRef,
    gram_total: usize,
}

pub struct NGramStore {
    entries: Entries,
    grams: HashMap<String, Vec<GramPosting>>,
    gram_count: usize,
    leading: String,
    trailing: String,
}

impl NGramStore {
    pub fn new(
        gram_count: usize,
        leading_space_count: usize,
        trailing_space_count: usize,
    ) -> Result<Self, DictError> {
        if gram_count < 1 {
            return Err(DictError::InvalidParameter {
                field: "gram_count",
                reason: "must be greater than 0".to_string(),
            });
        }
        if leading_space_count >= gram_count {
            return Err(DictError::InvalidParameter {
                field: "leading_space_count",
                reason: "must be less than gram_count".to_string(),
            });
        }
        if trailing_space_count >= gram_count {
            return Err(DictError::InvalidParameter {
                field: "trailing_space_count",
                reason: "must be less than gram_count".to_string(),
            });
        }
        Ok(Self {
            entries: Entries::new(),
            grams: HashMap::new(),
            gram_count,
            leading: " ".repeat(leading_space_count),
            trailing: " ".repeat(trailing_space_count),
        })
    }

    fn to_ngrams(&self, word: &str) -> Vec<String> {
        let padded: Vec<char> = self
            .leading
            .chars()
            .chain(completion_key(word).chars())
            .chain(self.trailing.chars())
            .collect();
        padded
            .windows(self.gram_count)
            .map(|w| w.iter().collect())
            .collect()
    }

    fn index_grams(&mut self, word: &str, entry: &EntryRef) {
        let grams = self.to_ngrams(word);
        let gram_total = grams.len();
        for gram in grams {
            let postings = self.grams.entry(gram).or_default();
            if postings.iter().any(|p| p.entry.text() == entry.text()) {
                continue;
            }
            postings.push(GramPosting {
                entry: EntryRef::clone(entry),
                gram_total,
            });
        }
    }

    fn unindex_grams(&mut self, word: &str, text: &str) {
        for gram in self.to_ngrams(word) {
            if let Some(postings) = self.grams.get_mut(&gram) {
                postings.retain(|p| p.entry.text() != text);
                if postings.is_empty() {
                    self.grams.remove(&gram);
                }
            }
        }
    }

    fn score(shared: usize, root_grams: usize, entry_grams: usize) -> f64 {
        2.0 * shared as f64 / (root_grams + entry_grams) as f64
    }
}

impl SuggestionStore for NGramStore {
    fn add_entry(&mut self, text: &str, entry: EntryRef, hash: Option<&str>) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        let hash = match hash {
            Some(h) => h.to_string(),
            None => hash_key(text),
        };
        if hash.is_empty() {
            return false;
        }

        let (live, added) = insert_unique(&mut self.entries, &hash, entry);
        if added {
            self.index_grams(text, &live);
            // Phrases are also reachable by their initials.
            if text.trim().contains(' ') {
                self.index_grams(&hash, &live);
            }
        }
        added
    }

    fn remove_entry(&mut self, text: &str) {
        let hash = hash_key(text);
        self.unindex_grams(text, text);
        if text.trim().contains(' ') {
            self.unindex_grams(&hash, text);
        }
        remove_from(&mut self.entries, &hash, text);
    }

    fn entries(&self) -> &Entries {
        &self.entries
    }

    fn suggestions(&self, root: Option<&str>, _next_word: bool) -> Result<Vec<String>, DictError> {
        let Some(root) = root.filter(|r| !r.trim().is_empty()) else {
            return Ok(Vec::new());
        };
        let _span = debug_span!("ngram_suggestions", root).entered();

        let root_grams = self.to_ngrams(root);
        let root_total = root_grams.len();

        // text → (entry, shared gram count, entry gram total)
        let mut hits: HashMap<&str, (&EntryRef, usize, usize)> = HashMap::new();
        for gram in &root_grams {
            let Some(postings) = self.grams.get(gram) else {
                continue;
            };
            for p in postings {
                hits.entry(p.entry.text())
                    .and_modify(|h| h.1 += 1)
                    .or_insert((&p.entry, 1, p.gram_total));
            }
        }

        let mut scored: Vec<(f64, &EntryRef)> = hits
            .into_values()
            .map(|(entry, shared, total)| (Self::score(shared, root_total, total), entry))
            .collect();
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.1.usage_count().cmp(&a.1.usage_count()))
                .then(a.1.text().cmp(b.1.text()))
        });
        debug!(candidate_count = scored.len());
        Ok(scored
            .into_iter()
            .map(|(_, e)| e.text().to_string())
            .collect())
    }

    fn clear(&mut self) {
        debug!("clearing ngram store");
        self.entries.clear();
        self.grams.clear();
    }
}
