//! Hashed dictionary storage and suggestion engines.
//!
//! Every store maps a normalized hash key (see [`crate::normalize::hash_key`])
//! to a bucket of [`DictionaryEntry`] values, unique by exact text. On top of
//! that each variant keeps whatever index its suggestion policy needs:
//! `BasicStore` a sorted completion index, `NGramStore` an n-gram posting
//! index, `PresageStore` an external predictor.

mod basic;
mod entry;
pub mod io;
mod ngram;
mod presage;

use std::collections::hash_map::Keys;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

pub use basic::BasicStore;
pub use entry::{DictionaryEntry, EntryRef};
pub use ngram::NGramStore;
pub use presage::{Predictor, PredictorError, PresageStore};

use crate::settings::NGramSettings;

/// Entries sharing one hash key.
pub type Bucket = Vec<EntryRef>;

/// The live backing store: hash key → bucket.
pub type Entries = HashMap<String, Bucket>;

#[derive(Debug, thiserror::Error)]
pub enum DictError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("invalid {field}: {reason}")]
    InvalidParameter { field: &'static str, reason: String },

    #[error(transparent)]
    Predictor(#[from] PredictorError),
}

/// Capability interface shared by the suggestion engines.
pub trait SuggestionStore: Send + Sync {
    /// Insert `entry` under `hash` (computed from `text` when `None`).
    /// If the bucket already holds an entry with identical text the existing
    /// instance is kept. Returns `true` if the entry was newly added.
    fn add_entry(&mut self, text: &str, entry: EntryRef, hash: Option<&str>) -> bool;

    /// Remove the entry with exactly this text from every index. No-op if absent.
    fn remove_entry(&mut self, text: &str);

    /// The live hash → bucket mapping. Usage counts may be changed in place
    /// through the returned entries.
    fn entries(&self) -> &Entries;

    /// All known hash keys.
    fn words_hashes(&self) -> Keys<'_, String, Bucket> {
        self.entries().keys()
    }

    /// Completions for `root`, or continuations when `next_word` is set and
    /// the engine can predict the next word.
    fn suggestions(&self, root: Option<&str>, next_word: bool) -> Result<Vec<String>, DictError>;

    fn clear(&mut self);

    fn supports_next_word(&self) -> bool {
        false
    }

    /// Whether an empty local cache indicates a broken dictionary. Engines
    /// backed by an external model may legitimately hold nothing locally.
    fn expects_local_entries(&self) -> bool {
        true
    }
}

/// Which suggestion engine backs the dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionMethod {
    #[default]
    Basic,
    NGram,
    Presage,
}

impl fmt::Display for SuggestionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Basic => "basic",
            Self::NGram => "ngram",
            Self::Presage => "presage",
        })
    }
}

/// Tagged dispatch over the three engines.
pub enum StoreKind {
    Basic(BasicStore),
    NGram(NGramStore),
    Presage(PresageStore),
}

impl StoreKind {
    /// Build a fresh, empty store for `method`.
    pub fn create(
        method: SuggestionMethod,
        ngram: &NGramSettings,
        predictor: Option<Arc<dyn Predictor>>,
    ) -> Result<Self, DictError> {
        Ok(match method {
            SuggestionMethod::Basic => Self::Basic(BasicStore::new()),
            SuggestionMethod::NGram => Self::NGram(NGramStore::new(
                ngram.gram_count,
                ngram.leading_space_count,
                ngram.trailing_space_count,
            )?),
            SuggestionMethod::Presage => Self::Presage(PresageStore::new(predictor)),
        })
    }

    pub fn method(&self) -> SuggestionMethod {
        match self {
            Self::Basic(_) => SuggestionMethod::Basic,
            Self::NGram(_) => SuggestionMethod::NGram,
            Self::Presage(_) => SuggestionMethod::Presage,
        }
    }

    fn inner(&self) -> &dyn SuggestionStore {
        match self {
            Self::Basic(s) => s,
            Self::NGram(s) => s,
            Self::Presage(s) => s,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn SuggestionStore {
        match self {
            Self::Basic(s) => s,
            Self::NGram(s) => s,
            Self::Presage(s) => s,
        }
    }
}

impl SuggestionStore for StoreKind {
    fn add_entry(&mut self, text: &str, entry: EntryRef, hash: Option<&str>) -> bool {
        self.inner_mut().add_entry(text, entry, hash)
    }

    fn remove_entry(&mut self, text: &str) {
        self.inner_mut().remove_entry(text)
    }

    fn entries(&self) -> &Entries {
        self.inner().entries()
    }

    fn suggestions(&self, root: Option<&str>, next_word: bool) -> Result<Vec<String>, DictError> {
        self.inner().suggestions(root, next_word)
    }

    fn clear(&mut self) {
        self.inner_mut().clear()
    }

    fn supports_next_word(&self) -> bool {
        self.inner().supports_next_word()
    }

    fn expects_local_entries(&self) -> bool {
        self.inner().expects_local_entries()
    }
}

/// Push `entry` unless an entry with the same text is already present.
/// Returns the instance that ends up in the bucket and whether it was added.
pub(crate) fn push_unique(bucket: &mut Bucket, entry: EntryRef) -> (EntryRef, bool) {
    match bucket.iter().find(|e| e.text() == entry.text()) {
        Some(existing) => (Arc::clone(existing), false),
        None => {
            bucket.push(Arc::clone(&entry));
            (entry, true)
        }
    }
}

/// Insert into `map[key]`, keeping the long-standing instance on a text clash.
pub(crate) fn insert_unique(map: &mut Entries, key: &str, entry: EntryRef) -> (EntryRef, bool) {
    push_unique(map.entry(key.to_string()).or_default(), entry)
}

/// Remove the entry with `text` from `map[key]`, dropping the bucket when it
/// empties. Returns `true` if something was removed.
pub(crate) fn remove_from(map: &mut Entries, key: &str, text: &str) -> bool {
    let Some(bucket) = map.get_mut(key) else {
        return false;
    };
    let before = bucket.len();
    bucket.retain(|e| e.text() != text);
    let removed = bucket.len() < before;
    if bucket.is_empty() {
        map.remove(key);
    }
    removed
}

/// Bucket entries ordered by usage count, highest first. Ties keep insertion order.
pub fn by_usage_desc(bucket: &[EntryRef]) -> Vec<EntryRef> {
    let mut sorted = bucket.to_vec();
    sorted.sort_by_key(|e| std::cmp::Reverse(e.usage_count()));
    sorted
}
