//! Store backed by an external predictive model.
//!
//! Entries are still kept locally (same layout as [`BasicStore`]) so that
//! existence checks, usage counting and capture resolution work, but
//! suggestions come from a [`Predictor`] fed with the text typed so far.

use std::sync::Arc;

use tracing::{debug, debug_span};

use super::{BasicStore, DictError, Entries, EntryRef, SuggestionStore};

/// Maximum number of trailing characters handed to the predictor.
const PAST_STREAM_LIMIT: usize = 500;

#[derive(Debug, thiserror::Error)]
#[error("prediction engine failed: {0}")]
pub struct PredictorError(pub String);

/// An external word-prediction engine.
pub trait Predictor: Send + Sync {
    /// Predict completions of the last word of `past_stream`, or next words
    /// when it ends in whitespace.
    fn predict(&self, past_stream: &str) -> Result<Vec<String>, PredictorError>;
}

pub struct PresageStore {
    local: BasicStore,
    predictor: Option<Arc<dyn Predictor>>,
}

impl PresageStore {
    pub fn new(predictor: Option<Arc<dyn Predictor>>) -> Self {
        Self {
            local: BasicStore::new(),
            predictor,
        }
    }

    /// Context passed to the predictor: the tail of `root`, with a space
    /// appended to request the next word when `root` ends mid-word.
    pub fn past_stream(root: Option<&str>, next_word: bool) -> String {
        let mut stream = root.unwrap_or_default().to_string();
        if next_word && stream.chars().last().is_some_and(char::is_alphanumeric) {
            stream.push(' ');
        }
        let len = stream.chars().count();
        if len > PAST_STREAM_LIMIT {
            stream = stream.chars().skip(len - PAST_STREAM_LIMIT).collect();
        }
        stream
    }
}

impl SuggestionStore for PresageStore {
    fn add_entry(&mut self, text: &str, entry: EntryRef, hash: Option<&str>) -> bool {
        self.local.add_entry(text, entry, hash)
    }

    fn remove_entry(&mut self, text: &str) {
        self.local.remove_entry(text)
    }

    fn entries(&self) -> &Entries {
        self.local.entries()
    }

    fn suggestions(&self, root: Option<&str>, next_word: bool) -> Result<Vec<String>, DictError> {
        let _span = debug_span!("presage_suggestions", next_word).entered();
        match &self.predictor {
            Some(predictor) => {
                let stream = Self::past_stream(root, next_word);
                let predictions = predictor.predict(&stream)?;
                debug!(prediction_count = predictions.len());
                Ok(predictions)
            }
            None if next_word => Ok(Vec::new()),
            None => self.local.suggestions(root, false),
        }
    }

    fn clear(&mut self) {
        self.local.clear()
    }

    fn supports_next_word(&self) -> bool {
        true
    }

    fn expects_local_entries(&self) -> bool {
        false
    }
}
