use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// A dictionary word and how often it has been used.
///
/// Identity is the exact (case-sensitive) text. The usage count is atomic
/// so one shared instance can sit in a hash bucket and in a store's
/// auxiliary indexes while being counted up and down in place.
pub struct DictionaryEntry {
    text: String,
    usage_count: AtomicU32,
}

/// Shared handle to a live entry.
pub type EntryRef = Arc<DictionaryEntry>;

impl DictionaryEntry {
    pub fn new(text: impl Into<String>, usage_count: u32) -> Self {
        Self {
            text: text.into(),
            usage_count: AtomicU32::new(usage_count),
        }
    }

    pub fn shared(text: impl Into<String>, usage_count: u32) -> EntryRef {
        Arc::new(Self::new(text, usage_count))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn usage_count(&self) -> u32 {
        self.usage_count.load(Ordering::Relaxed)
    }

    pub fn increment(&self) {
        self.usage_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement, flooring at zero. Returns `false` if the count was already zero.
    pub fn decrement(&self) -> bool {
        self.usage_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Clone for DictionaryEntry {
    fn clone(&self) -> Self {
        Self::new(self.text.clone(), self.usage_count())
    }
}

impl PartialEq for DictionaryEntry {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for DictionaryEntry {}

impl fmt::Debug for DictionaryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DictionaryEntry")
            .field("text", &self.text)
            .field("usage_count", &self.usage_count())
            .finish()
    }
}
