//! Dictionary service: owns the suggestion store for the configured
//! language and exposes lookup, learning, suggestion and capture
//! resolution on top of it.
//!
//! Readers (suggestions, capture scans) share the store through a
//! `RwLock`; mutations take the write side. Usage counts are atomics inside
//! the shared entries, so increment/decrement only need the read side.

mod persist;
#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, debug_span, error, info, warn};

use crate::capture::{
    self, CancellationToken, CaptureError, CaptureResult, CaptureSample, ReliableLetters,
    ResolveOptions, Scorer,
};
use crate::dict::{
    io, DictError, DictionaryEntry, EntryRef, Predictor, StoreKind, SuggestionMethod,
    SuggestionStore,
};
use crate::normalize::{hash_key, is_all_uppercase, trailing_word};
use crate::ranker::{rank_suggestions, ShiftState};
use crate::settings::Settings;

use persist::{PersistJob, PersistWorker};

/// How a [`ServiceError`] should be treated by whoever receives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The operation was aborted; nothing usable was produced.
    Fatal,
    /// A dictionary file could not be read or written; in-memory state is kept.
    RecoverableIo,
    /// The suggestion engine failed; suggestions degrade to nothing.
    Engine,
    /// The parallel capture scan failed.
    Aggregate,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("dictionary file not found: {}", path.display())]
    CanonicalMissing { path: PathBuf },

    #[error("invalid suggestion store configuration: {0}")]
    InvalidConfig(#[source] DictError),

    #[error("failed to load {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: DictError,
    },

    #[error("failed to save {}: {source}", path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: DictError,
    },

    #[error("failed to migrate legacy dictionaries in {}: {source}", dir.display())]
    Migrate {
        dir: PathBuf,
        #[source]
        source: DictError,
    },

    #[error("suggestion engine failed: {0}")]
    Engine(#[source] DictError),

    #[error(transparent)]
    Capture(CaptureError),
}

impl ServiceError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::CanonicalMissing { .. } | Self::InvalidConfig(_) => ErrorClass::Fatal,
            Self::Load { .. } | Self::Save { .. } | Self::Migrate { .. } => {
                ErrorClass::RecoverableIo
            }
            Self::Engine(_) => ErrorClass::Engine,
            Self::Capture(_) => ErrorClass::Aggregate,
        }
    }
}

/// Receiver of failures the service recovers from (or cannot report
/// through a return value).
pub trait ErrorSink: Send + Sync {
    fn report(&self, error: &ServiceError);
}

impl<F> ErrorSink for F
where
    F: Fn(&ServiceError) + Send + Sync,
{
    fn report(&self, error: &ServiceError) {
        self(error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Uninitialized,
    Loading,
    Ready,
    LoadFailed,
}

pub struct DictionaryService {
    settings: RwLock<Settings>,
    store: RwLock<StoreKind>,
    state: RwLock<LoadState>,
    predictor: Option<Arc<dyn Predictor>>,
    scorer: Arc<Scorer>,
    sink: Arc<dyn ErrorSink>,
    persist: PersistWorker,
}

impl DictionaryService {
    /// Create the service, start the persistence worker and load the
    /// dictionary for the configured language. Load failures are reported
    /// to `sink` and reflected in [`state`](Self::state).
    pub fn new(settings: Settings, sink: Arc<dyn ErrorSink>) -> Self {
        Self::with_predictor(settings, None, sink)
    }

    /// Like [`new`](Self::new), with the prediction engine backing the
    /// `presage` suggestion method.
    pub fn with_predictor(
        settings: Settings,
        predictor: Option<Arc<dyn Predictor>>,
        sink: Arc<dyn ErrorSink>,
    ) -> Self {
        let method = settings.suggestions.method;
        let service = Self {
            store: RwLock::new(StoreKind::Basic(Default::default())),
            settings: RwLock::new(settings),
            state: RwLock::new(LoadState::Uninitialized),
            predictor,
            scorer: Arc::new(capture::similarity),
            persist: PersistWorker::new(Arc::clone(&sink)),
            sink,
        };
        debug!(%method, "creating dictionary service");
        service.persist.start();
        service.migrate_legacy();
        // Failures have already gone to the sink.
        let _ = service.load_dictionary();
        service
    }

    /// Replace the similarity function used by capture resolution.
    pub fn with_scorer(mut self, scorer: Arc<Scorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn settings(&self) -> Settings {
        read(&self.settings).clone()
    }

    pub fn state(&self) -> LoadState {
        *read(&self.state)
    }

    fn set_state(&self, state: LoadState) {
        debug!(?state, "dictionary load state");
        *write(&self.state) = state;
    }

    fn report(&self, e: &ServiceError) {
        match e.class() {
            ErrorClass::Fatal | ErrorClass::Aggregate => error!(error = %e),
            ErrorClass::RecoverableIo | ErrorClass::Engine => warn!(error = %e),
        }
        self.sink.report(e);
    }

    fn migrate_legacy(&self) {
        let dict = read(&self.settings).dictionary.clone();
        let dir = dict.user_dir();
        if !dir.is_dir() {
            return;
        }
        match io::migrate_legacy_dictionaries(&dir, &dict.file_extension) {
            Ok(0) => {}
            Ok(n) => info!(migrated = n, "migrated legacy user dictionaries"),
            Err(source) => self.report(&ServiceError::Migrate { dir, source }),
        }
    }

    // --- Lifecycle ---

    /// (Re)start the background persistence worker. While it is stopped,
    /// writes run on the calling thread.
    pub fn start(&self) {
        self.persist.start();
    }

    /// Drain pending writes and stop the background worker.
    pub fn stop(&self) {
        self.persist.stop();
    }

    pub fn is_running(&self) -> bool {
        self.persist.is_running()
    }

    /// Block until all queued background writes have completed.
    pub fn flush_background(&self) {
        self.persist.flush();
    }

    /// Save the user dictionary synchronously before exit.
    pub fn on_app_closing(&self) {
        info!("application closing, saving user dictionary");
        let _ = self.save_user_dictionary();
    }

    // --- Loading and saving ---

    /// (Re)build the store from disk.
    ///
    /// The user dictionary is preferred. Without one (or when it yields no
    /// entries for a store that expects them) the canonical word list is
    /// loaded and a derived user dictionary is written in the background.
    pub fn load_dictionary(&self) -> Result<(), ServiceError> {
        let settings = self.settings();
        let _span = debug_span!("load_dictionary", language = %settings.dictionary.language).entered();
        self.set_state(LoadState::Loading);

        match self.build_store(&settings) {
            Ok((store, bootstrapped)) => {
                let count = store.entries().values().map(Vec::len).sum::<usize>();
                let bootstrap_entries = bootstrapped.then(|| snapshot(&store));
                *write(&self.store) = store;
                self.set_state(LoadState::Ready);
                info!(entries = count, bootstrapped, "dictionary loaded");

                if let Some(entries) = bootstrap_entries {
                    self.persist.submit(PersistJob::SaveAll {
                        path: settings.dictionary.user_dictionary_path(),
                        entries,
                    });
                }
                self.warn_on_next_word_override(&settings);
                Ok(())
            }
            Err(e) => {
                write(&self.store).clear();
                self.set_state(LoadState::LoadFailed);
                self.report(&e);
                Err(e)
            }
        }
    }

    /// Returns the loaded store and whether it came from the canonical list.
    fn build_store(&self, settings: &Settings) -> Result<(StoreKind, bool), ServiceError> {
        let mut store = StoreKind::create(
            settings.suggestions.method,
            &settings.ngram,
            self.predictor.clone(),
        )
        .map_err(ServiceError::InvalidConfig)?;

        let user_path = settings.dictionary.user_dictionary_path();
        if user_path.exists() {
            self.load_user_file(&mut store, &user_path);
            if store.words_hashes().len() > 0 || !store.expects_local_entries() {
                return Ok((store, false));
            }
            // Probably stale or corrupt: start over from the canonical list,
            // dropping any usage counts.
            warn!(path = %user_path.display(), "user dictionary is empty, reloading from word list");
            store.clear();
        }

        let original = settings.dictionary.original_dictionary_path();
        if !original.exists() {
            return Err(ServiceError::CanonicalMissing { path: original });
        }
        self.load_original_file(&mut store, &original);
        Ok((store, true))
    }

    fn load_user_file(&self, store: &mut StoreKind, path: &Path) {
        debug!(path = %path.display(), "loading user dictionary");
        let entries = match io::user_entries(path) {
            Ok(entries) => entries,
            Err(source) => {
                self.report(&ServiceError::Load {
                    path: path.to_path_buf(),
                    source,
                });
                return;
            }
        };
        for entry in entries {
            match entry {
                Ok((word, count)) => {
                    store.add_entry(&word, DictionaryEntry::shared(&word, count), None);
                }
                Err(source) => {
                    self.report(&ServiceError::Load {
                        path: path.to_path_buf(),
                        source,
                    });
                    break;
                }
            }
        }
    }

    fn load_original_file(&self, store: &mut StoreKind, path: &Path) {
        debug!(path = %path.display(), "loading word list");
        let words = match io::original_entries(path) {
            Ok(words) => words,
            Err(source) => {
                self.report(&ServiceError::Load {
                    path: path.to_path_buf(),
                    source,
                });
                return;
            }
        };
        for word in words {
            match word {
                Ok(word) => {
                    store.add_entry(&word, DictionaryEntry::shared(&word, 0), None);
                }
                Err(source) => {
                    self.report(&ServiceError::Load {
                        path: path.to_path_buf(),
                        source,
                    });
                    break;
                }
            }
        }
    }

    /// Write the whole user dictionary now, after any queued background
    /// writes. An empty dictionary is never written. Returns the number of
    /// entries saved.
    pub fn save_user_dictionary(&self) -> Result<usize, ServiceError> {
        self.flush_background();
        let path = read(&self.settings).dictionary.user_dictionary_path();
        let entries = snapshot(&read(&self.store));
        self.persist.save_now(&path, &entries).inspect_err(|e| self.report(e))
    }

    /// Switch language: save the current user dictionary, then reload.
    pub fn set_language(&self, language: &str) -> Result<(), ServiceError> {
        if read(&self.settings).dictionary.language == language {
            return Ok(());
        }
        info!(language, "switching dictionary language");
        let _ = self.save_user_dictionary();
        write(&self.settings).dictionary.language = language.to_string();
        self.load_dictionary()
    }

    // --- Entries ---

    /// Exact-text membership, ignoring surrounding whitespace.
    pub fn exists(&self, text: &str) -> bool {
        let text = text.trim();
        let hash = hash_key(text);
        if hash.is_empty() {
            return false;
        }
        read(&self.store)
            .entries()
            .get(&hash)
            .is_some_and(|bucket| bucket.iter().any(|e| e.text().trim() == text))
    }

    /// Learn a word typed by the user (usage count 1) and append it to the
    /// user dictionary in the background. Surrounding whitespace is dropped.
    pub fn add_new_entry(&self, text: &str) {
        let text = text.trim();
        if hash_key(text).is_empty() {
            return;
        }
        let added = write(&self.store).add_entry(text, DictionaryEntry::shared(text, 1), None);
        if !added {
            debug!(entry = text, "entry already in dictionary");
            return;
        }
        debug!(entry = text, "added new entry");
        let path = read(&self.settings).dictionary.user_dictionary_path();
        self.persist.submit(PersistJob::Append {
            path,
            word: text.to_string(),
        });
    }

    pub fn remove_entry(&self, text: &str) {
        let text = text.trim();
        if !self.exists(text) {
            return;
        }
        debug!(entry = text, "removing entry");
        write(&self.store).remove_entry(text);
    }

    /// Every entry, sorted by text. Each call iterates a fresh snapshot, so
    /// the store can change while the iterator is alive.
    pub fn all_entries(&self) -> impl ExactSizeIterator<Item = EntryRef> {
        let mut all: Vec<EntryRef> = read(&self.store).entries().values().flatten().cloned().collect();
        all.sort_by(|a, b| a.text().cmp(b.text()));
        all.into_iter()
    }

    pub fn increment_usage(&self, text: &str) {
        for entry in self.usage_matches(text) {
            entry.increment();
            debug!(entry = entry.text(), count = entry.usage_count(), "usage incremented");
        }
    }

    /// Decrement usage counts; counts already at zero stay there.
    pub fn decrement_usage(&self, text: &str) {
        for entry in self.usage_matches(text) {
            if entry.decrement() {
                debug!(entry = entry.text(), count = entry.usage_count(), "usage decremented");
            } else {
                info!(entry = entry.text(), "usage count already 0, not decremented");
            }
        }
    }

    /// Entries a usage change for `text` applies to: the exact match if
    /// any, otherwise case-insensitive matches. Text that is not all caps
    /// cannot have come from an all-caps entry, so those are skipped then.
    fn usage_matches(&self, text: &str) -> Vec<EntryRef> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }
        let hash = hash_key(text);
        let store = read(&self.store);
        let Some(bucket) = store.entries().get(&hash) else {
            return Vec::new();
        };
        if let Some(exact) = bucket.iter().find(|e| e.text() == text) {
            return vec![EntryRef::clone(exact)];
        }
        let lowered = text.to_lowercase();
        let text_all_caps = is_all_uppercase(text);
        bucket
            .iter()
            .filter(|e| e.text().to_lowercase() == lowered)
            .filter(|e| text_all_caps || !is_all_uppercase(e.text()))
            .cloned()
            .collect()
    }

    // --- Suggestions ---

    /// Whether next-word prediction is in effect. Only engines that can
    /// predict the next word enable it, whatever the settings say.
    pub fn suggest_next_words(&self) -> bool {
        read(&self.store).supports_next_word()
    }

    fn warn_on_next_word_override(&self, settings: &Settings) {
        let effective = self.suggest_next_words();
        if settings.suggestions.suggest_next_words != effective {
            warn!(
                method = %settings.suggestions.method,
                effective,
                "suggest_next_words overridden by suggestion method"
            );
        }
    }

    /// Raw suggestions from the store. Engine failures are reported and
    /// yield an empty list.
    pub fn suggestions(&self, root: Option<&str>, next_word: bool) -> Vec<String> {
        match read(&self.store).suggestions(root, next_word) {
            Ok(s) => s,
            Err(e) => {
                self.report(&ServiceError::Engine(e));
                Vec::new()
            }
        }
    }

    /// Display-ready suggestions for the text typed so far.
    pub fn generate_suggestions(&self, text: &str, next_word: bool, shift: ShiftState) -> Vec<String> {
        let (suggest_words, max) = {
            let s = read(&self.settings);
            (s.suggestions.suggest_words, s.suggestions.max_suggestions)
        };
        if !suggest_words {
            return Vec::new();
        }
        let _span = debug_span!("generate_suggestions", next_word).entered();

        let (root, next_word) = if self.suggest_next_words() {
            (Some(text.to_string()), next_word)
        } else {
            (trailing_word(text), false)
        };
        let mut raw = self.suggestions(root.as_deref(), next_word);
        raw.truncate(max);
        debug!(raw = raw.len(), max, "suggestions generated");
        rank_suggestions(raw, text, next_word, shift, max)
    }

    // --- Capture ---

    /// Resolve a multi-key capture against the dictionary.
    ///
    /// `None` means no result at all: the scan was cancelled or failed.
    /// `min_count` is raised to the configured floor.
    pub fn map_capture_to_entries(
        &self,
        samples: &[CaptureSample],
        min_count: usize,
        reliable_first: Option<char>,
        reliable_last: Option<char>,
        token: &CancellationToken,
    ) -> Option<CaptureResult> {
        let options = {
            let s = read(&self.settings);
            ResolveOptions {
                min_count: min_count.max(s.capture.min_count),
                reliable: ReliableLetters::new(reliable_first, reliable_last),
                max_matches: s.suggestions.max_suggestions,
            }
        };
        let store = read(&self.store);
        match capture::resolve_with(samples, store.entries(), options, token, self.scorer.as_ref()) {
            Ok(result) => Some(result),
            Err(CaptureError::Cancelled) => {
                info!("capture resolution cancelled, returning nothing");
                None
            }
            Err(e) => {
                self.report(&ServiceError::Capture(e));
                None
            }
        }
    }

    pub fn method(&self) -> SuggestionMethod {
        read(&self.store).method()
    }
}

impl Drop for DictionaryService {
    fn drop(&mut self) {
        self.persist.stop();
    }
}

/// `(text, usage)` for every entry, sorted by text.
fn snapshot(store: &StoreKind) -> Vec<(String, u32)> {
    let mut entries: Vec<(String, u32)> = store
        .entries()
        .values()
        .flatten()
        .map(|e| (e.text().to_string(), e.usage_count()))
        .collect();
    entries.sort();
    entries
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}
