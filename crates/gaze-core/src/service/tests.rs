use std::fs;
use std::path::Path;
use std::sync::Mutex;

use super::*;
use crate::capture::Point;
use crate::dict::{PredictorError, SuggestionMethod};
use crate::settings::{parse_settings_toml, DEFAULT_SETTINGS_TOML};

type Reported = Arc<Mutex<Vec<(ErrorClass, String)>>>;

struct Fixture {
    dir: tempfile::TempDir,
    reported: Reported,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("original")).unwrap();
        Self {
            dir,
            reported: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn settings(&self, method: SuggestionMethod) -> Settings {
        let mut s = parse_settings_toml(DEFAULT_SETTINGS_TOML).unwrap();
        s.dictionary.user_dir = self.user_dir().to_string_lossy().into_owned();
        s.dictionary.original_dir = self.dir.path().join("original").to_string_lossy().into_owned();
        s.suggestions.method = method;
        s
    }

    fn user_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("user")
    }

    fn user_file(&self, language: &str) -> std::path::PathBuf {
        self.user_dir().join(format!("{language}.dic"))
    }

    fn write_original(&self, language: &str, content: &str) {
        let path = self.dir.path().join("original").join(format!("{language}.dic"));
        fs::write(path, content).unwrap();
    }

    fn write_user(&self, language: &str, content: &str) {
        fs::create_dir_all(self.user_dir()).unwrap();
        fs::write(self.user_file(language), content).unwrap();
    }

    fn sink(&self) -> Arc<dyn ErrorSink> {
        let reported = Arc::clone(&self.reported);
        Arc::new(move |e: &ServiceError| {
            reported.lock().unwrap().push((e.class(), e.to_string()));
        })
    }

    fn service(&self, method: SuggestionMethod) -> DictionaryService {
        DictionaryService::new(self.settings(method), self.sink())
    }

    fn classes(&self) -> Vec<ErrorClass> {
        self.reported.lock().unwrap().iter().map(|(c, _)| *c).collect()
    }
}

fn read_file(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

fn usage(service: &DictionaryService, text: &str) -> u32 {
    service
        .all_entries()
        .into_iter()
        .find(|e| e.text() == text)
        .map(|e| e.usage_count())
        .unwrap()
}

fn sweep(letters: &[&str]) -> Vec<CaptureSample> {
    let mut t = 0;
    let mut out = Vec::new();
    for letter in letters {
        for _ in 0..3 {
            out.push(CaptureSample::new(Point::new(t as f64, 0.0), Some(*letter), t));
            t += 10;
        }
    }
    out
}

// --- Loading ---

#[test]
fn bootstraps_from_word_list() {
    let fx = Fixture::new();
    fx.write_original("EnglishUK", "cat\ncatalog\ndog\na\n");
    let service = fx.service(SuggestionMethod::Basic);

    assert!(service.is_running());
    assert_eq!(service.state(), LoadState::Ready);
    assert!(service.exists("cat"));
    assert!(service.exists("  dog "));
    assert!(!service.exists("a"));
    assert!(!service.exists("Cat"));
    // The derived user dictionary is written by the worker.
    service.flush_background();
    assert_eq!(
        read_file(&fx.user_file("EnglishUK")),
        "cat|0\ncatalog|0\ndog|0\n"
    );
    assert!(fx.classes().is_empty());
}

#[test]
fn user_dictionary_preferred_over_word_list() {
    let fx = Fixture::new();
    fx.write_original("EnglishUK", "dog\n");
    fx.write_user("EnglishUK", "cat|5\nbroken\nmouse|x\n");
    let service = fx.service(SuggestionMethod::Basic);

    assert!(service.exists("cat"));
    assert!(service.exists("mouse"));
    assert!(!service.exists("dog"));
    assert_eq!(usage(&service, "cat"), 5);
    assert_eq!(usage(&service, "mouse"), 0);
}

#[test]
fn empty_user_dictionary_reloads_word_list() {
    for method in [SuggestionMethod::Basic, SuggestionMethod::NGram] {
        let fx = Fixture::new();
        fx.write_original("EnglishUK", "dog\n");
        fx.write_user("EnglishUK", "");
        let service = fx.service(method);
        assert!(service.exists("dog"), "{method}");
        service.flush_background();
        assert_eq!(read_file(&fx.user_file("EnglishUK")), "dog|0\n");
    }
}

#[test]
fn empty_user_dictionary_kept_for_presage() {
    let fx = Fixture::new();
    fx.write_original("EnglishUK", "dog\n");
    fx.write_user("EnglishUK", "");
    let service = fx.service(SuggestionMethod::Presage);
    assert_eq!(service.state(), LoadState::Ready);
    assert!(!service.exists("dog"));
    // Nothing to save, and the empty file is left alone.
    assert_eq!(service.save_user_dictionary().unwrap(), 0);
    assert_eq!(read_file(&fx.user_file("EnglishUK")), "");
}

type ThreadLog = Arc<Mutex<Vec<(ErrorClass, Option<String>)>>>;

fn thread_sink(log: &ThreadLog) -> Arc<dyn ErrorSink> {
    let log = Arc::clone(log);
    Arc::new(move |e: &ServiceError| {
        let thread = std::thread::current().name().map(str::to_string);
        log.lock().unwrap().push((e.class(), thread));
    })
}

#[test]
fn bootstrap_write_runs_on_the_worker_thread() {
    let fx = Fixture::new();
    fx.write_original("EnglishUK", "dog\n");
    // A plain file where the user directory should be makes every write fail.
    fs::write(fx.user_dir(), "not a directory").unwrap();
    let log = ThreadLog::default();
    let service = DictionaryService::new(fx.settings(SuggestionMethod::Basic), thread_sink(&log));
    assert_eq!(service.state(), LoadState::Ready);

    service.flush_background();
    assert_eq!(
        *log.lock().unwrap(),
        vec![(ErrorClass::RecoverableIo, Some("gaze-persist".to_string()))]
    );

    // Once stopped, writes happen on the caller.
    service.stop();
    log.lock().unwrap().clear();
    service.add_new_entry("zebra");
    let log = log.lock().unwrap();
    assert_eq!(log.len(), 1);
    assert_ne!(log[0].1.as_deref(), Some("gaze-persist"));
}

#[test]
fn missing_word_list_is_fatal() {
    let fx = Fixture::new();
    let service = fx.service(SuggestionMethod::Basic);
    assert_eq!(service.state(), LoadState::LoadFailed);
    assert_eq!(fx.classes(), vec![ErrorClass::Fatal]);
    assert_eq!(service.all_entries().len(), 0);
    assert!(matches!(
        service.load_dictionary(),
        Err(ServiceError::CanonicalMissing { .. })
    ));
}

#[test]
fn invalid_ngram_settings_are_fatal() {
    let fx = Fixture::new();
    fx.write_original("EnglishUK", "dog\n");
    let mut settings = fx.settings(SuggestionMethod::NGram);
    settings.ngram.gram_count = 2;
    let service = DictionaryService::new(settings, fx.sink());
    assert_eq!(service.state(), LoadState::LoadFailed);
    assert_eq!(fx.classes(), vec![ErrorClass::Fatal]);
}

#[test]
fn legacy_dictionary_migrated_on_construction() {
    let fx = Fixture::new();
    fx.write_original("EnglishUK", "dog\n");
    fx.write_user("BritishEnglish", "otter|4\n");
    let service = fx.service(SuggestionMethod::Basic);
    assert!(service.exists("otter"));
    assert!(!fx.user_file("BritishEnglish").exists());
}

#[test]
fn set_language_saves_and_reloads() {
    let fx = Fixture::new();
    fx.write_original("EnglishUK", "colour\n");
    fx.write_original("EnglishUS", "color\n");
    let service = fx.service(SuggestionMethod::Basic);
    service.increment_usage("colour");

    service.set_language("EnglishUS").unwrap();
    assert_eq!(service.state(), LoadState::Ready);
    assert!(service.exists("color"));
    assert!(!service.exists("colour"));
    assert_eq!(service.settings().dictionary.language, "EnglishUS");
    assert_eq!(read_file(&fx.user_file("EnglishUK")), "colour|1\n");

    assert!(service.set_language("Klingon").is_err());
    assert_eq!(service.state(), LoadState::LoadFailed);
}

// --- Entries ---

#[test]
fn add_new_entry_appends_in_background() {
    let fx = Fixture::new();
    fx.write_original("EnglishUK", "cat\n");
    let service = fx.service(SuggestionMethod::Basic);
    service.start();
    assert!(service.is_running());

    service.add_new_entry("zebra");
    service.add_new_entry("zebra");
    service.add_new_entry("   ");
    service.flush_background();

    assert!(service.exists("zebra"));
    assert_eq!(usage(&service, "zebra"), 1);
    assert_eq!(read_file(&fx.user_file("EnglishUK")), "cat|0\nzebra|1\n");

    service.stop();
    assert!(!service.is_running());
}

#[test]
fn padded_text_is_stored_trimmed() {
    let fx = Fixture::new();
    fx.write_user("EnglishUK", "cat|0\nword |3\n");
    let service = fx.service(SuggestionMethod::Basic);
    assert!(service.exists("word"));
    assert_eq!(usage(&service, "word"), 3);

    service.add_new_entry(" zebra ");
    assert!(service.exists("zebra"));
    assert!(service.exists(" zebra "));
    assert_eq!(usage(&service, "zebra"), 1);
    service.flush_background();
    assert_eq!(
        read_file(&fx.user_file("EnglishUK")),
        "cat|0\nword |3\nzebra|1\n"
    );

    service.remove_entry(" zebra ");
    assert!(!service.exists("zebra"));
    let texts: Vec<String> = service.all_entries().map(|e| e.text().to_string()).collect();
    assert_eq!(texts, vec!["cat", "word"]);
}

#[test]
fn remove_entry_by_exact_text() {
    let fx = Fixture::new();
    fx.write_original("EnglishUK", "cat\nCat\n");
    let service = fx.service(SuggestionMethod::Basic);
    service.remove_entry("CAT");
    assert_eq!(service.all_entries().len(), 2);
    service.remove_entry("Cat");
    assert!(!service.exists("Cat"));
    assert!(service.exists("cat"));
}

#[test]
fn all_entries_sorted_by_text() {
    let fx = Fixture::new();
    fx.write_original("EnglishUK", "pear\napple\nzoo\nmango\n");
    let service = fx.service(SuggestionMethod::NGram);
    let texts: Vec<String> = service
        .all_entries()
        .map(|e| e.text().to_string())
        .collect();
    assert_eq!(texts, vec!["apple", "mango", "pear", "zoo"]);
}

#[test]
fn all_entries_iterates_a_fresh_snapshot_per_call() {
    let fx = Fixture::new();
    fx.write_original("EnglishUK", "pear
apple
");
    let service = fx.service(SuggestionMethod::Basic);

    let before = service.all_entries();
    service.add_new_entry("zebra");
    service.remove_entry("pear");
    let texts: Vec<String> = before.map(|e| e.text().to_string()).collect();
    assert_eq!(texts, vec!["apple", "pear"]);

    let texts: Vec<String> = service.all_entries().map(|e| e.text().to_string()).collect();
    assert_eq!(texts, vec!["apple", "zebra"]);
}

#[test]
fn usage_prefers_exact_match() {
    let fx = Fixture::new();
    fx.write_user("EnglishUK", "apple|0\nApple|0\nAPPLE|0\n");
    let service = fx.service(SuggestionMethod::Basic);
    service.increment_usage("APPLE");
    assert_eq!(usage(&service, "APPLE"), 1);
    assert_eq!(usage(&service, "apple"), 0);
    assert_eq!(usage(&service, "Apple"), 0);
}

#[test]
fn usage_without_exact_match_skips_all_caps_entries() {
    let fx = Fixture::new();
    fx.write_user("EnglishUK", "apple|0\nAPPLE|0\n");
    let service = fx.service(SuggestionMethod::Basic);
    service.increment_usage("Apple");
    assert_eq!(usage(&service, "apple"), 1);
    assert_eq!(usage(&service, "APPLE"), 0);
}

#[test]
fn all_caps_text_matches_every_casing() {
    let fx = Fixture::new();
    fx.write_user("EnglishUK", "nasa|0\nNasa|2\n");
    let service = fx.service(SuggestionMethod::Basic);
    service.increment_usage("NASA");
    assert_eq!(usage(&service, "nasa"), 1);
    assert_eq!(usage(&service, "Nasa"), 3);
}

#[test]
fn decrement_floors_at_zero() {
    let fx = Fixture::new();
    fx.write_user("EnglishUK", "cat|1\n");
    let service = fx.service(SuggestionMethod::Basic);
    service.decrement_usage("cat");
    service.decrement_usage("cat");
    assert_eq!(usage(&service, "cat"), 0);
    service.decrement_usage("unknown");
    assert!(fx.classes().is_empty());
}

// --- Suggestions ---

#[test]
fn generate_suggestions_keeps_typed_word_first() {
    let fx = Fixture::new();
    fx.write_user("EnglishUK", "house|3\nhouses|0\nhorse|9\n");
    let service = fx.service(SuggestionMethod::Basic);
    let out = service.generate_suggestions("my hou", false, ShiftState::Up);
    assert_eq!(out, vec!["hou", "house", "houses"]);
    let out = service.generate_suggestions("my Hou", true, ShiftState::Up);
    assert_eq!(out, vec!["Hou", "House", "Houses"]);
}

#[test]
fn generate_suggestions_disabled() {
    let fx = Fixture::new();
    fx.write_user("EnglishUK", "house|3\n");
    let mut settings = fx.settings(SuggestionMethod::Basic);
    settings.suggestions.suggest_words = false;
    let service = DictionaryService::new(settings, fx.sink());
    assert!(service
        .generate_suggestions("hou", false, ShiftState::Up)
        .is_empty());
}

#[test]
fn next_word_policy_follows_method() {
    let fx = Fixture::new();
    fx.write_original("EnglishUK", "dog\n");
    let mut settings = fx.settings(SuggestionMethod::NGram);
    settings.suggestions.suggest_next_words = true;
    let ngram = DictionaryService::new(settings, fx.sink());
    assert!(!ngram.suggest_next_words());
    assert_eq!(ngram.method(), SuggestionMethod::NGram);
    assert!(fx.service(SuggestionMethod::Presage).suggest_next_words());
}

struct BrokenPredictor;

impl Predictor for BrokenPredictor {
    fn predict(&self, _past_stream: &str) -> Result<Vec<String>, PredictorError> {
        Err(PredictorError("no model".to_string()))
    }
}

#[test]
fn engine_failure_reported_and_empty() {
    let fx = Fixture::new();
    fx.write_original("EnglishUK", "dog\n");
    let service = DictionaryService::with_predictor(
        fx.settings(SuggestionMethod::Presage),
        Some(Arc::new(BrokenPredictor)),
        fx.sink(),
    );
    assert!(service.suggestions(Some("do"), false).is_empty());
    assert_eq!(fx.classes(), vec![ErrorClass::Engine]);
}

// --- Capture ---

#[test]
fn capture_maps_to_entries() {
    let fx = Fixture::new();
    fx.write_original("EnglishUK", "cat\ncatalog\n");
    let service = fx.service(SuggestionMethod::Basic);
    let samples = sweep(&["c", "a", "t"]);

    let result = service
        .map_capture_to_entries(&samples, 1, None, None, &CancellationToken::new())
        .unwrap();
    assert_eq!(result.points.len(), 9);
    assert_eq!(result.key, None);
    assert_eq!(
        result.suggestions,
        Some(vec!["cat".to_string(), "catalog".to_string()])
    );
}

#[test]
fn capture_single_letter_and_cancellation() {
    let fx = Fixture::new();
    fx.write_original("EnglishUK", "cat\ncatalog\n");
    let service = fx.service(SuggestionMethod::Basic);

    let result = service
        .map_capture_to_entries(&sweep(&["q"]), 1, None, None, &CancellationToken::new())
        .unwrap();
    assert_eq!(result.key.as_deref(), Some("q"));

    let in_flight = capture::InFlightCapture::new();
    let stale = in_flight.begin();
    let _fresh = in_flight.begin();
    let result = service.map_capture_to_entries(&sweep(&["c", "a", "t"]), 1, None, None, &stale);
    assert!(result.is_none());
    assert!(fx.classes().is_empty());
}

#[test]
fn capture_scan_panic_is_reported_as_aggregate() {
    let fx = Fixture::new();
    fx.write_original("EnglishUK", "cat\ncatalog\n");
    let service = fx
        .service(SuggestionMethod::Basic)
        .with_scorer(Arc::new(|_: &str, _: &str| -> f64 { panic!("scorer failed") }));

    let result =
        service.map_capture_to_entries(&sweep(&["c", "a", "t"]), 1, None, None, &CancellationToken::new());
    assert!(result.is_none());
    assert_eq!(fx.classes(), vec![ErrorClass::Aggregate]);
}

#[test]
fn cancelling_mid_scan_gives_no_result() {
    let fx = Fixture::new();
    fx.write_original("EnglishUK", "cat\ncatalog\ncot\n");
    let token = CancellationToken::new();
    let trigger = token.clone();
    let service = fx
        .service(SuggestionMethod::Basic)
        .with_scorer(Arc::new(move |capture: &str, hash: &str| {
            trigger.cancel();
            capture::similarity(capture, hash)
        }));

    let result = service.map_capture_to_entries(&sweep(&["c", "a", "t"]), 1, None, None, &token);
    assert!(result.is_none());
    assert!(token.is_cancelled());
    assert!(fx.classes().is_empty());
}

// --- Shutdown ---

#[test]
fn app_closing_saves_usage_counts() {
    let fx = Fixture::new();
    fx.write_original("EnglishUK", "cat\n");
    let service = fx.service(SuggestionMethod::Basic);
    service.start();
    service.increment_usage("cat");
    service.increment_usage("cat");
    service.on_app_closing();
    assert_eq!(read_file(&fx.user_file("EnglishUK")), "cat|2\n");
}
