use std::sync::Arc;

use gaze_core::dict::EntryRef;
use gaze_core::ranker::ShiftState;
use gaze_core::service::{DictionaryService, ErrorClass, LoadState, ServiceError};
use gaze_core::settings::Settings;
use tracing::info;
use unicode_width::UnicodeWidthStr;

/// Open the dictionary for `settings`, exiting if it cannot be loaded.
pub fn open_service(settings: Settings) -> DictionaryService {
    let sink = Arc::new(|e: &ServiceError| match e.class() {
        ErrorClass::Fatal => eprintln!("Error: {e}"),
        _ => eprintln!("Warning: {e}"),
    });
    let language = settings.dictionary.language.clone();
    let service = DictionaryService::new(settings, sink);
    info!(%language, method = %service.method(), state = ?service.state(), "dictionary opened");
    if service.state() != LoadState::Ready {
        std::process::exit(1);
    }
    service
}

/// Two columns, words padded to the widest display width.
pub fn format_entries(entries: &[EntryRef]) -> String {
    let width = entries.iter().map(|e| e.text().width()).max().unwrap_or(0);
    let mut out = String::new();
    for e in entries {
        let pad = width - e.text().width();
        out.push_str(&format!("{}{}  {}\n", e.text(), " ".repeat(pad), e.usage_count()));
    }
    out
}

pub fn list(service: &DictionaryService) {
    let entries: Vec<EntryRef> = service.all_entries().collect();
    if entries.is_empty() {
        println!("(empty)");
        return;
    }
    print!("{}", format_entries(&entries));
    println!("---");
    println!("{} entries", entries.len());
}

pub fn exists(service: &DictionaryService, word: &str) {
    if service.exists(word) {
        println!("Found: {word}");
    } else {
        println!("Not found: {word}");
        std::process::exit(1);
    }
}

pub fn add(service: &DictionaryService, word: &str) {
    if service.exists(word) {
        println!("Already exists: {word}");
        return;
    }
    service.add_new_entry(word);
    service.flush_background();
    println!("Added: {word}");
}

pub fn remove(service: &DictionaryService, word: &str) {
    if !service.exists(word) {
        println!("Not found: {word}");
        return;
    }
    service.remove_entry(word);
    let saved = die!(service.save_user_dictionary(), "Error saving user dictionary: {}");
    println!("{}", removal_message(word, saved));
}

/// Outcome line for `remove`. Nothing saved means the file was left as it was.
pub fn removal_message(word: &str, saved: usize) -> String {
    if saved == 0 {
        format!("Removed: {word} (dictionary is now empty, user dictionary file not updated)")
    } else {
        format!("Removed: {word}")
    }
}

pub fn suggest(service: &DictionaryService, text: &str, next_word: bool, shift: ShiftState) {
    let suggestions = service.generate_suggestions(text, next_word, shift);
    if suggestions.is_empty() {
        println!("(no suggestions)");
    }
    for (i, s) in suggestions.iter().enumerate() {
        println!("{:>2}. {s}", i + 1);
    }
}
