//! Settings loaded from TOML.
//!
//! - `init_custom(toml_content)` sets a custom TOML before first `settings()` call
//! - `settings()` returns `&'static Settings` (lazy-init singleton)
//! - Default values are embedded via `include_str!("default_settings.toml")`
//!
//! The dictionary service takes a `Settings` value rather than reading the
//! global, so tests and embedders can run several configurations side by side.

use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;

use serde::Deserialize;

use crate::dict::SuggestionMethod;

pub const DEFAULT_SETTINGS_TOML: &str = include_str!("default_settings.toml");

static CUSTOM_TOML: OnceLock<String> = OnceLock::new();

/// Set custom TOML before first `settings()` call.
pub fn init_custom(toml_content: String) -> Result<(), SettingsError> {
    parse_settings_toml(&toml_content)?;
    CUSTOM_TOML
        .set(toml_content)
        .map_err(|_| SettingsError::AlreadyInitialized)
}

/// Get or initialize the global settings singleton.
pub fn settings() -> &'static Settings {
    static INSTANCE: OnceLock<Settings> = OnceLock::new();
    INSTANCE.get_or_init(|| {
        let toml_str = CUSTOM_TOML
            .get()
            .map(|s| s.as_str())
            .unwrap_or(DEFAULT_SETTINGS_TOML);
        parse_settings_toml(toml_str).expect("settings TOML must be valid")
    })
}

/// Returns the embedded default settings TOML content.
pub fn default_toml() -> &'static str {
    DEFAULT_SETTINGS_TOML
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("settings already initialized")]
    AlreadyInitialized,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub dictionary: DictionarySettings,
    pub suggestions: SuggestionSettings,
    pub ngram: NGramSettings,
    pub capture: CaptureSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DictionarySettings {
    /// Language name, used as the dictionary file stem (e.g. `EnglishUK`).
    pub language: String,
    /// Per-user dictionaries. Empty means `$HOME/.local/share/gaze/dictionaries`.
    #[serde(default)]
    pub user_dir: String,
    /// Canonical word lists shipped with the application.
    pub original_dir: String,
    #[serde(default = "default_file_extension")]
    pub file_extension: String,
}

fn default_file_extension() -> String {
    "dic".to_string()
}

impl DictionarySettings {
    pub fn user_dir(&self) -> PathBuf {
        if !self.user_dir.is_empty() {
            return PathBuf::from(&self.user_dir);
        }
        let home = env::var_os("HOME").unwrap_or_else(|| "/tmp".into());
        PathBuf::from(home).join(".local/share/gaze/dictionaries")
    }

    fn file_name(&self) -> String {
        format!("{}.{}", self.language, self.file_extension)
    }

    /// `<user_dir>/<language>.<ext>`
    pub fn user_dictionary_path(&self) -> PathBuf {
        self.user_dir().join(self.file_name())
    }

    /// `<original_dir>/<language>.<ext>`
    pub fn original_dictionary_path(&self) -> PathBuf {
        PathBuf::from(&self.original_dir).join(self.file_name())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuggestionSettings {
    #[serde(default)]
    pub method: SuggestionMethod,
    /// Cap on suggestions and on capture matches.
    pub max_suggestions: usize,
    pub suggest_words: bool,
    pub suggest_next_words: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NGramSettings {
    pub gram_count: usize,
    pub leading_space_count: usize,
    pub trailing_space_count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureSettings {
    /// Floor for the adaptive dwell threshold.
    pub min_count: usize,
    /// Dwell time a key needs to count as deliberately visited.
    pub fixation_min_dwell_ms: u64,
    /// Captures running longer than this are aborted.
    pub max_duration_ms: u64,
}

pub fn parse_settings_toml(toml_str: &str) -> Result<Settings, SettingsError> {
    let s: Settings = toml::from_str(toml_str).map_err(|e| SettingsError::Parse(e.to_string()))?;
    validate(&s)?;
    Ok(s)
}

fn validate(s: &Settings) -> Result<(), SettingsError> {
    macro_rules! check_non_empty {
        ($section:ident . $field:ident) => {
            if s.$section.$field.trim().is_empty() {
                return Err(SettingsError::InvalidValue {
                    field: concat!(stringify!($section), ".", stringify!($field)).to_string(),
                    reason: "must not be empty".to_string(),
                });
            }
        };
    }
    macro_rules! check_positive {
        ($section:ident . $field:ident) => {
            if s.$section.$field == 0 {
                return Err(SettingsError::InvalidValue {
                    field: concat!(stringify!($section), ".", stringify!($field)).to_string(),
                    reason: "must be positive".to_string(),
                });
            }
        };
    }
    macro_rules! check_below_gram_count {
        ($field:ident) => {
            if s.ngram.$field >= s.ngram.gram_count {
                return Err(SettingsError::InvalidValue {
                    field: concat!("ngram.", stringify!($field)).to_string(),
                    reason: "must be less than ngram.gram_count".to_string(),
                });
            }
        };
    }

    check_non_empty!(dictionary.language);
    check_non_empty!(dictionary.original_dir);
    check_non_empty!(dictionary.file_extension);
    if s.dictionary.language.contains(['/', '\\']) {
        return Err(SettingsError::InvalidValue {
            field: "dictionary.language".to_string(),
            reason: "must not contain path separators".to_string(),
        });
    }

    check_positive!(suggestions.max_suggestions);

    check_positive!(ngram.gram_count);
    check_below_gram_count!(leading_space_count);
    check_below_gram_count!(trailing_space_count);

    check_positive!(capture.max_duration_ms);

    Ok(())
}
