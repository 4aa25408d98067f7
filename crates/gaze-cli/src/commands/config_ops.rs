use std::fs;
use std::path::Path;

use gaze_core::settings::{self, Settings};

use super::CliError;

/// Install `file` as the global settings, or the embedded defaults when `None`.
pub fn load_settings(file: Option<&Path>) -> Result<&'static Settings, CliError> {
    if let Some(path) = file {
        let content = fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        settings::init_custom(content)?;
    }
    Ok(settings::settings())
}

pub fn settings_export() {
    print!("{}", settings::default_toml());
}

pub fn settings_validate(file: &str) {
    let content = die!(fs::read_to_string(file), "Error reading {file}: {}");
    let s = die!(settings::parse_settings_toml(&content), "Error: {}");
    println!(
        "OK: language={}, method={}, max_suggestions={}, ngram={}/{}/{}",
        s.dictionary.language,
        s.suggestions.method,
        s.suggestions.max_suggestions,
        s.ngram.gram_count,
        s.ngram.leading_space_count,
        s.ngram.trailing_space_count,
    );
}
