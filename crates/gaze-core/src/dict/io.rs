//! Plain-text dictionary files.
//!
//! - user dictionaries: one `word|usageCount` per line;
//! - canonical word lists: one word per line, no count.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::info;

use super::DictError;

pub const COUNT_SEPARATOR: char = '|';

/// Legacy user dictionary names and their replacements.
const LEGACY_RENAMES: &[(&str, &str)] = &[
    ("AmericanEnglish", "EnglishUS"),
    ("BritishEnglish", "EnglishUK"),
    ("CanadianEnglish", "EnglishCanada"),
];

/// Parse a `word|count` line, trimming the word. A malformed count reads
/// as 0; lines without exactly one separator or with a blank word are
/// skipped.
pub fn parse_user_line(line: &str) -> Option<(String, u32)> {
    let mut fields = line.trim().split(COUNT_SEPARATOR);
    let (Some(word), Some(count), None) = (fields.next(), fields.next(), fields.next()) else {
        return None;
    };
    let word = word.trim();
    if word.is_empty() {
        return None;
    }
    Some((word.to_string(), count.trim().parse().unwrap_or(0)))
}

/// Parse a canonical word-list line. Entries must be longer than one character.
pub fn parse_original_line(line: &str) -> Option<&str> {
    let word = line.trim();
    (word.chars().count() > 1).then_some(word)
}

pub fn format_user_line(word: &str, count: u32) -> String {
    format!("{word}{COUNT_SEPARATOR}{count}")
}

/// Lazily read `(word, count)` pairs from a user dictionary. Read errors
/// are yielded in place so callers can keep what loaded before them.
pub fn user_entries(
    path: &Path,
) -> Result<impl Iterator<Item = Result<(String, u32), DictError>>, DictError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(reader.lines().filter_map(|line| match line {
        Ok(l) => parse_user_line(&l).map(Ok),
        Err(e) => Some(Err(DictError::Io(e))),
    }))
}

/// Lazily read words from a canonical word list.
pub fn original_entries(
    path: &Path,
) -> Result<impl Iterator<Item = Result<String, DictError>>, DictError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(reader.lines().filter_map(|line| match line {
        Ok(l) => parse_original_line(&l).map(|w| Ok(w.to_string())),
        Err(e) => Some(Err(DictError::Io(e))),
    }))
}

/// Atomic write: write to .tmp then rename.
pub fn write_user_dictionary<'a, I>(path: &Path, entries: I) -> Result<usize, DictError>
where
    I: IntoIterator<Item = (&'a str, u32)>,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    let mut written = 0;
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        for (word, count) in entries {
            writeln!(writer, "{}", format_user_line(word, count))?;
            written += 1;
        }
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(written)
}

/// Append a freshly learned word with a usage count of 1.
pub fn append_user_entry(path: &Path, word: &str) -> Result<(), DictError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", format_user_line(word, 1))?;
    Ok(())
}

/// Rename user dictionaries saved under legacy language names. When both
/// the legacy and the new file exist the new one is replaced.
/// Returns the number of files migrated.
pub fn migrate_legacy_dictionaries(user_dir: &Path, extension: &str) -> Result<usize, DictError> {
    let mut migrated = 0;
    for (old, new) in LEGACY_RENAMES {
        let old_path = user_dir.join(format!("{old}.{extension}"));
        let new_path = user_dir.join(format!("{new}.{extension}"));
        if !old_path.exists() {
            continue;
        }
        info!(path = %old_path.display(), "legacy user dictionary found");
        match fs::remove_file(&new_path) {
            Ok(()) => info!(path = %new_path.display(), "replaced existing user dictionary"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::rename(&old_path, &new_path)?;
        migrated += 1;
    }
    Ok(migrated)
}
