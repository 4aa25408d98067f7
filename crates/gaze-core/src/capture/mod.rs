//! Resolution of multi-key gaze captures to dictionary entries.
//!
//! A capture is the sequence of samples recorded while the user sweeps
//! across the keyboard to spell one word. Resolution runs in three stages:
//!
//! 1. [`dwell_histogram`]: letter samples grouped into runs per key;
//! 2. [`adaptive_threshold`] + [`filter_capture`]: drop keys the gaze only
//!    passed over, keeping trusted first/last letters;
//! 3. [`resolve`]: parallel, cancellable scan of every hash key scored by
//!    longest-common-subsequence similarity.

mod cancel;
mod lcs;
mod session;

use std::cmp::Ordering;
use std::panic::{self, AssertUnwindSafe};

use rayon::prelude::*;
use tracing::{debug, debug_span, info};

pub use cancel::{CancellationToken, InFlightCapture};
pub use lcs::{lcs_len, similarity};
pub use session::{min_count_for, reliable_letter, CaptureSession};

use crate::dict::{by_usage_desc, Entries};
use crate::normalize::first_normalized_char;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One timestamped sample of the gaze/pointer pipeline: where it was and
/// which key (if any) it landed on.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSample {
    pub point: Point,
    pub value: Option<String>,
    pub timestamp_ms: u64,
}

impl CaptureSample {
    pub fn new(point: Point, value: Option<&str>, timestamp_ms: u64) -> Self {
        Self {
            point,
            value: value.map(str::to_string),
            timestamp_ms,
        }
    }

    /// The key value as a letter, if it is exactly one alphabetic character.
    pub fn letter(&self) -> Option<char> {
        let mut chars = self.value.as_deref()?.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_alphabetic() => Some(c),
            _ => None,
        }
    }

    pub fn is_letter(&self) -> bool {
        self.letter().is_some()
    }
}

/// A run of consecutive samples on the same (normalized) letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DwellBin {
    pub normalized: char,
    pub original: char,
    pub count: usize,
}

/// Letters whose endpoints are trusted because the start/stop trigger
/// itself landed on them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReliableLetters {
    pub first: Option<char>,
    pub last: Option<char>,
}

impl ReliableLetters {
    pub fn new(first: Option<char>, last: Option<char>) -> Self {
        Self { first, last }
    }

    fn first_normalized(&self) -> Option<char> {
        self.first.and_then(normalize_char)
    }

    fn last_normalized(&self) -> Option<char> {
        self.last.and_then(normalize_char)
    }
}

fn normalize_char(c: char) -> Option<char> {
    first_normalized_char(c.encode_utf8(&mut [0; 4]))
}

/// Per-letter dwell profile of the traversal path. Non-letter samples are
/// ignored; revisiting a letter after leaving it starts a new bin.
pub fn dwell_histogram(samples: &[CaptureSample]) -> Vec<DwellBin> {
    let mut bins: Vec<DwellBin> = Vec::new();
    for letter in samples.iter().filter_map(CaptureSample::letter) {
        let Some(normalized) = normalize_char(letter) else {
            continue;
        };
        match bins.last_mut() {
            Some(bin) if bin.normalized == normalized => bin.count += 1,
            _ => bins.push(DwellBin {
                normalized,
                original: letter,
                count: 1,
            }),
        }
    }
    bins
}

/// Mean bin count, floored, and coerced up to `min_count`. Bins at the
/// ends matching the reliable letters are left out of the mean since
/// trigger timing over- or under-samples them.
pub fn adaptive_threshold(bins: &[DwellBin], reliable: ReliableLetters, min_count: usize) -> usize {
    let first = reliable.first_normalized();
    let last = reliable.last_normalized();
    let last_index = bins.len().saturating_sub(1);

    let counted: Vec<usize> = bins
        .iter()
        .enumerate()
        .filter(|(i, bin)| {
            !(*i == 0 && Some(bin.normalized) == first
                || *i == last_index && Some(bin.normalized) == last)
        })
        .map(|(_, bin)| bin.count)
        .collect();

    if counted.is_empty() {
        return min_count;
    }
    let mean = counted.iter().sum::<usize>() / counted.len();
    mean.max(min_count)
}

/// The capture reduced to the letters that passed the threshold.
/// `cleansed` holds normalized letters, `uncleansed` the letters as captured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredCapture {
    pub cleansed: String,
    pub uncleansed: String,
}

impl FilteredCapture {
    pub fn len(&self) -> usize {
        self.cleansed.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.cleansed.is_empty()
    }
}

/// Keep bins with `count >= threshold` in order, then make sure the
/// reliable letters open and close the result.
pub fn filter_capture(
    bins: &[DwellBin],
    threshold: usize,
    reliable: ReliableLetters,
) -> FilteredCapture {
    let kept: Vec<&DwellBin> = bins.iter().filter(|b| b.count >= threshold).collect();
    let mut out = FilteredCapture::default();

    if let (Some(cleansed), Some(original)) = (reliable.first_normalized(), reliable.first) {
        if kept.first().map(|b| b.normalized) != Some(cleansed) {
            out.cleansed.push(cleansed);
            out.uncleansed.push(original);
        }
    }

    out.cleansed.extend(kept.iter().map(|b| b.normalized));
    out.uncleansed.extend(kept.iter().map(|b| b.original));

    if let (Some(cleansed), Some(original)) = (reliable.last_normalized(), reliable.last) {
        if kept.last().map(|b| b.normalized) != Some(cleansed) {
            out.cleansed.push(cleansed);
            out.uncleansed.push(original);
        }
    }
    out
}

/// Outcome of a resolution that ran to completion.
///
/// - `key` is set when the capture reduced to a single letter;
/// - `suggestions` is set when the dictionary scan found matches;
/// - both `None`: nothing useful was captured.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CaptureResult {
    pub points: Vec<Point>,
    pub key: Option<String>,
    pub suggestions: Option<Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("capture exceeded {max_ms} ms (ran {elapsed_ms} ms)")]
    Timeout { elapsed_ms: u64, max_ms: u64 },

    #[error("capture resolution cancelled")]
    Cancelled,

    #[error("capture scan failed: {0}")]
    Aggregate(String),
}

/// Parameters of one resolution besides the samples themselves.
#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions {
    pub min_count: usize,
    pub reliable: ReliableLetters,
    pub max_matches: usize,
}

struct Scored<'a> {
    hash: &'a str,
    similarity: f64,
    last_letter_matches: bool,
}

/// Similarity of a filtered capture (first argument) to a hash key.
pub type Scorer = dyn Fn(&str, &str) -> f64 + Send + Sync;

/// Resolve `samples` against `entries`, scoring with [`similarity`].
///
/// Fails only with [`CaptureError::Cancelled`] or
/// [`CaptureError::Aggregate`]; no partial match list is ever returned.
pub fn resolve(
    samples: &[CaptureSample],
    entries: &Entries,
    options: ResolveOptions,
    token: &CancellationToken,
) -> Result<CaptureResult, CaptureError> {
    resolve_with(samples, entries, options, token, &similarity)
}

/// [`resolve`] with a custom scorer.
pub fn resolve_with(
    samples: &[CaptureSample],
    entries: &Entries,
    options: ResolveOptions,
    token: &CancellationToken,
    scorer: &Scorer,
) -> Result<CaptureResult, CaptureError> {
    let _span = debug_span!("resolve_capture", sample_count = samples.len()).entered();
    let points: Vec<Point> = samples.iter().map(|s| s.point).collect();

    let bins = dwell_histogram(samples);
    let threshold = adaptive_threshold(&bins, options.reliable, options.min_count);
    let filtered = filter_capture(&bins, threshold, options.reliable);
    debug!(bins = bins.len(), threshold, filtered = %filtered.cleansed);

    match filtered.len() {
        0 => {
            info!("capture reduces to nothing useful");
            return Ok(CaptureResult {
                points,
                key: None,
                suggestions: None,
            });
        }
        1 => {
            info!("capture reduces to a single letter");
            return Ok(CaptureResult {
                points,
                key: Some(filtered.uncleansed),
                suggestions: None,
            });
        }
        _ => {}
    }

    let scored = scan(entries, &filtered.cleansed, options.reliable, token, scorer)?;
    if token.is_cancelled() {
        return Err(CaptureError::Cancelled);
    }

    let matches: Vec<String> = scored
        .iter()
        .filter_map(|s| entries.get(s.hash))
        .flat_map(|bucket| by_usage_desc(bucket))
        .take(options.max_matches)
        .map(|e| e.text().to_string())
        .collect();
    for m in &matches {
        debug!(entry = %m, "capture match");
    }

    Ok(CaptureResult {
        points,
        key: None,
        suggestions: (!matches.is_empty()).then_some(matches),
    })
}

/// Score every hash passing the endpoint filter, best first.
fn scan<'a>(
    entries: &'a Entries,
    capture: &str,
    reliable: ReliableLetters,
    token: &CancellationToken,
    scorer: &Scorer,
) -> Result<Vec<Scored<'a>>, CaptureError> {
    let first = reliable.first_normalized();
    let last = reliable.last_normalized();
    let capture_last = capture.chars().last();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        entries
            .par_iter()
            .map(|(hash, _)| {
                if token.is_cancelled() {
                    return Err(CaptureError::Cancelled);
                }
                let hash_last = hash.chars().last();
                if first.is_some() && hash.chars().next() != first {
                    return Ok(None);
                }
                if last.is_some() && hash_last != last {
                    return Ok(None);
                }
                Ok(Some(Scored {
                    hash: hash.as_str(),
                    similarity: scorer(capture, hash),
                    last_letter_matches: hash_last.is_some() && hash_last == capture_last,
                }))
            })
            .filter_map(Result::transpose)
            .collect::<Result<Vec<_>, _>>()
    }));

    let mut scored = match outcome {
        Ok(result) => result?,
        Err(payload) => return Err(CaptureError::Aggregate(panic_message(&*payload))),
    };
    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then(b.last_letter_matches.cmp(&a.last_letter_matches))
            .then(a.hash.cmp(b.hash))
    });
    Ok(scored)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "worker panicked".to_string())
}
