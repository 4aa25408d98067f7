use std::fs;
use std::path::Path;

use gaze_core::capture::{min_count_for, CancellationToken, CaptureResult, CaptureSample, Point};
use gaze_core::service::DictionaryService;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::CliError;

/// One sample as recorded to JSON.
#[derive(Debug, Deserialize)]
pub struct RecordedSample {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub value: Option<String>,
    pub timestamp_ms: u64,
}

impl From<RecordedSample> for CaptureSample {
    fn from(r: RecordedSample) -> Self {
        CaptureSample {
            point: Point::new(r.x, r.y),
            value: r.value,
            timestamp_ms: r.timestamp_ms,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResolveReport {
    pub points: usize,
    pub min_count: usize,
    pub key: Option<String>,
    pub suggestions: Option<Vec<String>>,
}

impl ResolveReport {
    fn new(result: CaptureResult, min_count: usize) -> Self {
        Self {
            points: result.points.len(),
            min_count,
            key: result.key,
            suggestions: result.suggestions,
        }
    }
}

pub fn parse_samples(json: &str) -> Result<Vec<CaptureSample>, CliError> {
    let recorded: Vec<RecordedSample> = serde_json::from_str(json)?;
    Ok(recorded.into_iter().map(CaptureSample::from).collect())
}

pub fn load_samples(path: &Path) -> Result<Vec<CaptureSample>, CliError> {
    let content = fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_samples(&content)
}

/// Resolve a recorded capture. Without `--min-count` the threshold floor is
/// derived from the sampling rate and the configured fixation dwell.
pub fn resolve(
    service: &DictionaryService,
    file: &str,
    first: Option<char>,
    last: Option<char>,
    min_count: Option<usize>,
    json: bool,
) {
    let samples = die!(load_samples(Path::new(file)), "Error: {}");
    debug!(file, samples = samples.len(), "capture loaded");
    let min_count = min_count.unwrap_or_else(|| {
        let dwell = service.settings().capture.fixation_min_dwell_ms;
        min_count_for(&samples, dwell)
    });

    let token = CancellationToken::new();
    let Some(result) = service.map_capture_to_entries(&samples, min_count, first, last, &token)
    else {
        eprintln!("Error: capture resolution produced no result");
        std::process::exit(1);
    };
    let report = ResolveReport::new(result, min_count);

    if json {
        let out = die!(serde_json::to_string_pretty(&report), "Error: {}");
        println!("{out}");
        return;
    }
    match (&report.key, &report.suggestions) {
        (Some(key), _) => println!("Key: {key}"),
        (None, Some(suggestions)) => {
            for (i, s) in suggestions.iter().enumerate() {
                println!("{:>2}. {s}", i + 1);
            }
        }
        (None, None) => println!("(nothing captured)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_recorded_samples() {
        let json = r#"[
            {"x": 10.0, "y": 20.5, "value": "h", "timestamp_ms": 0},
            {"x": 11.0, "y": 20.0, "value": null, "timestamp_ms": 16},
            {"x": 12.0, "y": 19.0, "timestamp_ms": 32}
        ]"#;
        let samples = parse_samples(json).unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].letter(), Some('h'));
        assert_eq!(samples[0].point, Point::new(10.0, 20.5));
        assert_eq!(samples[1].value, None);
        assert_eq!(samples[2].timestamp_ms, 32);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let err = parse_samples(r#"[{"x": 1}]"#).unwrap_err();
        assert!(matches!(err, CliError::Json(_)));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_samples(&dir.path().join("none.json")).unwrap_err();
        assert!(matches!(err, CliError::Read { .. }));
    }
}
