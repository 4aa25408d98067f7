//! Sample collection between the start and stop triggers of a capture.

use super::{CaptureError, CaptureSample};

/// Samples for one capture, bounded in duration so the resolver never
/// sees an unbounded sequence.
#[derive(Debug, Clone)]
pub struct CaptureSession {
    samples: Vec<CaptureSample>,
    max_duration_ms: u64,
}

impl CaptureSession {
    pub fn new(max_duration_ms: u64) -> Self {
        Self {
            samples: Vec::new(),
            max_duration_ms,
        }
    }

    /// Record a sample. Fails once the span from the first sample exceeds
    /// the maximum duration; the rejected sample is not kept.
    pub fn push(&mut self, sample: CaptureSample) -> Result<(), CaptureError> {
        if let Some(first) = self.samples.first() {
            let elapsed_ms = sample.timestamp_ms.saturating_sub(first.timestamp_ms);
            if elapsed_ms > self.max_duration_ms {
                return Err(CaptureError::Timeout {
                    elapsed_ms,
                    max_ms: self.max_duration_ms,
                });
            }
        }
        self.samples.push(sample);
        Ok(())
    }

    pub fn samples(&self) -> &[CaptureSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Span between first and last sample.
    pub fn duration_ms(&self) -> u64 {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => last.timestamp_ms.saturating_sub(first.timestamp_ms),
            _ => 0,
        }
    }

    pub fn finish(self) -> Vec<CaptureSample> {
        self.samples
    }
}

/// Samples a key needs to have been fixated for `dwell_ms`, given the
/// sampling rate observed over `samples`.
pub fn min_count_for(samples: &[CaptureSample], dwell_ms: u64) -> usize {
    let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
        return 0;
    };
    let span_ms = last.timestamp_ms.saturating_sub(first.timestamp_ms);
    if span_ms == 0 {
        return 0;
    }
    let per_ms = samples.len() as f64 / span_ms as f64;
    (per_ms * dwell_ms as f64).round() as usize
}

/// The letter a trigger sample contributes as a reliable endpoint.
pub fn reliable_letter(sample: &CaptureSample) -> Option<char> {
    sample.letter()
}
