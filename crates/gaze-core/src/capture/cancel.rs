use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Owner of the token for the capture currently being resolved.
///
/// Starting a new capture cancels the previous one, so at most one scan
/// is ever live per owner.
#[derive(Debug, Default)]
pub struct InFlightCapture {
    current: Mutex<Option<CancellationToken>>,
}

impl InFlightCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel any in-flight capture and hand out a fresh token.
    pub fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = current.replace(token.clone()) {
            previous.cancel();
        }
        token
    }

    /// Cancel the in-flight capture, if any.
    pub fn cancel(&self) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = current.take() {
            previous.cancel();
        }
    }
}

impl Drop for InFlightCapture {
    fn drop(&mut self) {
        self.cancel();
    }
}
