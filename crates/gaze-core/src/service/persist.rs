//! Fire-and-forget persistence of user dictionaries.
//!
//! Jobs carry a snapshot of what to write, so the worker never touches the
//! live store. While the worker is stopped, jobs run inline on the caller.

use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use super::{ErrorSink, ServiceError};
use crate::dict::io;

pub(crate) enum PersistJob {
    /// Rewrite the whole user dictionary.
    SaveAll {
        path: PathBuf,
        entries: Vec<(String, u32)>,
    },
    /// Append one freshly learned word.
    Append { path: PathBuf, word: String },
    /// Acknowledge once every job queued before it has run.
    Flush(mpsc::Sender<()>),
}

struct Running {
    tx: mpsc::Sender<PersistJob>,
    handle: JoinHandle<()>,
}

pub(crate) struct PersistWorker {
    running: Mutex<Option<Running>>,
    /// Serialises every write to a user dictionary file.
    save_lock: Arc<Mutex<()>>,
    sink: Arc<dyn ErrorSink>,
}

impl PersistWorker {
    pub fn new(sink: Arc<dyn ErrorSink>) -> Self {
        Self {
            running: Mutex::new(None),
            save_lock: Arc::new(Mutex::new(())),
            sink,
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.running).is_some()
    }

    /// Spawn the worker thread unless it is already running.
    pub fn start(&self) {
        let mut running = lock(&self.running);
        if running.is_some() {
            return;
        }
        let (tx, rx) = mpsc::channel::<PersistJob>();
        let save_lock = Arc::clone(&self.save_lock);
        let sink = Arc::clone(&self.sink);
        let spawned = thread::Builder::new()
            .name("gaze-persist".into())
            .spawn(move || persist_worker(rx, &save_lock, sink.as_ref()));
        match spawned {
            Ok(handle) => {
                debug!("persistence worker started");
                *running = Some(Running { tx, handle });
            }
            Err(e) => warn!(error = %e, "failed to spawn persistence worker, writing inline"),
        }
    }

    /// Drain queued jobs and join the worker.
    pub fn stop(&self) {
        let Some(Running { tx, handle }) = lock(&self.running).take() else {
            return;
        };
        drop(tx);
        if handle.join().is_err() {
            warn!("persistence worker panicked");
        }
        debug!("persistence worker stopped");
    }

    pub fn submit(&self, job: PersistJob) {
        let job = match lock(&self.running).as_ref() {
            Some(running) => match running.tx.send(job) {
                Ok(()) => return,
                Err(mpsc::SendError(job)) => job,
            },
            None => job,
        };
        run_job(job, &self.save_lock, self.sink.as_ref());
    }

    /// Block until every job submitted so far has been written.
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = mpsc::channel();
        self.submit(PersistJob::Flush(ack_tx));
        let _ = ack_rx.recv();
    }

    /// Write `entries` now, on the calling thread.
    pub fn save_now(&self, path: &Path, entries: &[(String, u32)]) -> Result<usize, ServiceError> {
        save_all(path, entries, &self.save_lock)
    }
}

impl Drop for PersistWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn persist_worker(rx: mpsc::Receiver<PersistJob>, save_lock: &Mutex<()>, sink: &dyn ErrorSink) {
    while let Ok(job) = rx.recv() {
        run_job(job, save_lock, sink);
    }
}

fn run_job(job: PersistJob, save_lock: &Mutex<()>, sink: &dyn ErrorSink) {
    let result = match job {
        PersistJob::SaveAll { path, entries } => save_all(&path, &entries, save_lock).map(|_| ()),
        PersistJob::Append { path, word } => {
            let _guard = lock(save_lock);
            debug!(word = %word, path = %path.display(), "appending user dictionary entry");
            io::append_user_entry(&path, &word).map_err(|source| ServiceError::Save { path, source })
        }
        PersistJob::Flush(ack) => {
            let _ = ack.send(());
            Ok(())
        }
    };
    if let Err(e) = result {
        warn!(error = %e, "background persistence failed");
        sink.report(&e);
    }
}

/// Rewrite the user dictionary. An empty snapshot is never written, so a
/// broken or externally backed in-memory cache cannot wipe the file.
fn save_all(path: &Path, entries: &[(String, u32)], save_lock: &Mutex<()>) -> Result<usize, ServiceError> {
    let _guard = lock(save_lock);
    if entries.is_empty() {
        info!(path = %path.display(), "in-memory dictionary is empty, not saving");
        return Ok(0);
    }
    let written = io::write_user_dictionary(path, entries.iter().map(|(w, c)| (w.as_str(), *c)))
        .map_err(|source| ServiceError::Save {
            path: path.to_path_buf(),
            source,
        })?;
    info!(path = %path.display(), entries = written, "user dictionary saved");
    Ok(written)
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
