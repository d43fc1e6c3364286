//! Diff service - owns the long-lived worker thread

use std::collections::HashSet;
use std::thread::JoinHandle;
use std::time::Duration;

use flume::{Receiver, RecvTimeoutError, Sender};
use log::{debug, warn};

use super::request::{ComparePayload, DiffConfig, DiffRequest, DiffResponse, RequestId};
use super::worker::diff_worker;
use crate::error::{CompareError, Result};

struct WorkerHandle {
    request_tx: Sender<DiffRequest>,
    response_rx: Receiver<DiffResponse>,
    thread: Option<JoinHandle<()>>,
}

/// Lazily started diff worker with request bookkeeping.
///
/// The worker thread is spawned on the first request and reused for later
/// ones. Responses for requests that are no longer pending are dropped.
pub struct DiffService {
    worker: Option<WorkerHandle>,
    defaults: DiffConfig,
    next_request_id: u64,
    pending: HashSet<RequestId>,
}

impl Default for DiffService {
    fn default() -> Self {
        Self::new(DiffConfig::default())
    }
}

impl DiffService {
    #[must_use]
    pub fn new(defaults: DiffConfig) -> Self {
        Self {
            worker: None,
            defaults,
            next_request_id: 1,
            pending: HashSet::new(),
        }
    }

    #[must_use]
    pub fn defaults(&self) -> &DiffConfig {
        &self.defaults
    }

    /// Whether a worker thread is currently attached
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    #[must_use]
    pub fn is_pending(&self, id: RequestId) -> bool {
        self.pending.contains(&id)
    }

    fn next_id(&mut self) -> RequestId {
        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;
        id
    }

    fn acquire(&mut self) -> Result<&WorkerHandle> {
        if self.worker.is_none() {
            let (request_tx, request_rx) = flume::unbounded();
            let (response_tx, response_rx) = flume::unbounded();
            let defaults = self.defaults;
            let thread = std::thread::Builder::new()
                .name("pagediff-diff".to_string())
                .spawn(move || diff_worker(request_rx, response_tx, defaults))?;
            debug!("Diff worker started");
            self.worker = Some(WorkerHandle {
                request_tx,
                response_rx,
                thread: Some(thread),
            });
        }
        self.worker.as_ref().ok_or(CompareError::Disconnected)
    }

    /// Queue a comparison, starting the worker if needed
    pub fn submit(&mut self, payload: ComparePayload) -> Result<RequestId> {
        let id = self.next_id();
        let sent = self
            .acquire()?
            .request_tx
            .send(DiffRequest::Compare { id, payload });
        if sent.is_err() {
            warn!("Diff worker went away, dropping handle");
            self.worker = None;
            return Err(CompareError::Disconnected);
        }
        self.pending.insert(id);
        Ok(id)
    }

    /// Forget a request; its late responses will be discarded
    pub fn cancel(&mut self, id: RequestId) {
        self.pending.remove(&id);
    }

    /// Wait up to `timeout` for the next response of a pending request.
    ///
    /// Returns `Ok(None)` on timeout.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<DiffResponse>> {
        let Some(rx) = self.worker.as_ref().map(|w| w.response_rx.clone()) else {
            return Err(CompareError::Disconnected);
        };
        loop {
            match rx.recv_timeout(timeout) {
                Ok(response) => {
                    if let Some(response) = self.accept(response) {
                        return Ok(Some(response));
                    }
                }
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("Diff worker disconnected");
                    self.worker = None;
                    self.pending.clear();
                    return Err(CompareError::Disconnected);
                }
            }
        }
    }

    /// Drain responses that are already queued
    pub fn poll_responses(&mut self) -> Vec<DiffResponse> {
        let Some(worker) = self.worker.as_ref() else {
            return Vec::new();
        };
        let queued: Vec<DiffResponse> = worker.response_rx.try_iter().collect();
        queued
            .into_iter()
            .filter_map(|response| self.accept(response))
            .collect()
    }

    fn accept(&mut self, response: DiffResponse) -> Option<DiffResponse> {
        let id = response.id();
        if !self.pending.contains(&id) {
            debug!("Dropping stale diff response for {id}");
            return None;
        }
        if response.is_terminal() {
            self.pending.remove(&id);
        }
        Some(response)
    }

    /// Stop the worker. The next `submit` starts a fresh one.
    pub fn terminate(&mut self) {
        self.pending.clear();
        if let Some(mut worker) = self.worker.take() {
            let _ = worker.request_tx.send(DiffRequest::Shutdown);
            // A busy worker finishes its current request on its own; only
            // join when it is already idle.
            if let Some(thread) = worker.thread.take() {
                if thread.is_finished() {
                    let _ = thread.join();
                }
            }
            debug!("Diff worker terminated");
        }
    }
}

impl Drop for DiffService {
    fn drop(&mut self) {
        self.terminate();
    }
}
