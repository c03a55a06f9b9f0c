//! Single-flight stage queue.
//!
//! Every stage runs one worker thread that takes requests from an unbounded
//! FIFO one at a time. Responses leave in the order requests arrived, and at
//! most one request per stage is ever being processed.

use crate::pipeline::error::{ErrorReporter, StageError};
use crate::pipeline::types::{StageEvent, StageRequest};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A processing stage of the pipeline.
///
/// Each stage owns its engine and is driven by exactly one worker thread.
pub trait Stage: Send + 'static {
    /// The request type this stage receives.
    type Request: Send + 'static;
    /// The response type this stage produces.
    type Response: Send + 'static;

    /// Processes a single request.
    ///
    /// Returns:
    /// - `Ok(Some(response))` - Successfully processed and produced a response
    /// - `Ok(None)` - Successfully processed but nothing to pass on (e.g. silence)
    /// - `Err(StageError)` - Processing failed
    fn process(&mut self, request: Self::Request) -> Result<Option<Self::Response>, StageError>;

    /// Returns the name of this stage for logging and error reporting.
    fn name(&self) -> &'static str;

    /// Called once when the worker exits.
    fn shutdown(&mut self) {}
}

/// Point-in-time view of a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageStatus {
    pub name: &'static str,
    pub pending: usize,
    pub busy: bool,
    pub stopped: bool,
}

/// Runs a [`Stage`] behind a single-consumer request queue.
pub struct StageQueue<S: Stage> {
    name: &'static str,
    requests_tx: Sender<StageRequest<S::Request>>,
    /// Kept for draining on stop.
    requests_rx: Receiver<StageRequest<S::Request>>,
    cancel: CancellationToken,
    busy: Arc<AtomicBool>,
    /// Serializes enqueue against stop so nothing lands after the drain.
    gate: Arc<Mutex<()>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<S: Stage> StageQueue<S> {
    /// Spawns the worker thread for `stage`.
    ///
    /// # Arguments
    /// * `stage` - The stage implementation to run
    /// * `events_tx` - Channel receiving one event per processed request
    /// * `error_reporter` - Reporter for failures
    /// * `poll_interval` - Longest the idle worker waits before re-checking for stop
    pub fn spawn(
        mut stage: S,
        events_tx: Sender<StageEvent<S::Response>>,
        error_reporter: Arc<dyn ErrorReporter>,
        poll_interval: Duration,
    ) -> Self {
        let name = stage.name();
        let (requests_tx, requests_rx) = unbounded();
        let cancel = CancellationToken::new();
        let busy = Arc::new(AtomicBool::new(false));
        let gate = Arc::new(Mutex::new(()));

        let worker = Worker {
            name,
            requests: requests_rx.clone(),
            events: events_tx,
            reporter: error_reporter,
            cancel: cancel.clone(),
            busy: Arc::clone(&busy),
            gate: Arc::clone(&gate),
            poll_interval,
        };
        let handle = thread::Builder::new()
            .name(format!("facetalk-{}", name))
            .spawn(move || worker.run(&mut stage));

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!(stage = name, error = %e, "failed to spawn stage worker");
                cancel.cancel();
                None
            }
        };

        Self {
            name,
            requests_tx,
            requests_rx,
            cancel,
            busy,
            gate,
            handle: Mutex::new(handle),
        }
    }

    /// Appends a request. Returns `false` (and drops it) once stopped.
    pub fn enqueue(&self, payload: S::Request) -> bool {
        let _gate = self.gate.lock().unwrap_or_else(|e| e.into_inner());
        if self.cancel.is_cancelled() {
            tracing::debug!(stage = self.name, "dropping request for stopped stage");
            return false;
        }
        self.requests_tx.send(StageRequest::new(payload)).is_ok()
    }

    /// Requests waiting behind the one in flight.
    pub fn pending(&self) -> usize {
        self.requests_rx.len()
    }

    /// Whether a request is being processed right now.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn status(&self) -> StageStatus {
        StageStatus {
            name: self.name,
            pending: self.pending(),
            busy: self.is_busy(),
            stopped: self.is_stopped(),
        }
    }

    /// Stops accepting work and drops everything still queued.
    ///
    /// The in-flight request, if any, runs to completion; [`join`](Self::join)
    /// waits for it.
    pub fn stop(&self) {
        close(self.name, &self.gate, &self.cancel, &self.requests_rx);
    }

    /// Waits for the worker thread to exit.
    pub fn join(&self) -> Result<(), String> {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        match handle {
            Some(handle) => handle
                .join()
                .map_err(|_| format!("Stage '{}' thread panicked", self.name)),
            None => Ok(()),
        }
    }

    /// Stops and joins.
    pub fn shutdown(&self) -> Result<(), String> {
        self.stop();
        self.join()
    }
}

impl<S: Stage> Drop for StageQueue<S> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Cancels and drops whatever is still queued, under the enqueue gate.
fn close<T>(
    name: &'static str,
    gate: &Mutex<()>,
    cancel: &CancellationToken,
    requests: &Receiver<T>,
) {
    let _gate = gate.lock().unwrap_or_else(|e| e.into_inner());
    cancel.cancel();
    let dropped = requests.try_iter().count();
    if dropped > 0 {
        tracing::debug!(stage = name, dropped, "discarded queued requests");
    }
}

struct Worker<Req, Resp> {
    name: &'static str,
    requests: Receiver<StageRequest<Req>>,
    events: Sender<StageEvent<Resp>>,
    reporter: Arc<dyn ErrorReporter>,
    cancel: CancellationToken,
    busy: Arc<AtomicBool>,
    gate: Arc<Mutex<()>>,
    poll_interval: Duration,
}

impl<Req, Resp> Worker<Req, Resp> {
    fn run<S>(self, stage: &mut S)
    where
        S: Stage<Request = Req, Response = Resp>,
    {
        let name = self.name;
        tracing::debug!(stage = name, "stage worker started");

        // Only this thread flips it; `busy` mirrors it for observers.
        let mut processing = false;

        while !self.cancel.is_cancelled() {
            let request = match self.requests.recv_timeout(self.poll_interval) {
                Ok(request) => request,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            if self.cancel.is_cancelled() {
                break;
            }

            debug_assert!(!processing);
            processing = true;
            self.busy.store(processing, Ordering::SeqCst);
            tracing::trace!(
                stage = name,
                waited_ms = request.enqueued_at.elapsed().as_millis() as u64,
                "processing request"
            );

            let result = stage.process(request.payload);

            let (event, fatal) = match result {
                Ok(Some(response)) => (Some(StageEvent::Completed(response)), false),
                Ok(None) => (None, false),
                Err(error) => {
                    self.reporter.report(name, &error);
                    let fatal = matches!(error, StageError::Fatal(_));
                    let event = StageEvent::Failed {
                        stage: name,
                        message: error.message().to_string(),
                    };
                    (Some(event), fatal)
                }
            };

            // Busy until the outcome is published.
            let delivered = event.is_none_or(|event| self.events.send(event).is_ok());
            processing = false;
            self.busy.store(processing, Ordering::SeqCst);
            if !delivered {
                tracing::debug!(stage = name, "event receiver gone, stopping");
                break;
            }
            if fatal {
                close(self.name, &self.gate, &self.cancel, &self.requests);
                break;
            }
        }

        stage.shutdown();
        tracing::debug!(stage = name, "stage worker stopped");
    }
}
