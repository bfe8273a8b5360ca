//! Action dispatcher
//!
//! A single background task performs every outward action. The decision
//! path only enqueues onto an unbounded channel and gets an [`ActionHandle`]
//! back; it never waits on the network.
//!
//! The worker first brings the [`ActionSink`] to readiness (login, room
//! joins), retrying with a fixed delay until it succeeds. Actions submitted
//! in the meantime wait in the queue and then run in submission order.
//! A failing action completes its own handle with an error and is not
//! retried.
//!
//! ## Lock Usage
//!
//! Handle completion state is guarded by a `parking_lot::Mutex` that is
//! never held across `.await` or while running completion callbacks.

use crate::action::ModerationAction;
use crate::config::DispatcherSettings;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Failure reported by an [`ActionSink`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SinkError {
    message: String,
}

impl SinkError {
    /// Create a sink error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Why an action did not complete successfully.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The sink reported a failure while performing the action.
    #[error("action failed: {0}")]
    Sink(#[from] SinkError),

    /// The dispatcher stopped before the action ran.
    #[error("dispatcher shut down before the action ran")]
    Shutdown,
}

/// Outcome delivered to an [`ActionHandle`].
pub type ActionResult = Result<(), DispatchError>;

/// Destination for moderation actions, typically a chat client.
#[async_trait]
pub trait ActionSink: Send + Sync + 'static {
    /// Become able to perform actions (authenticate, join control rooms).
    async fn prepare(&self) -> Result<(), SinkError>;

    /// Perform one action.
    async fn perform(&self, action: &ModerationAction) -> Result<(), SinkError>;
}

/// Dispatcher tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Fixed delay between readiness attempts
    pub retry_delay: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(2),
        }
    }
}

impl From<&DispatcherSettings> for DispatcherConfig {
    fn from(settings: &DispatcherSettings) -> Self {
        Self {
            retry_delay: settings.retry_delay(),
        }
    }
}

/// Identifier for a submitted action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionId(Uuid);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

type Callback = Box<dyn FnOnce(&ActionResult) + Send>;

enum Slot {
    Pending(Vec<Callback>),
    Done(ActionResult),
}

struct Completion {
    slot: Mutex<Slot>,
    notify: Notify,
}

impl Completion {
    fn finish(&self, result: ActionResult) {
        let callbacks = {
            let mut slot = self.slot.lock();
            if matches!(*slot, Slot::Done(_)) {
                return;
            }
            match std::mem::replace(&mut *slot, Slot::Done(result.clone())) {
                Slot::Pending(callbacks) => callbacks,
                Slot::Done(_) => Vec::new(),
            }
        };
        for callback in callbacks {
            callback(&result);
        }
        self.notify.notify_waiters();
    }
}

/// Caller-side view of a submitted action.
#[derive(Clone)]
pub struct ActionHandle {
    id: ActionId,
    completion: Arc<Completion>,
}

impl ActionHandle {
    pub(crate) fn pending() -> (Self, Completer) {
        let completion = Arc::new(Completion {
            slot: Mutex::new(Slot::Pending(Vec::new())),
            notify: Notify::new(),
        });
        let handle = Self {
            id: ActionId(Uuid::new_v4()),
            completion: completion.clone(),
        };
        (
            handle,
            Completer {
                completion: Some(completion),
            },
        )
    }

    /// Identifier used in logs.
    pub fn id(&self) -> ActionId {
        self.id
    }

    /// Whether the action has finished, successfully or not.
    pub fn is_done(&self) -> bool {
        matches!(*self.completion.slot.lock(), Slot::Done(_))
    }

    /// The outcome, if finished.
    pub fn result(&self) -> Option<ActionResult> {
        match &*self.completion.slot.lock() {
            Slot::Done(result) => Some(result.clone()),
            Slot::Pending(_) => None,
        }
    }

    /// Run `callback` once the action finishes; immediately if it already has.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(&ActionResult) + Send + 'static,
    {
        let result = {
            let mut slot = self.completion.slot.lock();
            match &mut *slot {
                Slot::Pending(callbacks) => {
                    callbacks.push(Box::new(callback));
                    return;
                }
                Slot::Done(result) => result.clone(),
            }
        };
        callback(&result);
    }

    /// Wait for the outcome.
    pub async fn wait(&self) -> ActionResult {
        loop {
            let notified = self.completion.notify.notified();
            if let Some(result) = self.result() {
                return result;
            }
            notified.await;
        }
    }
}

impl fmt::Debug for ActionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionHandle")
            .field("id", &self.id)
            .field("done", &self.is_done())
            .finish()
    }
}

/// Worker-side completion; reports `Shutdown` if dropped unused.
pub(crate) struct Completer {
    completion: Option<Arc<Completion>>,
}

impl Completer {
    pub(crate) fn complete(mut self, result: ActionResult) {
        if let Some(completion) = self.completion.take() {
            completion.finish(result);
        }
    }
}

impl Drop for Completer {
    fn drop(&mut self) {
        if let Some(completion) = self.completion.take() {
            completion.finish(Err(DispatchError::Shutdown));
        }
    }
}

struct Job {
    id: ActionId,
    action: ModerationAction,
    completer: Completer,
}

/// Handle to the background worker.
pub struct ActionDispatcher {
    queue: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    ready: watch::Receiver<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ActionDispatcher {
    /// Start the worker on the current tokio runtime.
    pub fn spawn(sink: Arc<dyn ActionSink>, config: DispatcherConfig) -> Self {
        let (queue, jobs) = mpsc::unbounded_channel();
        let (ready_tx, ready) = watch::channel(false);
        let worker = tokio::spawn(run_worker(sink, config, jobs, ready_tx));
        Self {
            queue: Mutex::new(Some(queue)),
            ready,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queue `action` and return immediately.
    pub fn submit(&self, action: ModerationAction) -> ActionHandle {
        let (handle, completer) = ActionHandle::pending();
        debug!(
            action_id = %handle.id(),
            kind = %action.kind,
            target = %action.target,
            room = %action.message.room,
            "queued moderation action"
        );
        let job = Job {
            id: handle.id(),
            action,
            completer,
        };
        let rejected = match &*self.queue.lock() {
            Some(queue) => queue.send(job).err().map(|err| err.0),
            None => Some(job),
        };
        if let Some(job) = rejected {
            warn!(action_id = %handle.id(), "dispatcher is shut down; action dropped");
            drop(job);
        }
        handle
    }

    /// Whether the sink has become ready.
    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Wait until the sink is ready.
    pub async fn wait_ready(&self) -> Result<(), DispatchError> {
        let mut ready = self.ready.clone();
        ready
            .wait_for(|ready| *ready)
            .await
            .map(|_| ())
            .map_err(|_| DispatchError::Shutdown)
    }

    /// Stop accepting actions and wait for the queued ones to finish.
    ///
    /// Does not return until the sink has become ready and worked through
    /// the queue.
    pub async fn close(&self) {
        self.queue.lock().take();
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(err) = worker.await {
                warn!(error = %err, "action worker ended abnormally");
            }
        }
    }

    /// Stop the worker; queued actions complete with `Shutdown`.
    pub fn shutdown(&self) {
        self.queue.lock().take();
        if let Some(worker) = self.worker.lock().take() {
            worker.abort();
            info!("action dispatcher stopped");
        }
    }
}

impl Drop for ActionDispatcher {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.lock().take() {
            worker.abort();
        }
    }
}

impl fmt::Debug for ActionDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDispatcher")
            .field("ready", &self.is_ready())
            .field("accepting", &self.queue.lock().is_some())
            .field("running", &self.worker.lock().is_some())
            .finish()
    }
}

async fn run_worker(
    sink: Arc<dyn ActionSink>,
    config: DispatcherConfig,
    mut jobs: mpsc::UnboundedReceiver<Job>,
    ready: watch::Sender<bool>,
) {
    let mut attempt: u32 = 0;
    loop {
        attempt = attempt.saturating_add(1);
        match sink.prepare().await {
            Ok(()) => break,
            Err(err) => {
                warn!(
                    attempt,
                    error = %err,
                    retry_in_ms = config.retry_delay.as_millis() as u64,
                    "action sink not ready, retrying"
                );
                tokio::time::sleep(config.retry_delay).await;
            }
        }
    }
    ready.send_replace(true);
    info!(attempts = attempt, "action dispatcher ready");

    while let Some(Job {
        id,
        action,
        completer,
    }) = jobs.recv().await
    {
        let result = sink.perform(&action).await.map_err(DispatchError::from);
        match &result {
            Ok(()) => debug!(action_id = %id, kind = %action.kind, "moderation action completed"),
            Err(err) => warn!(
                action_id = %id,
                kind = %action.kind,
                target = %action.target,
                error = %err,
                "moderation action failed"
            ),
        }
        completer.complete(result);
    }
    debug!("action queue closed");
}
