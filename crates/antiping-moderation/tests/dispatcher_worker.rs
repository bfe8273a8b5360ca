//! Action Dispatcher Tests
//!
//! These tests drive the background worker through a scripted sink:
//!
//! - Readiness is retried with the fixed delay until the sink comes up
//! - Actions queued before readiness run afterwards, in submission order
//! - A failing action surfaces on its own handle and does not stall the queue
//! - Shutdown completes outstanding handles instead of leaving them pending
//! - Closing drains the queue before the worker exits

use antiping_moderation::{
    ActionDispatcher, ActionKind, ActionSink, DispatchError, DispatcherConfig, ModerationAction,
    OutboundMessage, SinkError,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

// =============================================================================
// Scripted Sink
// =============================================================================

/// Sink that fails `prepare` a fixed number of times and rejects actions
/// addressed to `reject_target`.
struct ScriptedSink {
    prepare_failures: usize,
    prepare_calls: AtomicUsize,
    reject_target: Option<String>,
    performed: Mutex<Vec<String>>,
}

impl ScriptedSink {
    fn new(prepare_failures: usize) -> Self {
        Self {
            prepare_failures,
            prepare_calls: AtomicUsize::new(0),
            reject_target: None,
            performed: Mutex::new(Vec::new()),
        }
    }

    fn rejecting(mut self, target: &str) -> Self {
        self.reject_target = Some(target.to_owned());
        self
    }

    fn performed(&self) -> Vec<String> {
        self.performed.lock().clone()
    }
}

#[async_trait]
impl ActionSink for ScriptedSink {
    async fn prepare(&self) -> Result<(), SinkError> {
        let call = self.prepare_calls.fetch_add(1, Ordering::SeqCst);
        if call < self.prepare_failures {
            Err(SinkError::new("login refused"))
        } else {
            Ok(())
        }
    }

    async fn perform(&self, action: &ModerationAction) -> Result<(), SinkError> {
        if self.reject_target.as_deref() == Some(action.target.as_str()) {
            return Err(SinkError::new("forbidden"));
        }
        self.performed.lock().push(action.target.clone());
        Ok(())
    }
}

fn notice(target: &str) -> ModerationAction {
    ModerationAction::new(
        ActionKind::LogNotice,
        target,
        OutboundMessage::text("!log:example.org", format!("{target} noticed")).as_notice(),
    )
}

fn config() -> DispatcherConfig {
    DispatcherConfig {
        retry_delay: Duration::from_secs(2),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_readiness_retries_with_fixed_delay() {
    let sink = Arc::new(ScriptedSink::new(3));
    let started = Instant::now();
    let dispatcher = ActionDispatcher::spawn(sink.clone(), config());

    let early = dispatcher.submit(notice("@early:example.org"));
    assert!(!dispatcher.is_ready());

    dispatcher.wait_ready().await.unwrap();
    assert!(dispatcher.is_ready());
    assert_eq!(sink.prepare_calls.load(Ordering::SeqCst), 4);
    assert!(started.elapsed() >= Duration::from_secs(6));

    assert_eq!(early.wait().await, Ok(()));
    assert_eq!(sink.performed(), vec!["@early:example.org".to_owned()]);
}

#[tokio::test]
async fn test_actions_run_in_submission_order() {
    let sink = Arc::new(ScriptedSink::new(0));
    let dispatcher = ActionDispatcher::spawn(sink.clone(), config());

    let targets: Vec<String> = (0..16).map(|i| format!("@u{i}:example.org")).collect();
    let handles: Vec<_> = targets
        .iter()
        .map(|target| dispatcher.submit(notice(target)))
        .collect();

    for handle in &handles {
        assert_eq!(handle.wait().await, Ok(()));
    }
    assert_eq!(sink.performed(), targets);
}

#[tokio::test]
async fn test_failure_surfaces_on_its_handle_only() {
    let sink = Arc::new(ScriptedSink::new(0).rejecting("@bad:example.org"));
    let dispatcher = ActionDispatcher::spawn(sink.clone(), config());

    let bad = dispatcher.submit(notice("@bad:example.org"));
    let good = dispatcher.submit(notice("@good:example.org"));

    assert_eq!(
        bad.wait().await,
        Err(DispatchError::Sink(SinkError::new("forbidden")))
    );
    assert_eq!(good.wait().await, Ok(()));
    assert!(bad.is_done());
    assert_eq!(sink.performed(), vec!["@good:example.org".to_owned()]);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_completes_pending_handles() {
    // Never becomes ready, so the action stays queued
    let sink = Arc::new(ScriptedSink::new(usize::MAX));
    let dispatcher = ActionDispatcher::spawn(sink, config());

    let queued = dispatcher.submit(notice("@queued:example.org"));
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(!queued.is_done());

    dispatcher.shutdown();
    assert_eq!(queued.wait().await, Err(DispatchError::Shutdown));
    assert_eq!(dispatcher.wait_ready().await, Err(DispatchError::Shutdown));

    let late = dispatcher.submit(notice("@late:example.org"));
    assert_eq!(late.wait().await, Err(DispatchError::Shutdown));
}

#[tokio::test]
async fn test_close_drains_queue() {
    let sink = Arc::new(ScriptedSink::new(0));
    let dispatcher = ActionDispatcher::spawn(sink.clone(), config());

    let handles: Vec<_> = (0..3)
        .map(|i| dispatcher.submit(notice(&format!("@u{i}:example.org"))))
        .collect();
    dispatcher.close().await;

    for handle in &handles {
        assert_eq!(handle.result(), Some(Ok(())));
    }
    assert_eq!(sink.performed().len(), 3);

    let rejected = dispatcher.submit(notice("@after:example.org"));
    assert_eq!(rejected.result(), Some(Err(DispatchError::Shutdown)));
}
