// Offline replay of newline-delimited events

use crate::sink::TracingSink;
use anyhow::Context;
use antiping_core::{ManualClock, PhysicalClock, Timestamp};
use antiping_moderation::{
    ActionDispatcher, BackgroundTasks, Config, DispatcherConfig, ModerationEngine,
};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{info, warn};

/// Score every event in `input` (stdin if `None`) and print one JSON line
/// per event. Actions go to the tracing sink and are drained before exit.
///
/// Time is taken from the events themselves: the engine's clock follows
/// each event's `origin_server_ts`, so recorded history replays as it
/// happened rather than as already expired.
pub async fn run(config_path: &Path, input: Option<&Path>) -> anyhow::Result<()> {
    let config = Config::load(config_path)
        .with_context(|| format!("configuration {} rejected", config_path.display()))?;

    let sink = Arc::new(TracingSink::new(config.bot_user_id()));
    let dispatcher = Arc::new(ActionDispatcher::spawn(
        sink,
        DispatcherConfig::from(&config.dispatcher),
    ));
    let clock = ManualClock::default();
    let engine = ModerationEngine::new(config, dispatcher.clone(), Arc::new(clock.clone()))?;
    let tasks = BackgroundTasks::new();
    engine.spawn_gc(&tasks);

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let mut stdout = tokio::io::stdout();
    let summary = replay(&engine, &clock, reader, &mut stdout).await?;

    tasks.shutdown();
    dispatcher.close().await;
    info!(
        lines = summary.lines,
        spam = summary.spam,
        tracked = engine.registry().len(),
        replayed_until = %clock.now(),
        "replay finished"
    );
    Ok(())
}

/// Totals for one replay.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct ReplaySummary {
    lines: usize,
    spam: usize,
}

/// Score each line of `reader` and write its record to `out`.
async fn replay<R, W>(
    engine: &ModerationEngine,
    clock: &ManualClock,
    reader: R,
    out: &mut W,
) -> anyhow::Result<ReplaySummary>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut summary = ReplaySummary::default();
    while let Some(line) = lines.next_line().await.context("failed to read events")? {
        summary.lines += 1;
        if line.trim().is_empty() {
            continue;
        }
        let record = score_line(engine, clock, summary.lines, &line);
        if record.get("verdict").and_then(|v| v.get("verdict")) == Some(&json!("spam")) {
            summary.spam += 1;
        }
        out.write_all(format!("{record}\n").as_bytes()).await?;
    }
    out.flush().await?;
    Ok(summary)
}

/// Verdict record for one input line. Failures become `error` records so
/// one bad line does not stop the replay.
fn score_line(
    engine: &ModerationEngine,
    clock: &ManualClock,
    line_no: usize,
    line: &str,
) -> Value {
    let event: Value = match serde_json::from_str(line) {
        Ok(event) => event,
        Err(err) => {
            warn!(line = line_no, error = %err, "skipping line that is not JSON");
            return json!({ "line": line_no, "error": format!("invalid JSON: {err}") });
        }
    };

    if let Some(ts) = event.get("origin_server_ts").and_then(Value::as_u64) {
        clock.advance_to(Timestamp::from_millis(ts));
    }

    match engine.check_event(&event) {
        Ok(verdict) => json!({
            "line": line_no,
            "event_id": event.get("event_id"),
            "verdict": verdict,
        }),
        Err(err) => {
            warn!(line = line_no, error = %err, "event not processed");
            json!({
                "line": line_no,
                "event_id": event.get("event_id"),
                "error": err.to_string(),
            })
        }
    }
}
