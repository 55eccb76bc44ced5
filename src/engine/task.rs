use crate::engine::{Notifications, OptionEngine};
use crate::state::{AppState, EditOutcome, EngineCommand, Notification, ParamField, WsMessage};
use portable_atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Engine task. Sole owner of the engine; commands are applied one at a time
/// so no edit ever interleaves with a recompute.
pub async fn run_engine(
    mut engine: OptionEngine,
    state: Arc<AppState>,
    mut rx: mpsc::Receiver<EngineCommand>,
) {
    tracing::info!(revision = engine.revision(), "engine task started");

    while let Some(cmd) = rx.recv().await {
        state.counters.commands_received.fetch_add(1, Ordering::Relaxed);

        match cmd {
            EngineCommand::Apply { patch, reply } => {
                let notes = engine.apply(&patch);
                let outcome = publish(&engine, &notes, &state);
                if let Some(reply) = reply {
                    let _ = reply.send(outcome);
                }
            }

            EngineCommand::Reset { reply } => {
                tracing::info!("resetting parameters to defaults");
                let notes = engine.reset();
                let outcome = publish(&engine, &notes, &state);
                if let Some(reply) = reply {
                    let _ = reply.send(outcome);
                }
            }

            EngineCommand::Shutdown => {
                tracing::info!("shutdown command received");
                break;
            }
        }
    }

    tracing::info!(revision = engine.revision(), "engine task shutting down");
}

/// Publish the new snapshot, then fan out the notifications that describe it.
/// Watch first: a client reacting to a notification always reads a snapshot
/// at least as new as the one the notification refers to.
fn publish(engine: &OptionEngine, notes: &Notifications, state: &AppState) -> EditOutcome {
    let snapshot = engine.snapshot();
    let changed: Vec<ParamField> = notes
        .iter()
        .filter_map(|n| match n {
            Notification::FieldChanged(f) => Some(*f),
            _ => None,
        })
        .collect();

    if notes.is_empty() {
        state.counters.edits_suppressed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(revision = snapshot.revision, "edit was a no-op");
        return EditOutcome { changed, snapshot };
    }

    state.counters.edits_applied.fetch_add(1, Ordering::Relaxed);
    state.counters.recomputes.fetch_add(1, Ordering::Relaxed);

    state.snapshot_tx.send_replace(snapshot.clone());
    for note in notes {
        state.broadcast(WsMessage::from_notification(*note, &snapshot));
    }

    tracing::debug!(
        revision = snapshot.revision,
        changed = ?changed,
        price = snapshot.result.price,
        "published"
    );

    EditOutcome { changed, snapshot }
}
