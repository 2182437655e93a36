// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Debounced background writer for the live session.
//!
//! Every durable session write funnels through this one task, so a timer
//! firing and an explicit flush can never race each other into the store.
//! Edits schedule a trailing-edge deadline; each new edit pushes the
//! deadline out again, coalescing a burst of appends into a single write.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep_until};
use tracing::warn;

use chamber_core::{ChamberError, EngineEvent};

use crate::backup::trailing;
use crate::manager::{SaveState, Shared, lock_current};

/// Instructions accepted by the saver task.
pub(crate) enum SaverCommand {
    /// Start or extend the debounce window.
    Schedule,
    /// Write now. `force` also writes sessions that are not dirty.
    Flush {
        force: bool,
        ack: oneshot::Sender<Result<Option<String>, ChamberError>>,
    },
}

/// Runs until the command channel closes, then performs one final write if a
/// deadline was still pending.
pub(crate) async fn saver_loop(
    shared: Arc<Shared>,
    mut commands: mpsc::UnboundedReceiver<SaverCommand>,
    debounce: Duration,
) {
    let mut deadline: Option<Instant> = None;

    loop {
        let command = match deadline {
            Some(at) => tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
                _ = sleep_until(at) => {
                    deadline = None;
                    if let Err(error) = persist_current(&shared, false).await {
                        warn!(%error, "debounced session save failed");
                    }
                    continue;
                }
            },
            None => match commands.recv().await {
                Some(command) => command,
                None => break,
            },
        };

        match command {
            SaverCommand::Schedule => {
                deadline = Some(Instant::now() + debounce);
            }
            SaverCommand::Flush { force, ack } => {
                deadline = None;
                let _ = ack.send(persist_current(&shared, force).await);
            }
        }
    }

    // Manager dropped with a save still pending.
    if deadline.is_some()
        && let Err(error) = persist_current(&shared, false).await
    {
        warn!(%error, "final session save failed");
    }
}

/// Write the live session to the durable store.
///
/// Returns the saved session id, or `None` when there was nothing to write.
/// The store only ever sees the trailing message window; the in-memory
/// history keeps its full length.
pub(crate) async fn persist_current(
    shared: &Shared,
    force: bool,
) -> Result<Option<String>, ChamberError> {
    let (snapshot, generation) = {
        let mut guard = lock_current(shared);
        let Some(live) = guard.as_mut() else {
            return Ok(None);
        };
        if !force && live.state != SaveState::Dirty {
            return Ok(None);
        }
        let mut snapshot = live.session.clone();
        snapshot.messages = trailing(&snapshot.messages, shared.cap);
        (snapshot, live.generation)
    };

    shared.store.save_session(&snapshot).await?;

    // Edits that raced the write keep the session dirty.
    let mut guard = lock_current(shared);
    if let Some(live) = guard.as_mut()
        && live.session.id == snapshot.id
        && live.generation == generation
    {
        live.state = SaveState::Saved;
    }
    drop(guard);

    shared.bus.publish(EngineEvent::SessionUpdated {
        session_id: snapshot.id.clone(),
    });
    Ok(Some(snapshot.id))
}
