// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single-consumer turn queue.
//!
//! Messages are answered strictly in submission order by one worker task,
//! so a follow-up question never runs before the previous turn produced
//! its final reply. A push returns a [`TurnTicket`] right away; the ticket
//! resolves once the turn finished or was cancelled. Bypass turns run on
//! their own task, outside the ordering guarantee.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use chamber_core::{ChamberError, ChatMessage};
use chamber_state::StateStore;

use crate::orchestrator::ChatOrchestrator;

/// Per-push knobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TurnOptions {
    /// Run immediately on a separate task instead of waiting in line.
    pub bypass_queue: bool,
}

/// Handle for one submitted turn.
///
/// Dropping the ticket neither cancels nor detaches the turn; the reply
/// still lands in the session.
pub struct TurnTicket {
    reply: oneshot::Receiver<Result<ChatMessage, ChamberError>>,
    cancel: CancellationToken,
}

impl TurnTicket {
    /// Asks the engine to abandon this turn. A turn cancelled before it
    /// starts never touches the session; one cancelled mid-flight keeps
    /// the history up to the last fully appended message.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the final assistant reply of this turn.
    pub async fn reply(self) -> Result<ChatMessage, ChamberError> {
        match self.reply.await {
            Ok(result) => result,
            // The engine went away without answering.
            Err(_) => Err(ChamberError::Cancelled),
        }
    }
}

struct QueuedTurn {
    text: String,
    cancel: CancellationToken,
    reply: oneshot::Sender<Result<ChatMessage, ChamberError>>,
}

/// FIFO of pending turns with a solitary worker.
pub struct TurnQueue {
    orchestrator: Arc<ChatOrchestrator>,
    pending: mpsc::UnboundedSender<QueuedTurn>,
    depth: Arc<AtomicUsize>,
    state: StateStore,
}

impl TurnQueue {
    /// Creates the queue and spawns its worker on the current runtime.
    pub fn new(orchestrator: Arc<ChatOrchestrator>, state: StateStore) -> Self {
        let (pending, inbox) = mpsc::unbounded_channel();
        let depth = Arc::new(AtomicUsize::new(0));
        tokio::spawn(worker_loop(
            Arc::clone(&orchestrator),
            inbox,
            state.clone(),
            Arc::clone(&depth),
        ));
        Self {
            orchestrator,
            pending,
            depth,
            state,
        }
    }

    /// Submits a message and returns its ticket immediately.
    pub fn push(&self, text: impl Into<String>, options: TurnOptions) -> TurnTicket {
        let text = text.into();
        let cancel = CancellationToken::new();
        let (reply_tx, reply_rx) = oneshot::channel();
        let ticket = TurnTicket {
            reply: reply_rx,
            cancel: cancel.clone(),
        };

        if options.bypass_queue {
            debug!("running bypass turn outside the queue");
            let orchestrator = Arc::clone(&self.orchestrator);
            tokio::spawn(async move {
                let _ = reply_tx.send(orchestrator.run_turn(&text, &cancel).await);
            });
            return ticket;
        }

        let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.set_queued_turns(depth);
        let queued = QueuedTurn {
            text,
            cancel,
            reply: reply_tx,
        };
        if self.pending.send(queued).is_err() {
            // Worker is gone; dropping the sender resolves the ticket.
            self.depth.fetch_sub(1, Ordering::SeqCst);
        }
        ticket
    }
}

async fn worker_loop(
    orchestrator: Arc<ChatOrchestrator>,
    mut inbox: mpsc::UnboundedReceiver<QueuedTurn>,
    state: StateStore,
    depth: Arc<AtomicUsize>,
) {
    while let Some(turn) = inbox.recv().await {
        let remaining = depth.fetch_sub(1, Ordering::SeqCst) - 1;
        state.set_queued_turns(remaining);

        if turn.cancel.is_cancelled() {
            debug!("skipping turn cancelled while queued");
            let _ = turn.reply.send(Err(ChamberError::Cancelled));
            continue;
        }

        state.set_turn_in_flight(true);
        let result = orchestrator.run_turn(&turn.text, &turn.cancel).await;
        state.set_turn_in_flight(false);
        let _ = turn.reply.send(result);
    }
}
