// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Composition root for the turn engine.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::broadcast;

use chamber_config::ChamberConfig;
use chamber_core::{
    ChamberError, ChatProvider, Clock, ContextRetriever, EngineEvent, EventBus, IdGen,
    SessionStore, SyncKv, SystemClock, UuidGen,
};
use chamber_prompt::{PromptBuilder, PromptTemplate};
use chamber_provider::provider_for_config;
use chamber_session::SessionManager;
use chamber_state::StateStore;
use chamber_tokens::{BudgetThresholds, EstimatorConfig, TokenAccountant, TokenEstimator};
use chamber_tools::{ToolRegistry, register_builtins};

use crate::orchestrator::ChatOrchestrator;
use crate::queue::{TurnOptions, TurnQueue, TurnTicket};

/// The assembled turn engine.
///
/// Owns the session manager, the shared state store, the event bus, and
/// the turn queue. Hosts keep one of these for the lifetime of the app
/// and talk to it through [`send`], [`subscribe`], and the session
/// accessor.
///
/// [`send`]: ChamberEngine::send
/// [`subscribe`]: ChamberEngine::subscribe
pub struct ChamberEngine {
    sessions: Arc<SessionManager>,
    state: StateStore,
    bus: EventBus,
    queue: TurnQueue,
}

impl ChamberEngine {
    /// Builds a production engine from configuration.
    ///
    /// Must run inside a tokio runtime: the session saver, the state
    /// notifier, and the turn worker are all spawned here.
    pub fn new(
        config: &ChamberConfig,
        store: Arc<dyn SessionStore>,
        kv: Arc<dyn SyncKv>,
        retriever: Option<Arc<dyn ContextRetriever>>,
    ) -> Result<Self, ChamberError> {
        let provider: Arc<dyn ChatProvider> = Arc::new(provider_for_config(&config.providers)?);
        Self::assemble(
            config,
            store,
            kv,
            retriever,
            provider,
            Arc::new(SystemClock),
            Arc::new(UuidGen),
        )
    }

    /// Assembles an engine from explicit collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        config: &ChamberConfig,
        store: Arc<dyn SessionStore>,
        kv: Arc<dyn SyncKv>,
        retriever: Option<Arc<dyn ContextRetriever>>,
        provider: Arc<dyn ChatProvider>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGen>,
    ) -> Result<Self, ChamberError> {
        let bus = EventBus::default();
        let state = StateStore::new();
        let sessions = Arc::new(SessionManager::new(
            store,
            kv,
            Arc::clone(&clock),
            ids,
            bus.clone(),
            config.session.clone(),
        ));

        let estimator = TokenEstimator::new(EstimatorConfig::new(
            &config.tokens.chars_per_token,
            config.tokens.default_chars_per_token,
        ));
        let accountant = TokenAccountant::new(
            estimator.clone(),
            BudgetThresholds {
                warn: config.tokens.warn_threshold,
                truncate: config.tokens.truncate_threshold,
                target_ratio: config.tokens.truncate_target_ratio,
            },
        );

        let template = PromptTemplate::from_parts(
            config.prompt.template.as_deref(),
            config.prompt.template_file.as_deref().map(Path::new),
        )?;
        let prompt = PromptBuilder::new(template, estimator);

        let mut registry = ToolRegistry::new();
        register_builtins(&mut registry);

        let orchestrator = Arc::new(ChatOrchestrator::new(
            Arc::clone(&sessions),
            provider,
            retriever,
            Arc::new(registry),
            prompt,
            accountant,
            state.clone(),
            bus.clone(),
            clock,
            config.engine.clone(),
        ));
        let queue = TurnQueue::new(orchestrator, state.clone());

        Ok(Self {
            sessions,
            state,
            bus,
            queue,
        })
    }

    /// Loads the most recent session, recovering an emergency snapshot
    /// when one is fresh enough, and returns the active session id.
    pub async fn initialize(&self) -> Result<String, ChamberError> {
        self.sessions.initialize().await
    }

    /// Queues a message for a reply in submission order.
    pub fn send(&self, text: impl Into<String>) -> TurnTicket {
        self.push(text, TurnOptions::default())
    }

    /// Queues a message with explicit options.
    pub fn push(&self, text: impl Into<String>, options: TurnOptions) -> TurnTicket {
        self.queue.push(text, options)
    }

    /// Engine events: turn lifecycle, streamed deltas, context warnings.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.bus.subscribe()
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    /// Synchronous best-effort snapshot for process shutdown.
    pub fn snapshot_for_shutdown(&self) -> Result<(), ChamberError> {
        self.sessions.snapshot_for_shutdown()
    }

    /// Flushes pending saves when the host window is hidden. Hiding never
    /// cancels an in-flight turn.
    pub async fn flush_on_hide(&self) -> Result<(), ChamberError> {
        self.sessions.flush_on_hide().await
    }
}
