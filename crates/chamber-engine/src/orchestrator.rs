// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One user turn, end to end.
//!
//! [`ChatOrchestrator::run_turn`] owns the whole pipeline: append the user
//! message, gather retrieval and query context, build the system prompt,
//! account for tokens (trimming or rejecting when the window is blown),
//! make the first provider call, hand the response to the degradation
//! ladder, and append what came back. Every turn ends in exactly one of
//! three ways: a final assistant reply in the session, a locally generated
//! reply in the session (canned, budget, or fallback), or a cancellation
//! that leaves the history at the last fully appended message.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use chamber_config::EngineConfig;
use chamber_core::{
    ChamberError, ChatMessage, ChatProvider, ChatRequest, ChatResponse, Clock, ContextRetriever,
    EngineEvent, EventBus, ListenerProfile, ProviderKind, ProviderProfile,
};
use chamber_prompt::{PromptBuilder, PromptInputs};
use chamber_query::{extract_query_context, listener_profile};
use chamber_session::SessionManager;
use chamber_state::{DataState, StateStore};
use chamber_tokens::{
    BudgetAction, RequestParts, TokenAccountant, TruncationInput, truncate_to_target,
};
use chamber_tools::{CircuitBreaker, ToolContext, ToolOrchestrator, ToolRegistry, TurnBudget};

use crate::fallback::{fallback_reply, no_key_reply, profile_facts};

/// Personality placeholder until the detector has produced one.
const DEFAULT_PERSONALITY: &str = "the Archivist";

/// Runs turns against one fixed set of collaborators.
///
/// The orchestrator is cheap to share and holds no per-turn state; budgets
/// and circuit breakers are created fresh inside [`run_turn`].
///
/// [`run_turn`]: ChatOrchestrator::run_turn
pub struct ChatOrchestrator {
    sessions: Arc<SessionManager>,
    provider: Arc<dyn ChatProvider>,
    retriever: Option<Arc<dyn ContextRetriever>>,
    registry: Arc<ToolRegistry>,
    prompt: PromptBuilder,
    accountant: TokenAccountant,
    state: StateStore,
    bus: EventBus,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl ChatOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: Arc<SessionManager>,
        provider: Arc<dyn ChatProvider>,
        retriever: Option<Arc<dyn ContextRetriever>>,
        registry: Arc<ToolRegistry>,
        prompt: PromptBuilder,
        accountant: TokenAccountant,
        state: StateStore,
        bus: EventBus,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            sessions,
            provider,
            retriever,
            registry,
            prompt,
            accountant,
            state,
            bus,
            clock,
            config,
        }
    }

    /// Runs one full turn for `text` and returns the final assistant reply.
    ///
    /// The user message is appended before anything can fail, so a turn that
    /// errors later still shows the question in the history. Provider and
    /// ladder errors downgrade to a data-only fallback reply rather than
    /// propagating; only cancellation surfaces as an error, and it appends
    /// nothing.
    pub async fn run_turn(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<ChatMessage, ChamberError> {
        self.sessions.append_message(ChatMessage::user(text));
        let session_id = self.sessions.current_session_id().unwrap_or_default();
        self.bus.publish(EngineEvent::TurnStarted {
            session_id: session_id.clone(),
        });

        let reply = match self.turn_inner(text, &session_id, cancel).await {
            Ok(reply) => reply,
            Err(ChamberError::Cancelled) => {
                debug!(%session_id, "turn cancelled");
                return Err(ChamberError::Cancelled);
            }
            Err(error) => {
                warn!(%error, "turn failed, answering from listening data alone");
                let fallback = fallback_reply(&self.current_profile(), self.provider.profile().kind);
                self.finish_with(ChatMessage::assistant_error(fallback))
            }
        };

        self.bus.publish(EngineEvent::TurnCompleted { session_id });
        Ok(reply)
    }

    async fn turn_inner(
        &self,
        text: &str,
        session_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ChatMessage, ChamberError> {
        let budget = TurnBudget::with_settings(
            Duration::from_secs(self.config.turn_budget_secs),
            Duration::from_secs(self.config.tool_call_timeout_secs),
            Duration::from_secs(self.config.min_tool_call_secs),
        );
        let mut breaker = CircuitBreaker::with_threshold(self.config.breaker_threshold);

        let profile = self.provider.profile();
        if profile.kind == ProviderKind::Cloud && !profile.has_api_key {
            debug!("cloud backend has no API key, skipping the call");
            return Ok(self.finish_with(ChatMessage::assistant(no_key_reply(&profile.model))));
        }

        let rag = self.retrieve_context(text).await;

        let data = self.state.active_data();
        let now = self.clock.now();
        let query = extract_query_context(text, &data.streams, now);
        let inputs = self.rendered_inputs(&data, now);
        let built = self.prompt.build(
            &profile.model,
            profile.context_window,
            &inputs.as_inputs(),
            rag.as_deref(),
            query.as_ref().map(|q| q.summary.as_str()),
        );
        if built.base_exceeds_reserve {
            warn!(
                base_tokens = built.base_tokens,
                "system prompt alone crowds the context window"
            );
        }

        let history = self.sessions.current_messages();
        let specs = self.registry.specs();
        let info = self.accountant.account(
            &profile.model,
            profile.context_window,
            RequestParts {
                messages: &history,
                system_prompt: &built.text,
                rag_context: None,
                tools: Some(&specs),
            },
        );

        match info.recommendation.action {
            BudgetAction::Ok => {}
            BudgetAction::WarnUser | BudgetAction::Truncate => {
                self.bus.publish(EngineEvent::ContextWarning {
                    session_id: session_id.to_string(),
                    message: info.recommendation.message.clone(),
                });
            }
            BudgetAction::Reject => {
                warn!(
                    total_tokens = info.total_tokens,
                    context_window = info.context_window,
                    "message floor does not fit the model context"
                );
                return Ok(
                    self.finish_with(ChatMessage::assistant_error(info.recommendation.message))
                );
            }
        }

        let (messages, tools) = if info.recommendation.action == BudgetAction::Truncate {
            let outcome = truncate_to_target(
                self.accountant.estimator(),
                &profile.model,
                TruncationInput {
                    messages: history,
                    system_prompt: built.text.clone(),
                    rag_context: None,
                    tools: Some(specs),
                },
                self.accountant.truncate_target(profile.context_window),
            );
            debug!(
                dropped_messages = outcome.dropped_messages,
                dropped_tools = outcome.dropped_tools,
                final_tokens = outcome.final_tokens,
                "trimmed the conversation to fit the window"
            );
            (outcome.messages, outcome.tools)
        } else {
            (history, Some(specs))
        };

        let mut request_messages = Vec::with_capacity(messages.len() + 1);
        request_messages.push(ChatMessage::system(built.text));
        request_messages.extend(messages);
        let mut request = ChatRequest::new(request_messages);
        if let Some(tools) = tools {
            request = request.with_tools(tools);
        }

        let first = self
            .first_call(&request, &profile, session_id, &budget, cancel)
            .await?;

        let context = ToolContext::new(Arc::new(data.streams), now);
        let ladder = ToolOrchestrator::new(self.provider.as_ref(), &self.registry, &context, &budget);
        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(ChamberError::Cancelled),
            outcome = ladder.resolve(&request, first, &mut breaker) => outcome,
        };
        debug!(
            source = ?outcome.source,
            appended = outcome.messages.len(),
            "ladder resolved the turn"
        );

        let mut reply = None;
        for message in outcome.messages {
            reply = Some(message.clone());
            self.sessions.append_message(message);
        }
        self.sessions.save_conversation();
        reply.ok_or_else(|| ChamberError::Internal("ladder produced no reply".to_string()))
    }

    /// First provider call of the turn. Streams deltas onto the bus when
    /// the backend supports it, races the cancel token, and never waits
    /// past the remaining turn budget.
    async fn first_call(
        &self,
        request: &ChatRequest,
        profile: &ProviderProfile,
        session_id: &str,
        budget: &TurnBudget,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, ChamberError> {
        let remaining = budget.remaining();
        if remaining.is_zero() {
            return Err(ChamberError::BudgetExhausted);
        }

        let progress = profile.kind.supports_streaming().then(|| {
            let (sink, mut deltas) = mpsc::unbounded_channel();
            let bus = self.bus.clone();
            let session_id = session_id.to_string();
            tokio::spawn(async move {
                while let Some(delta) = deltas.recv().await {
                    bus.publish(EngineEvent::AssistantDelta {
                        session_id: session_id.clone(),
                        delta,
                    });
                }
            });
            sink
        });

        tokio::select! {
            _ = cancel.cancelled() => Err(ChamberError::Cancelled),
            called = tokio::time::timeout(remaining, self.provider.chat(request.clone(), progress)) => {
                match called {
                    Ok(response) => response,
                    Err(_) => Err(ChamberError::Timeout { duration: remaining }),
                }
            }
        }
    }

    /// Appends a locally produced reply and schedules its save.
    fn finish_with(&self, reply: ChatMessage) -> ChatMessage {
        self.sessions.append_message(reply.clone());
        self.sessions.save_conversation();
        reply
    }

    /// Best-effort retrieval; a failure downgrades to no context.
    async fn retrieve_context(&self, text: &str) -> Option<String> {
        let retriever = self.retriever.as_ref()?;
        match retriever.retrieve(text).await {
            Ok(context) => context,
            Err(error) => {
                warn!(%error, "context retrieval failed, continuing without it");
                None
            }
        }
    }

    /// Aggregate facts for whichever dataset is active right now.
    fn current_profile(&self) -> ListenerProfile {
        let data = self.state.active_data();
        match data.profile {
            Some(profile) => profile,
            None => listener_profile(&data.streams),
        }
    }

    fn rendered_inputs(&self, data: &DataState, now: DateTime<Utc>) -> RenderedInputs {
        let personality = data
            .personality
            .as_ref()
            .map(|p| p.name.clone())
            .unwrap_or_else(|| DEFAULT_PERSONALITY.to_string());
        let insights = data
            .personality
            .as_ref()
            .map(|p| format!("Listening personality: {} {}.", p.name, p.emoji))
            .unwrap_or_default();

        let profile = match &data.profile {
            Some(profile) => profile.clone(),
            None => listener_profile(&data.streams),
        };
        let facts = profile_facts(&profile);
        let evidence = if facts.is_empty() {
            "No listening data imported yet.".to_string()
        } else {
            facts.join("\n")
        };

        let date_range = match (
            data.streams.iter().map(|r| r.ts).min(),
            data.streams.iter().map(|r| r.ts).max(),
        ) {
            (Some(first), Some(last)) => format!(
                "{} to {}",
                first.format("%Y-%m-%d"),
                last.format("%Y-%m-%d")
            ),
            _ => "no imported data".to_string(),
        };

        RenderedInputs {
            personality,
            evidence,
            insights,
            date_range,
            today: now.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Owned strings backing one turn's [`PromptInputs`].
struct RenderedInputs {
    personality: String,
    evidence: String,
    insights: String,
    date_range: String,
    today: String,
}

impl RenderedInputs {
    fn as_inputs(&self) -> PromptInputs<'_> {
        PromptInputs {
            personality: &self.personality,
            evidence: &self.evidence,
            insights: &self.insights,
            date_range: &self.date_range,
            today: &self.today,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use serde_json::json;

    use chamber_config::SessionConfig;
    use chamber_core::{IdGen, ProgressSink, Role, SessionStore, StreamDelta, SyncKv};
    use chamber_prompt::PromptTemplate;
    use chamber_test_utils::fixtures::listening_history;
    use chamber_test_utils::{
        ManualClock, MemorySessionStore, MemorySyncKv, MockProvider, SeqIdGen, text_response,
        tool_call_response,
    };
    use chamber_tokens::TokenEstimator;
    use chamber_tools::register_builtins;

    const NOW: &str = "2026-03-01T12:00:00Z";

    struct Harness {
        orchestrator: Arc<ChatOrchestrator>,
        sessions: Arc<SessionManager>,
        store: Arc<MemorySessionStore>,
        state: StateStore,
        bus: EventBus,
    }

    async fn harness(provider: Arc<dyn ChatProvider>) -> Harness {
        harness_with_retriever(provider, None).await
    }

    async fn harness_with_retriever(
        provider: Arc<dyn ChatProvider>,
        retriever: Option<Arc<dyn ContextRetriever>>,
    ) -> Harness {
        let store = Arc::new(MemorySessionStore::new());
        let kv = Arc::new(MemorySyncKv::new());
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::at(NOW.parse().unwrap()));
        let ids: Arc<dyn IdGen> = Arc::new(SeqIdGen::new("session"));
        let bus = EventBus::default();
        let sessions = Arc::new(SessionManager::new(
            store.clone() as Arc<dyn SessionStore>,
            kv as Arc<dyn SyncKv>,
            Arc::clone(&clock),
            ids,
            bus.clone(),
            SessionConfig::default(),
        ));

        let state = StateStore::new();
        state.set_streams(listening_history());

        let mut registry = ToolRegistry::new();
        register_builtins(&mut registry);

        let orchestrator = Arc::new(ChatOrchestrator::new(
            Arc::clone(&sessions),
            provider,
            retriever,
            Arc::new(registry),
            PromptBuilder::new(PromptTemplate::default(), TokenEstimator::default()),
            TokenAccountant::default(),
            state.clone(),
            bus.clone(),
            clock,
            EngineConfig::default(),
        ));

        Harness {
            orchestrator,
            sessions,
            store,
            state,
            bus,
        }
    }

    fn ollama_profile(context_window: u32) -> ProviderProfile {
        ProviderProfile {
            kind: ProviderKind::Ollama,
            model: "test-model".to_string(),
            context_window,
            has_api_key: false,
        }
    }

    /// Provider whose call never returns within any test budget.
    struct HangingProvider;

    #[async_trait]
    impl ChatProvider for HangingProvider {
        fn profile(&self) -> ProviderProfile {
            ollama_profile(8192)
        }

        async fn chat(
            &self,
            _request: ChatRequest,
            _progress: Option<ProgressSink>,
        ) -> Result<ChatResponse, ChamberError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(ChamberError::Internal("never reached".to_string()))
        }
    }

    /// Provider that emits two streamed tokens before its reply.
    struct StreamingProvider;

    #[async_trait]
    impl ChatProvider for StreamingProvider {
        fn profile(&self) -> ProviderProfile {
            ollama_profile(8192)
        }

        async fn chat(
            &self,
            _request: ChatRequest,
            progress: Option<ProgressSink>,
        ) -> Result<ChatResponse, ChamberError> {
            if let Some(sink) = progress {
                let _ = sink.send(StreamDelta::Token("Def".to_string()));
                let _ = sink.send(StreamDelta::Token("tones".to_string()));
            }
            Ok(text_response("Deftones."))
        }
    }

    struct FailingRetriever;

    #[async_trait]
    impl ContextRetriever for FailingRetriever {
        async fn retrieve(&self, _query: &str) -> Result<Option<String>, ChamberError> {
            Err(ChamberError::Internal("index offline".to_string()))
        }
    }

    struct FixedRetriever(&'static str);

    #[async_trait]
    impl ContextRetriever for FixedRetriever {
        async fn retrieve(&self, _query: &str) -> Result<Option<String>, ChamberError> {
            Ok(Some(self.0.to_string()))
        }
    }

    fn roles(messages: &[ChatMessage]) -> Vec<Role> {
        messages.iter().map(|m| m.role).collect()
    }

    #[tokio::test]
    async fn plain_turn_appends_user_and_assistant() {
        let provider = Arc::new(MockProvider::with_responses(vec![Ok(text_response(
            "You mostly played Deftones.",
        ))]));
        let h = harness(provider.clone()).await;

        let reply = h
            .orchestrator
            .run_turn("who did I play most?", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(reply.text_content(), "You mostly played Deftones.");
        assert!(!reply.error);

        let messages = h.sessions.current_messages();
        assert_eq!(roles(&messages), vec![Role::User, Role::Assistant]);
        assert_eq!(messages[0].text_content(), "who did I play most?");
        assert_eq!(provider.calls().await, 1);
    }

    #[tokio::test]
    async fn first_request_carries_system_prompt_and_tools() {
        let provider = Arc::new(MockProvider::with_responses(vec![Ok(text_response("ok"))]));
        let h = harness(provider.clone()).await;

        h.orchestrator
            .run_turn("hello", &CancellationToken::new())
            .await
            .unwrap();

        let recorded = provider.recorded().await;
        assert_eq!(recorded.len(), 1);
        let request = &recorded[0];
        assert_eq!(request.messages[0].role, Role::System);
        let system = request.messages[0].text_content();
        assert!(system.contains("music-history companion"));
        assert!(system.contains("2026-03-01"));
        assert_eq!(request.messages.last().unwrap().text_content(), "hello");
        assert_eq!(request.tools.as_ref().map(Vec::len), Some(6));
    }

    #[tokio::test(start_paused = true)]
    async fn reply_is_saved_after_the_debounce() {
        let provider = Arc::new(MockProvider::with_responses(vec![Ok(text_response("hi"))]));
        let h = harness(provider).await;

        h.orchestrator
            .run_turn("hello", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(h.store.save_count(), 0);

        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(h.store.save_count(), 1);
        assert_eq!(h.store.session_count().await, 1);
    }

    #[tokio::test]
    async fn native_tool_round_trip_lands_in_history() {
        let provider = Arc::new(MockProvider::with_responses(vec![
            Ok(tool_call_response("call-1", "topArtist", json!({"count": 1}))),
            Ok(text_response("Deftones tops your history.")),
        ]));
        let h = harness(provider.clone()).await;

        let reply = h
            .orchestrator
            .run_turn("top artist?", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(reply.text_content(), "Deftones tops your history.");
        let messages = h.sessions.current_messages();
        assert_eq!(
            roles(&messages),
            vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]
        );
        assert!(messages[1].has_tool_calls());
        assert_eq!(messages[2].tool_call_id.as_deref(), Some("call-1"));
        assert!(messages[2].text_content().contains("Deftones"));
        assert_eq!(provider.calls().await, 2);
    }

    #[tokio::test]
    async fn cloud_without_key_answers_with_configuration_help() {
        let provider = Arc::new(MockProvider::new().with_profile(ProviderProfile {
            kind: ProviderKind::Cloud,
            model: "openrouter/auto".to_string(),
            context_window: 128_000,
            has_api_key: false,
        }));
        let h = harness(provider.clone()).await;

        let reply = h
            .orchestrator
            .run_turn("hello?", &CancellationToken::new())
            .await
            .unwrap();

        assert!(!reply.error);
        assert!(reply.text_content().contains("[providers.cloud]"));
        assert_eq!(provider.calls().await, 0);
        assert_eq!(
            roles(&h.sessions.current_messages()),
            vec![Role::User, Role::Assistant]
        );
    }

    #[tokio::test]
    async fn provider_failure_falls_back_to_listening_data() {
        // An empty script makes the first call fail outright.
        let provider = Arc::new(MockProvider::new());
        let h = harness(provider).await;

        let reply = h
            .orchestrator
            .run_turn("how much did I listen?", &CancellationToken::new())
            .await
            .unwrap();

        assert!(reply.error);
        let text = reply.text_content();
        assert!(text.contains("Deftones"));
        assert!(text.contains("ollama serve"));
        assert_eq!(
            roles(&h.sessions.current_messages()),
            vec![Role::User, Role::Assistant]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn turn_times_out_at_the_budget_and_falls_back() {
        let h = harness(Arc::new(HangingProvider)).await;
        let started = tokio::time::Instant::now();

        let reply = h
            .orchestrator
            .run_turn("anything?", &CancellationToken::new())
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_secs(60));
        assert!(reply.error);
        assert!(reply.text_content().contains("ollama serve"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_the_provider_call_keeps_history_clean() {
        let h = harness(Arc::new(HangingProvider)).await;
        let token = CancellationToken::new();

        let turn = {
            let orchestrator = Arc::clone(&h.orchestrator);
            let token = token.clone();
            tokio::spawn(async move { orchestrator.run_turn("slow one", &token).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();

        let result = turn.await.unwrap();
        assert!(matches!(result, Err(ChamberError::Cancelled)));

        let messages = h.sessions.current_messages();
        assert_eq!(roles(&messages), vec![Role::User]);
        assert_eq!(messages[0].text_content(), "slow one");
    }

    #[tokio::test]
    async fn long_history_is_trimmed_to_fit_the_window() {
        let provider = Arc::new(
            MockProvider::with_responses(vec![Ok(text_response("Trimmed fine."))])
                .with_profile(ollama_profile(2048)),
        );
        let h = harness(provider.clone()).await;

        let filler = "x".repeat(400);
        for _ in 0..15 {
            h.sessions.append_message(ChatMessage::user(filler.as_str()));
            h.sessions.append_message(ChatMessage::assistant(filler.as_str()));
        }
        let mut events = h.bus.subscribe();

        let reply = h
            .orchestrator
            .run_turn("what did I play most?", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(reply.text_content(), "Trimmed fine.");

        let recorded = provider.recorded().await;
        let request = &recorded[0];
        assert_eq!(request.messages[0].role, Role::System);
        assert!(request.messages.len() < 25);
        assert_eq!(
            request.messages.last().unwrap().text_content(),
            "what did I play most?"
        );

        let mut warned = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, EngineEvent::ContextWarning { .. }) {
                warned = true;
            }
        }
        assert!(warned);
    }

    #[tokio::test]
    async fn oversized_message_is_rejected_before_any_call() {
        let provider = Arc::new(MockProvider::new().with_profile(ollama_profile(64)));
        let h = harness(provider.clone()).await;

        let reply = h
            .orchestrator
            .run_turn(&"y".repeat(4000), &CancellationToken::new())
            .await
            .unwrap();

        assert!(reply.error);
        assert!(reply.text_content().contains("too long"));
        assert_eq!(provider.calls().await, 0);
        assert_eq!(
            roles(&h.sessions.current_messages()),
            vec![Role::User, Role::Assistant]
        );
    }

    #[tokio::test]
    async fn turn_events_bracket_the_reply() {
        let provider = Arc::new(MockProvider::with_responses(vec![Ok(text_response("ok"))]));
        let h = harness(provider).await;
        let mut events = h.bus.subscribe();

        h.orchestrator
            .run_turn("hello", &CancellationToken::new())
            .await
            .unwrap();

        let mut turn_events = Vec::new();
        while let Ok(event) = events.try_recv() {
            match event {
                EngineEvent::TurnStarted { session_id } => turn_events.push(("started", session_id)),
                EngineEvent::TurnCompleted { session_id } => {
                    turn_events.push(("completed", session_id));
                }
                _ => {}
            }
        }
        assert_eq!(turn_events.len(), 2);
        assert_eq!(turn_events[0].0, "started");
        assert_eq!(turn_events[1].0, "completed");
        assert_eq!(turn_events[0].1, turn_events[1].1);
    }

    #[tokio::test(start_paused = true)]
    async fn streamed_tokens_are_republished_on_the_bus() {
        let h = harness(Arc::new(StreamingProvider)).await;
        let mut events = h.bus.subscribe();

        h.orchestrator
            .run_turn("stream it", &CancellationToken::new())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let mut tokens = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let EngineEvent::AssistantDelta {
                delta: StreamDelta::Token(token),
                ..
            } = event
            {
                tokens.push(token);
            }
        }
        assert_eq!(tokens, vec!["Def".to_string(), "tones".to_string()]);
    }

    #[tokio::test]
    async fn retrieval_failure_does_not_break_the_turn() {
        let provider = Arc::new(MockProvider::with_responses(vec![Ok(text_response("ok"))]));
        let h = harness_with_retriever(provider, Some(Arc::new(FailingRetriever))).await;

        let reply = h
            .orchestrator
            .run_turn("hello", &CancellationToken::new())
            .await
            .unwrap();
        assert!(!reply.error);
        assert_eq!(reply.text_content(), "ok");
    }

    #[tokio::test]
    async fn retrieved_context_reaches_the_system_prompt() {
        let provider = Arc::new(MockProvider::with_responses(vec![Ok(text_response("ok"))]));
        let h = harness_with_retriever(
            provider.clone(),
            Some(Arc::new(FixedRetriever("The listener saw Deftones live in 2022."))),
        )
        .await;

        h.orchestrator
            .run_turn("any concerts?", &CancellationToken::new())
            .await
            .unwrap();

        let recorded = provider.recorded().await;
        assert!(
            recorded[0].messages[0]
                .text_content()
                .contains("saw Deftones live in 2022")
        );
    }

    #[tokio::test]
    async fn demo_mode_hides_the_real_dataset() {
        let provider = Arc::new(MockProvider::new());
        let h = harness(provider).await;
        h.state.set_demo_mode(true);

        let reply = h
            .orchestrator
            .run_turn("what do you know?", &CancellationToken::new())
            .await
            .unwrap();

        // The demo dataset is empty here, so the fallback must not leak
        // facts from the real streams.
        assert!(reply.error);
        assert!(!reply.text_content().contains("Deftones"));
        assert!(reply.text_content().contains("nothing to summarize"));
    }
}
