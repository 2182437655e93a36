// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Four-level resolution ladder for model-requested function calls.
//!
//! Models differ widely in how reliably they emit structured tool calls, so
//! the orchestrator works down a ladder of strategies until one produces a
//! reply: native `tool_calls`, a JSON object coaxed out through the system
//! prompt, deterministic intent classification, and finally direct execution
//! of the catalog function matching the query category. Each level gets one
//! attempt; a level that produces no callable action or whose attempt fails
//! demotes to the next.

use chamber_core::{
    ChatMessage, ChatProvider, ChatRequest, ChatResponse, FunctionCall, Role, ToolCall, ToolSpec,
};
use chamber_query::{ParsedQuery, Period, extract_query_context};
use serde_json::Value;
use tracing::{debug, warn};

use crate::breaker::CircuitBreaker;
use crate::budget::TurnBudget;
use crate::builtin::period_args;
use crate::intent::classify;
use crate::tool::{ToolContext, ToolOutput, ToolRegistry};

/// Reply when every level has been exhausted.
const APOLOGY: &str = "Sorry, I couldn't get an answer together from your \
     listening history this time. Try asking about a specific year, month, \
     or artist.";

/// Call id used when a call is synthesized rather than model-issued.
const SYNTHETIC_CALL_ID: &str = "call_intent_1";

/// Which strategy produced the final reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySource {
    /// The first response already carried plain text.
    Direct,
    /// Native tool_calls executed and answered in a follow-up call.
    NativeTools,
    /// JSON object parsed out of a prompt-injected reply.
    InjectedJson,
    /// Deterministic keyword classification of the user message.
    IntentRule,
    /// Catalog function mapped straight from the query category.
    QueryCategory,
    /// Nothing worked; canned apology.
    Apology,
}

/// Result of running the ladder for one turn.
#[derive(Debug)]
pub struct LadderOutcome {
    /// Messages to append to the session after the user message. The last
    /// entry is always the final assistant reply.
    pub messages: Vec<ChatMessage>,
    pub source: ReplySource,
}

enum Attempt {
    Resolved(Vec<ChatMessage>),
    /// Try the next level.
    Demote,
    /// A broken function would be called; go straight to direct execution.
    SkipToCategory,
    /// Turn budget is spent; skip everything still pending.
    BudgetOut,
}

enum CallError {
    Failed,
    BudgetOut,
}

/// Drives one turn's function-call handling against a provider, a function
/// registry, and the per-turn budget and breaker.
pub struct ToolOrchestrator<'a> {
    provider: &'a dyn ChatProvider,
    registry: &'a ToolRegistry,
    context: &'a ToolContext,
    budget: &'a TurnBudget,
}

impl<'a> ToolOrchestrator<'a> {
    pub fn new(
        provider: &'a dyn ChatProvider,
        registry: &'a ToolRegistry,
        context: &'a ToolContext,
        budget: &'a TurnBudget,
    ) -> Self {
        Self {
            provider,
            registry,
            context,
            budget,
        }
    }

    /// Resolves the first provider response into a final reply, working down
    /// the ladder as far as necessary.
    pub async fn resolve(
        &self,
        request: &ChatRequest,
        first: ChatResponse,
        breaker: &mut CircuitBreaker,
    ) -> LadderOutcome {
        let user_text = last_user_text(&request.messages);

        match self.native_tools(request, &first, breaker).await {
            Attempt::Resolved(messages) => {
                let source = if first.message().is_some_and(ChatMessage::has_tool_calls) {
                    ReplySource::NativeTools
                } else {
                    ReplySource::Direct
                };
                return LadderOutcome { messages, source };
            }
            Attempt::SkipToCategory => return self.finish_direct(&user_text).await,
            Attempt::BudgetOut => return apology_outcome(),
            Attempt::Demote => {}
        }
        debug!("tool handling demoted to prompt injection");

        match self.injected_json(request, breaker).await {
            Attempt::Resolved(messages) => {
                return LadderOutcome {
                    messages,
                    source: ReplySource::InjectedJson,
                };
            }
            Attempt::SkipToCategory => return self.finish_direct(&user_text).await,
            Attempt::BudgetOut => return apology_outcome(),
            Attempt::Demote => {}
        }
        debug!("tool handling demoted to intent classification");

        match self.intent_rule(request, &user_text, breaker).await {
            Attempt::Resolved(messages) => {
                return LadderOutcome {
                    messages,
                    source: ReplySource::IntentRule,
                };
            }
            Attempt::SkipToCategory => return self.finish_direct(&user_text).await,
            Attempt::BudgetOut => return apology_outcome(),
            Attempt::Demote => {}
        }
        debug!("tool handling demoted to direct execution");

        self.finish_direct(&user_text).await
    }

    /// Native pass: execute the calls the model requested, in array order,
    /// then ask the provider once more for the worded answer.
    async fn native_tools(
        &self,
        request: &ChatRequest,
        first: &ChatResponse,
        breaker: &mut CircuitBreaker,
    ) -> Attempt {
        let Some(message) = first.message() else {
            return Attempt::Demote;
        };

        if !message.has_tool_calls() {
            if message.text_content().trim().is_empty() {
                // Neither text nor calls: structural failure.
                return Attempt::Demote;
            }
            return Attempt::Resolved(vec![message.clone()]);
        }

        let calls = message.tool_calls.clone().unwrap_or_default();
        if calls
            .iter()
            .any(|call| breaker.is_open(&call.function.name))
        {
            return Attempt::SkipToCategory;
        }

        let mut appended = vec![message.clone()];
        for call in &calls {
            let name = call.function.name.as_str();
            let Some(tool) = self.registry.get(name) else {
                warn!(function = name, "model requested an unregistered function");
                return Attempt::Demote;
            };
            let args = match call.function.parse_args() {
                Ok(args) => args,
                Err(error) => {
                    warn!(function = name, %error, "unparseable function arguments");
                    breaker.record_failure(name);
                    return Attempt::Demote;
                }
            };
            match self.run_function(&*tool, name, args, breaker).await {
                Ok(output) => appended.push(ChatMessage::tool_result(&call.id, output.content)),
                Err(CallError::BudgetOut) => return Attempt::BudgetOut,
                Err(CallError::Failed) => return Attempt::Demote,
            }
        }

        match self.follow_up(request, &appended).await {
            Some(reply) => {
                appended.push(reply);
                Attempt::Resolved(appended)
            }
            None => Attempt::Demote,
        }
    }

    /// Injection pass: re-send with the function schemas spliced into the
    /// system prompt and no native tools advertised.
    async fn injected_json(&self, request: &ChatRequest, breaker: &mut CircuitBreaker) -> Attempt {
        if self.budget.is_exhausted() {
            return Attempt::BudgetOut;
        }
        let specs: Vec<ToolSpec> = self
            .registry
            .specs()
            .into_iter()
            .filter(|spec| !breaker.is_open(&spec.function.name))
            .collect();
        if specs.is_empty() {
            return Attempt::Demote;
        }

        let mut messages = request.messages.clone();
        inject_schemas(&mut messages, &specs);
        let response = match self.provider.chat(ChatRequest::new(messages), None).await {
            Ok(response) => response,
            Err(error) => {
                warn!(%error, "prompt-injection call failed");
                return Attempt::Demote;
            }
        };
        let Some(reply) = response.message().cloned() else {
            return Attempt::Demote;
        };
        let text = reply.text_content().trim().to_string();
        if text.is_empty() {
            return Attempt::Demote;
        }

        let Some((name, args)) = function_request(&text) else {
            // The model chose to reply normally; that is the answer.
            return Attempt::Resolved(vec![reply]);
        };
        let Some(tool) = self.registry.get(&name) else {
            warn!(function = name.as_str(), "injected reply names an unknown function");
            return Attempt::Demote;
        };
        if breaker.is_open(&name) {
            return Attempt::SkipToCategory;
        }
        let output = match self.run_function(&*tool, &name, args, breaker).await {
            Ok(output) => output,
            Err(CallError::BudgetOut) => return Attempt::BudgetOut,
            Err(CallError::Failed) => return Attempt::Demote,
        };

        // Loop back without tools, feeding the result through the prompt.
        let mut working = request.messages.clone();
        working.push(ChatMessage::assistant(text));
        working.push(ChatMessage::system(format!(
            "Function {name} returned: {}\nAnswer the user's question using this result.",
            output.content
        )));
        match self.reply_call(working).await {
            Some(final_reply) => Attempt::Resolved(vec![final_reply]),
            None => Attempt::Demote,
        }
    }

    /// Intent pass: classify the user message deterministically and feed the
    /// result to the provider as a synthesized tool round trip.
    async fn intent_rule(
        &self,
        request: &ChatRequest,
        user_text: &str,
        breaker: &mut CircuitBreaker,
    ) -> Attempt {
        if self.budget.is_exhausted() {
            return Attempt::BudgetOut;
        }
        let Some(intent) = classify(user_text, self.context.now) else {
            return Attempt::Demote;
        };
        if breaker.is_open(&intent.function) {
            return Attempt::SkipToCategory;
        }
        let Some(tool) = self.registry.get(&intent.function) else {
            return Attempt::Demote;
        };

        let output = match self
            .run_function(&*tool, &intent.function, intent.arguments.clone(), breaker)
            .await
        {
            Ok(output) => output,
            Err(CallError::BudgetOut) => return Attempt::BudgetOut,
            Err(CallError::Failed) => return Attempt::Demote,
        };

        let call = ToolCall {
            id: SYNTHETIC_CALL_ID.to_string(),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: intent.function.clone(),
                arguments: intent.arguments,
            },
        };
        let mut working = request.messages.clone();
        working.push(ChatMessage::assistant_tool_calls(vec![call]));
        working.push(ChatMessage::tool_result(SYNTHETIC_CALL_ID, output.content));
        match self.reply_call(working).await {
            Some(final_reply) => Attempt::Resolved(vec![final_reply]),
            None => Attempt::Demote,
        }
    }

    /// Direct execution, then the apology when even that finds nothing.
    async fn finish_direct(&self, user_text: &str) -> LadderOutcome {
        match self.query_category(user_text).await {
            Some(messages) => LadderOutcome {
                messages,
                source: ReplySource::QueryCategory,
            },
            None => apology_outcome(),
        }
    }

    /// Maps the query category onto a catalog function and returns its
    /// rendering as the reply, with no further model involvement.
    async fn query_category(&self, user_text: &str) -> Option<Vec<ChatMessage>> {
        if self.budget.is_exhausted() {
            return None;
        }
        let parsed = extract_query_context(user_text, &self.context.records, self.context.now)?;
        let (name, args) = match parsed.query {
            ParsedQuery::Period { period } => ("periodSummary", period_args(&period)),
            ParsedQuery::Artist { artist } => {
                ("artistStats", serde_json::json!({ "artist": artist }))
            }
            ParsedQuery::Comparison { first, second } => {
                ("comparePeriods", comparison_args(&first, &second))
            }
            ParsedQuery::TopAllTime => ("topArtist", serde_json::json!({ "count": 10 })),
        };

        let tool = self.registry.get(name)?;
        let timeout = self.budget.call_timeout()?;
        let output = match tokio::time::timeout(timeout, tool.invoke(args, self.context)).await {
            Ok(Ok(output)) if !output.is_error => output,
            Ok(Ok(_)) | Ok(Err(_)) | Err(_) => return None,
        };
        let text = output.rendered.unwrap_or(output.content);
        Some(vec![ChatMessage::assistant(text)])
    }

    /// Runs one function under the per-call timeout, updating the breaker.
    async fn run_function(
        &self,
        tool: &dyn crate::tool::ToolFn,
        name: &str,
        args: Value,
        breaker: &mut CircuitBreaker,
    ) -> Result<ToolOutput, CallError> {
        let Some(timeout) = self.budget.call_timeout() else {
            return Err(CallError::BudgetOut);
        };
        match tokio::time::timeout(timeout, tool.invoke(args, self.context)).await {
            Ok(Ok(output)) => {
                breaker.record_success(name);
                Ok(output)
            }
            Ok(Err(error)) => {
                warn!(function = name, %error, "function call failed");
                breaker.record_failure(name);
                Err(CallError::Failed)
            }
            Err(_elapsed) => {
                warn!(function = name, ?timeout, "function call timed out");
                breaker.record_failure(name);
                Err(CallError::Failed)
            }
        }
    }

    /// One follow-up provider call carrying the executed tool results.
    async fn follow_up(&self, request: &ChatRequest, appended: &[ChatMessage]) -> Option<ChatMessage> {
        let mut working = request.messages.clone();
        working.extend(appended.iter().cloned());
        self.reply_call(working).await
    }

    /// Calls the provider without tools and keeps the reply only when it has
    /// text.
    async fn reply_call(&self, messages: Vec<ChatMessage>) -> Option<ChatMessage> {
        if self.budget.is_exhausted() {
            return None;
        }
        match self.provider.chat(ChatRequest::new(messages), None).await {
            Ok(response) => {
                let reply = response.message().cloned()?;
                if reply.text_content().trim().is_empty() {
                    None
                } else {
                    Some(reply)
                }
            }
            Err(error) => {
                warn!(%error, "follow-up call failed");
                None
            }
        }
    }
}

fn apology_outcome() -> LadderOutcome {
    LadderOutcome {
        messages: vec![ChatMessage::assistant(APOLOGY)],
        source: ReplySource::Apology,
    }
}

fn last_user_text(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.text_content().to_string())
        .unwrap_or_default()
}

/// Splices the function schemas and the reply instruction into the system
/// message, inserting one when the request has none.
fn inject_schemas(messages: &mut Vec<ChatMessage>, specs: &[ToolSpec]) {
    let schemas =
        serde_json::to_string_pretty(specs).unwrap_or_else(|_| "[]".to_string());
    let block = format!(
        "## Available functions\n{schemas}\n\nWhen the user's question requires a \
         function, reply with ONLY a JSON object {{\"function\": \"<name>\", \
         \"arguments\": {{...}}}}; otherwise reply normally."
    );
    match messages.iter_mut().find(|m| m.role == Role::System) {
        Some(system) => {
            let existing = system.text_content().to_string();
            system.content = Some(format!("{existing}\n\n{block}"));
        }
        None => messages.insert(0, ChatMessage::system(block)),
    }
}

/// Extracts a `{function, arguments}` request from reply text, if present.
fn function_request(text: &str) -> Option<(String, Value)> {
    let value = first_json_object(text)?;
    let name = value.get("function")?.as_str()?.to_string();
    let raw_args = value.get("arguments").cloned().unwrap_or(Value::Null);
    // Arguments sometimes arrive as a JSON-encoded string; reuse the call
    // parser to absorb both shapes.
    let probe = FunctionCall {
        name: name.clone(),
        arguments: raw_args,
    };
    let args = probe.parse_args().ok()?;
    Some((name, args))
}

/// The first balanced, parseable JSON object inside `text`.
fn first_json_object(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    let mut search_from = 0;
    while let Some(relative) = bytes[search_from..].iter().position(|&b| b == b'{') {
        let start = search_from + relative;
        if let Some(end) = balanced_object_end(bytes, start) {
            if let Ok(value) = serde_json::from_str::<Value>(&text[start..=end]) {
                if value.is_object() {
                    return Some(value);
                }
            }
        }
        search_from = start + 1;
    }
    None
}

fn balanced_object_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match byte {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn comparison_args(first: &Period, second: &Period) -> Value {
    let mut args = serde_json::Map::new();
    for (period, year_key, month_key) in [
        (first, "first_year", "first_month"),
        (second, "second_year", "second_month"),
    ] {
        let keyed = period_args(period);
        if let Some(year) = keyed.get("year") {
            args.insert(year_key.to_string(), year.clone());
        }
        if let Some(month) = keyed.get("month") {
            args.insert(month_key.to_string(), month.clone());
        }
    }
    Value::Object(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use chamber_core::{ChamberError, Choice, ProviderKind, ProviderProfile};
    use serde_json::json;

    use crate::builtin::register_builtins;
    use crate::builtin::tests::sample_context;
    use crate::tool::ToolFn;

    struct ScriptedProvider {
        responses: Mutex<VecDeque<Result<ChatResponse, ChamberError>>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<Result<ChatResponse, ChamberError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn recorded(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatProvider for ScriptedProvider {
        fn profile(&self) -> ProviderProfile {
            ProviderProfile {
                kind: ProviderKind::Ollama,
                model: "test-model".to_string(),
                context_window: 8192,
                has_api_key: false,
            }
        }

        async fn chat(
            &self,
            request: ChatRequest,
            _progress: Option<chamber_core::ProgressSink>,
        ) -> Result<ChatResponse, ChamberError> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Err(ChamberError::Provider {
                        message: "script exhausted".to_string(),
                        source: None,
                    })
                })
        }
    }

    fn text_response(text: &str) -> ChatResponse {
        ChatResponse {
            choices: vec![Choice {
                message: ChatMessage::assistant(text),
                finish_reason: Some("stop".to_string()),
            }],
            model: "test-model".to_string(),
            thinking: None,
        }
    }

    fn tool_call_response(id: &str, name: &str, args: Value) -> ChatResponse {
        let call = ToolCall {
            id: id.to_string(),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: args,
            },
        };
        ChatResponse {
            choices: vec![Choice {
                message: ChatMessage::assistant_tool_calls(vec![call]),
                finish_reason: Some("tool_calls".to_string()),
            }],
            model: "test-model".to_string(),
            thinking: None,
        }
    }

    fn empty_response() -> ChatResponse {
        ChatResponse {
            choices: vec![Choice {
                message: ChatMessage::assistant(""),
                finish_reason: Some("stop".to_string()),
            }],
            model: "test-model".to_string(),
            thinking: None,
        }
    }

    fn request_for(user: &str) -> ChatRequest {
        ChatRequest::new(vec![
            ChatMessage::system("You are a music history assistant."),
            ChatMessage::user(user),
        ])
    }

    fn builtin_registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        register_builtins(&mut registry);
        registry
    }

    /// A function that never finishes within any call timeout.
    struct HangingFn;

    #[async_trait]
    impl ToolFn for HangingFn {
        fn name(&self) -> &str {
            "topArtist"
        }

        fn description(&self) -> &str {
            "Hangs forever"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        async fn invoke(
            &self,
            _args: Value,
            _context: &ToolContext,
        ) -> Result<ToolOutput, ChamberError> {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Ok(ToolOutput::ok("{}", "never"))
        }
    }

    #[tokio::test]
    async fn plain_text_reply_passes_through_untouched() {
        let provider = ScriptedProvider::new(vec![]);
        let registry = builtin_registry();
        let context = sample_context();
        let budget = TurnBudget::start();
        let orchestrator = ToolOrchestrator::new(&provider, &registry, &context, &budget);
        let mut breaker = CircuitBreaker::new();

        let outcome = orchestrator
            .resolve(
                &request_for("hello"),
                text_response("Hi! Ask me about your listening."),
                &mut breaker,
            )
            .await;

        assert_eq!(outcome.source, ReplySource::Direct);
        assert_eq!(outcome.messages.len(), 1);
        assert_eq!(
            outcome.messages[0].text_content(),
            "Hi! Ask me about your listening."
        );
        assert!(provider.recorded().is_empty());
    }

    #[tokio::test]
    async fn native_calls_round_trip_through_the_provider() {
        let provider = ScriptedProvider::new(vec![Ok(text_response(
            "You listened for 1.8 hours in March 2021.",
        ))]);
        let registry = builtin_registry();
        let context = sample_context();
        let budget = TurnBudget::start();
        let orchestrator = ToolOrchestrator::new(&provider, &registry, &context, &budget);
        let mut breaker = CircuitBreaker::new();

        let first = tool_call_response("t1", "hoursInPeriod", json!({"year": 2021, "month": 3}));
        let outcome = orchestrator
            .resolve(
                &request_for("How many hours in March 2021?"),
                first,
                &mut breaker,
            )
            .await;

        assert_eq!(outcome.source, ReplySource::NativeTools);
        assert_eq!(outcome.messages.len(), 3);
        assert!(outcome.messages[0].has_tool_calls());
        assert_eq!(outcome.messages[1].role, Role::Tool);
        assert_eq!(outcome.messages[1].tool_call_id.as_deref(), Some("t1"));
        let facts: Value = serde_json::from_str(outcome.messages[1].text_content()).unwrap();
        assert_eq!(facts["hours"], 1.8);
        assert_eq!(
            outcome.messages[2].text_content(),
            "You listened for 1.8 hours in March 2021."
        );

        // The follow-up request carried the tool scaffolding and no tools.
        let recorded = provider.recorded();
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0].tools.is_none());
        let roles: Vec<Role> = recorded[0].messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::Tool]
        );
    }

    #[tokio::test]
    async fn string_encoded_arguments_are_accepted() {
        let provider = ScriptedProvider::new(vec![Ok(text_response("34.5 hours."))]);
        let registry = builtin_registry();
        let context = sample_context();
        let budget = TurnBudget::start();
        let orchestrator = ToolOrchestrator::new(&provider, &registry, &context, &budget);
        let mut breaker = CircuitBreaker::new();

        let first = tool_call_response(
            "t1",
            "hoursInPeriod",
            Value::String(r#"{"year":2021,"month":3}"#.to_string()),
        );
        let outcome = orchestrator
            .resolve(
                &request_for("How many hours in March 2021?"),
                first,
                &mut breaker,
            )
            .await;

        assert_eq!(outcome.source, ReplySource::NativeTools);
        let facts: Value = serde_json::from_str(outcome.messages[1].text_content()).unwrap();
        assert_eq!(facts["period"], "March 2021");
    }

    #[tokio::test]
    async fn structural_failure_demotes_to_prompt_injection() {
        let provider = ScriptedProvider::new(vec![
            Ok(text_response(r#"{"function": "topArtist", "arguments": {"year": 2021}}"#)),
            Ok(text_response("Paramore was your top artist in 2021.")),
        ]);
        let registry = builtin_registry();
        let context = sample_context();
        let budget = TurnBudget::start();
        let orchestrator = ToolOrchestrator::new(&provider, &registry, &context, &budget);
        let mut breaker = CircuitBreaker::new();

        let outcome = orchestrator
            .resolve(&request_for("Top artist 2021?"), empty_response(), &mut breaker)
            .await;

        assert_eq!(outcome.source, ReplySource::InjectedJson);
        assert_eq!(outcome.messages.len(), 1);
        assert_eq!(
            outcome.messages[0].text_content(),
            "Paramore was your top artist in 2021."
        );

        let recorded = provider.recorded();
        assert_eq!(recorded.len(), 2);
        // First retry carries the schemas in the system prompt, no tools.
        let system = recorded[0].messages[0].text_content();
        assert!(system.contains("Available functions"));
        assert!(system.contains("topArtist"));
        assert!(recorded[0].tools.is_none());
        // The loop-back feeds the function result through the prompt.
        let feed = recorded[1]
            .messages
            .iter()
            .find(|m| m.role == Role::System && m.text_content().contains("returned"))
            .unwrap();
        assert!(feed.text_content().contains("Paramore"));
    }

    #[tokio::test]
    async fn injected_normal_reply_is_kept_as_the_answer() {
        let provider = ScriptedProvider::new(vec![Ok(text_response(
            "Nothing to compute, just enjoy the music!",
        ))]);
        let registry = builtin_registry();
        let context = sample_context();
        let budget = TurnBudget::start();
        let orchestrator = ToolOrchestrator::new(&provider, &registry, &context, &budget);
        let mut breaker = CircuitBreaker::new();

        let outcome = orchestrator
            .resolve(&request_for("Any thoughts?"), empty_response(), &mut breaker)
            .await;

        assert_eq!(outcome.source, ReplySource::InjectedJson);
        assert_eq!(
            outcome.messages[0].text_content(),
            "Nothing to compute, just enjoy the music!"
        );
    }

    #[tokio::test]
    async fn provider_failure_falls_through_to_intent_classification() {
        let provider = ScriptedProvider::new(vec![
            Err(ChamberError::Provider {
                message: "connection refused".to_string(),
                source: None,
            }),
            Ok(text_response("Your top artist in 2021 was Paramore.")),
        ]);
        let registry = builtin_registry();
        let context = sample_context();
        let budget = TurnBudget::start();
        let orchestrator = ToolOrchestrator::new(&provider, &registry, &context, &budget);
        let mut breaker = CircuitBreaker::new();

        let outcome = orchestrator
            .resolve(
                &request_for("Who was my top artist in 2021?"),
                empty_response(),
                &mut breaker,
            )
            .await;

        assert_eq!(outcome.source, ReplySource::IntentRule);
        assert_eq!(
            outcome.messages[0].text_content(),
            "Your top artist in 2021 was Paramore."
        );

        // The intent round trip synthesized a call and a tool result.
        let recorded = provider.recorded();
        assert_eq!(recorded.len(), 2);
        let synthesized = &recorded[1].messages;
        let assistant = synthesized
            .iter()
            .find(|m| m.has_tool_calls())
            .unwrap();
        assert_eq!(
            assistant.tool_calls.as_ref().unwrap()[0].function.name,
            "topArtist"
        );
        assert!(
            synthesized
                .iter()
                .any(|m| m.role == Role::Tool && m.text_content().contains("Paramore"))
        );
    }

    #[tokio::test]
    async fn dead_provider_still_answers_from_the_query_category() {
        let provider = ScriptedProvider::new(vec![]);
        let registry = builtin_registry();
        let context = sample_context();
        let budget = TurnBudget::start();
        let orchestrator = ToolOrchestrator::new(&provider, &registry, &context, &budget);
        let mut breaker = CircuitBreaker::new();

        let outcome = orchestrator
            .resolve(
                &request_for("Tell me about Paramore"),
                empty_response(),
                &mut breaker,
            )
            .await;

        assert_eq!(outcome.source, ReplySource::QueryCategory);
        assert_eq!(outcome.messages.len(), 1);
        assert!(outcome.messages[0].text_content().starts_with("Paramore: 2 plays"));
        assert!(!outcome.messages[0].error);
    }

    #[tokio::test]
    async fn end_of_ladder_yields_the_apology() {
        let provider = ScriptedProvider::new(vec![]);
        let registry = builtin_registry();
        let context = sample_context();
        let budget = TurnBudget::start();
        let orchestrator = ToolOrchestrator::new(&provider, &registry, &context, &budget);
        let mut breaker = CircuitBreaker::new();

        let outcome = orchestrator
            .resolve(&request_for("Tell me a joke"), empty_response(), &mut breaker)
            .await;

        assert_eq!(outcome.source, ReplySource::Apology);
        assert!(outcome.messages[0].text_content().starts_with("Sorry"));
    }

    #[tokio::test]
    async fn open_circuit_skips_the_model_levels() {
        let provider = ScriptedProvider::new(vec![]);
        let registry = builtin_registry();
        let context = sample_context();
        let budget = TurnBudget::start();
        let orchestrator = ToolOrchestrator::new(&provider, &registry, &context, &budget);
        let mut breaker = CircuitBreaker::new();
        for _ in 0..3 {
            breaker.record_failure("topArtist");
        }

        let first = tool_call_response("t1", "topArtist", json!({"year": 2020}));
        let outcome = orchestrator
            .resolve(&request_for("Top artist 2020"), first, &mut breaker)
            .await;

        // Straight to direct execution: no provider calls at all.
        assert_eq!(outcome.source, ReplySource::QueryCategory);
        assert!(provider.recorded().is_empty());
        assert!(outcome.messages[0].text_content().contains("2020"));
    }

    #[tokio::test]
    async fn exhausted_budget_skips_every_pending_level() {
        let provider = ScriptedProvider::new(vec![]);
        let registry = builtin_registry();
        let context = sample_context();
        let budget = TurnBudget::with_limit(Duration::ZERO);
        let orchestrator = ToolOrchestrator::new(&provider, &registry, &context, &budget);
        let mut breaker = CircuitBreaker::new();

        let first = tool_call_response("t1", "hoursInPeriod", json!({"year": 2021}));
        let outcome = orchestrator
            .resolve(&request_for("Hours in 2021?"), first, &mut breaker)
            .await;

        assert_eq!(outcome.source, ReplySource::Apology);
        assert!(provider.recorded().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_function_times_out_and_demotes() {
        let provider = ScriptedProvider::new(vec![Ok(text_response(
            "Let me answer without the function instead.",
        ))]);
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(HangingFn));
        let context = sample_context();
        let budget = TurnBudget::start();
        let orchestrator = ToolOrchestrator::new(&provider, &registry, &context, &budget);
        let mut breaker = CircuitBreaker::new();

        let first = tool_call_response("t1", "topArtist", json!({"year": 2020}));
        let outcome = orchestrator
            .resolve(&request_for("Top artist 2020"), first, &mut breaker)
            .await;

        // Timed out at the native level, resolved by the injected reply.
        assert_eq!(outcome.source, ReplySource::InjectedJson);
        assert_eq!(
            outcome.messages[0].text_content(),
            "Let me answer without the function instead."
        );
        assert!(!breaker.is_open("topArtist"));
    }

    #[tokio::test]
    async fn unknown_function_demotes_without_tripping_the_breaker() {
        let provider = ScriptedProvider::new(vec![Ok(text_response("A plain answer."))]);
        let registry = builtin_registry();
        let context = sample_context();
        let budget = TurnBudget::start();
        let orchestrator = ToolOrchestrator::new(&provider, &registry, &context, &budget);
        let mut breaker = CircuitBreaker::new();

        let first = tool_call_response("t1", "launchMissiles", json!({}));
        let outcome = orchestrator
            .resolve(&request_for("Do something"), first, &mut breaker)
            .await;

        assert_eq!(outcome.source, ReplySource::InjectedJson);
        assert!(!breaker.is_open("launchMissiles"));
    }

    #[test]
    fn first_json_object_finds_objects_in_prose() {
        let value = first_json_object(
            "Sure thing: {\"function\": \"topArtist\", \"arguments\": {\"year\": 2020}} done",
        )
        .unwrap();
        assert_eq!(value["function"], "topArtist");
        assert_eq!(value["arguments"]["year"], 2020);
    }

    #[test]
    fn first_json_object_handles_braces_inside_strings() {
        let value =
            first_json_object(r#"{"function": "echo", "arguments": {"text": "look: { and }"}}"#)
                .unwrap();
        assert_eq!(value["arguments"]["text"], "look: { and }");
    }

    #[test]
    fn first_json_object_skips_unparseable_candidates() {
        let value = first_json_object(r#"{not json} then {"function": "f"}"#).unwrap();
        assert_eq!(value["function"], "f");
    }

    #[test]
    fn first_json_object_rejects_plain_text() {
        assert!(first_json_object("no objects here").is_none());
        assert!(first_json_object("unbalanced { brace").is_none());
    }

    #[test]
    fn comparison_args_carry_both_periods() {
        let first = Period::year(2021).unwrap();
        let second = Period::month(2022, 2).unwrap();
        let args = comparison_args(&first, &second);
        assert_eq!(
            args,
            json!({"first_year": 2021, "second_year": 2022, "second_month": 2})
        );
    }
}
