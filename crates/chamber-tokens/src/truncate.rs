// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! History truncation that fits a request under a token target.
//!
//! Reduction order: whole turns oldest-first, then advertised tool schemas,
//! then retrieved context, then tool-call plumbing on older turns. The last
//! user message always survives, along with at least one earlier exchange
//! when the history has one. A single oversized turn is returned as-is
//! rather than emptying the history.

use tracing::debug;

use chamber_core::{ChatMessage, Role, ToolSpec};

use crate::estimator::TokenEstimator;

/// Owned request inputs being reduced.
#[derive(Debug, Clone)]
pub struct TruncationInput {
    pub messages: Vec<ChatMessage>,
    pub system_prompt: String,
    pub rag_context: Option<String>,
    pub tools: Option<Vec<ToolSpec>>,
}

/// The reduced request plus a record of what was dropped.
#[derive(Debug, Clone)]
pub struct TruncationOutcome {
    pub messages: Vec<ChatMessage>,
    pub rag_context: Option<String>,
    pub tools: Option<Vec<ToolSpec>>,
    pub dropped_messages: usize,
    pub dropped_tools: bool,
    pub dropped_rag: bool,
    /// Estimated total of the reduced request.
    pub final_tokens: u32,
}

/// Reduce a request until its estimate fits `target_tokens`.
///
/// The system prompt is never touched here; it is counted but belongs to
/// the prompt builder.
pub fn truncate_to_target(
    estimator: &TokenEstimator,
    model: &str,
    input: TruncationInput,
    target_tokens: u32,
) -> TruncationOutcome {
    let TruncationInput {
        mut messages,
        system_prompt,
        mut rag_context,
        mut tools,
    } = input;

    let original_len = messages.len();
    let mut dropped_tools = false;
    let mut dropped_rag = false;

    let total = |messages: &[ChatMessage],
                 rag: &Option<String>,
                 tools: &Option<Vec<ToolSpec>>|
     -> u32 {
        estimator.estimate_messages(model, messages)
            + estimator.estimate_text(model, &system_prompt)
            + rag
                .as_deref()
                .map(|r| estimator.estimate_text(model, r))
                .unwrap_or(0)
            + tools
                .as_deref()
                .map(|t| estimator.estimate_tools(model, t))
                .unwrap_or(0)
    };

    // Stage 1: drop whole turns, oldest first, keeping the final turn and
    // one full exchange before it.
    while total(&messages, &rag_context, &tools) > target_tokens {
        let starts = turn_starts(&messages);
        if starts.len() <= 2 {
            break;
        }
        let next_turn = starts[1];
        messages.drain(..next_turn);
    }

    // Stage 2: drop advertised tool schemas.
    if total(&messages, &rag_context, &tools) > target_tokens && tools.is_some() {
        tools = None;
        dropped_tools = true;
    }

    // Stage 3: drop retrieved context.
    if total(&messages, &rag_context, &tools) > target_tokens && rag_context.is_some() {
        rag_context = None;
        dropped_rag = true;
    }

    // Stage 4: strip tool-call plumbing from everything before the final
    // turn. The text the user saw stays intact.
    if total(&messages, &rag_context, &tools) > target_tokens {
        let last_turn = turn_starts(&messages).last().copied().unwrap_or(0);
        let before = messages.len();
        let mut index = 0;
        messages.retain(|message| {
            let keep = index >= last_turn || message.role != Role::Tool;
            index += 1;
            keep
        });
        let last_turn = turn_starts(&messages).last().copied().unwrap_or(0);
        for message in &mut messages[..last_turn] {
            if message.tool_calls.is_some() && message.content.is_some() {
                message.tool_calls = None;
            }
        }
        debug!(
            removed = before - messages.len(),
            "stripped tool plumbing from older turns"
        );
    }

    let final_tokens = total(&messages, &rag_context, &tools);
    let dropped_messages = original_len - messages.len();
    if dropped_messages > 0 || dropped_tools || dropped_rag {
        debug!(
            dropped_messages,
            dropped_tools, dropped_rag, final_tokens, target_tokens, "truncated request"
        );
    }

    TruncationOutcome {
        messages,
        rag_context,
        tools,
        dropped_messages,
        dropped_tools,
        dropped_rag,
        final_tokens,
    }
}

/// Indices where turns begin. A turn starts at each user message; any
/// leading non-user messages belong to the first turn.
fn turn_starts(messages: &[ChatMessage]) -> Vec<usize> {
    let mut starts = Vec::new();
    for (index, message) in messages.iter().enumerate() {
        if message.role == Role::User {
            if starts.is_empty() && index > 0 {
                starts.push(0);
            }
            starts.push(index);
        }
    }
    if starts.is_empty() && !messages.is_empty() {
        starts.push(0);
    }
    starts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(user_chars: usize, assistant_chars: usize) -> Vec<ChatMessage> {
        vec![
            ChatMessage::user("u".repeat(user_chars)),
            ChatMessage::assistant("a".repeat(assistant_chars)),
        ]
    }

    fn input(messages: Vec<ChatMessage>) -> TruncationInput {
        TruncationInput {
            messages,
            system_prompt: "You are a music archivist.".to_string(),
            rag_context: None,
            tools: None,
        }
    }

    #[test]
    fn drops_oldest_turns_first() {
        let mut messages = Vec::new();
        for _ in 0..20 {
            messages.extend(exchange(4000, 4000));
        }
        messages.push(ChatMessage::user("and in march 2024?"));

        let estimator = TokenEstimator::default();
        let before = estimator.estimate_messages("novel", &messages);
        let target = before / 3;
        let outcome = truncate_to_target(&estimator, "novel", input(messages), target);

        assert!(outcome.final_tokens <= target);
        assert!(outcome.dropped_messages > 0);
        // The newest content survives at the tail.
        assert_eq!(
            outcome.messages.last().unwrap().text_content(),
            "and in march 2024?"
        );
        // Drops came off the front.
        assert_eq!(outcome.messages.first().unwrap().role, Role::User);
    }

    #[test]
    fn keeps_last_user_message_and_one_prior_exchange() {
        let mut messages = exchange(50_000, 50_000);
        messages.extend(exchange(50_000, 50_000));
        messages.push(ChatMessage::user("final question"));

        let estimator = TokenEstimator::default();
        let outcome = truncate_to_target(&estimator, "novel", input(messages), 100);

        // Over budget, but the floor holds: one prior exchange plus the
        // final user message.
        let roles: Vec<Role> = outcome.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(
            outcome.messages.last().unwrap().text_content(),
            "final question"
        );
    }

    #[test]
    fn single_oversized_message_is_never_dropped() {
        let messages = vec![ChatMessage::user("g".repeat(500_000))];
        let estimator = TokenEstimator::default();
        let outcome = truncate_to_target(&estimator, "novel", input(messages), 100);
        assert_eq!(outcome.messages.len(), 1);
        assert!(outcome.final_tokens > 100);
    }

    #[test]
    fn tools_then_rag_are_dropped_when_turns_cannot_shrink() {
        let mut messages = exchange(2000, 2000);
        messages.push(ChatMessage::user("one more thing"));
        let tools = vec![ToolSpec::function(
            "topArtist",
            "d".repeat(2000),
            serde_json::json!({"type": "object"}),
        )];
        let input = TruncationInput {
            messages,
            system_prompt: String::new(),
            rag_context: Some("r".repeat(2000)),
            tools: Some(tools),
        };
        let estimator = TokenEstimator::default();
        let outcome = truncate_to_target(&estimator, "novel", input, 1100);
        assert!(outcome.dropped_tools);
        assert!(outcome.dropped_rag);
        assert!(outcome.tools.is_none());
        assert!(outcome.rag_context.is_none());
    }

    #[test]
    fn plumbing_stripped_only_from_older_turns() {
        let calls = vec![chamber_core::ToolCall {
            id: "call_1".into(),
            call_type: "function".into(),
            function: chamber_core::FunctionCall {
                name: "hoursInPeriod".into(),
                arguments: serde_json::json!({"period": "x".repeat(4000)}),
            },
        }];
        let mut older_assistant = ChatMessage::assistant("a".repeat(2000));
        older_assistant.tool_calls = Some(calls.clone());
        let messages = vec![
            ChatMessage::user("how long did I listen in 2023?"),
            older_assistant,
            ChatMessage::tool_result("call_1", "t".repeat(2000)),
            ChatMessage::assistant("about 300 hours"),
            ChatMessage::user("and 2024?"),
        ];
        let estimator = TokenEstimator::default();
        let outcome = truncate_to_target(&estimator, "novel", input(messages), 700);

        assert!(outcome.messages.iter().all(|m| m.role != Role::Tool));
        assert!(outcome.messages.iter().all(|m| m.tool_calls.is_none()));
        // Older assistant text is preserved even though its plumbing is gone.
        assert!(outcome.messages.iter().any(|m| m.text_content().starts_with('a')));
        assert_eq!(outcome.messages.last().unwrap().text_content(), "and 2024?");
    }

    #[test]
    fn fitting_history_passes_through_untouched() {
        let messages = vec![
            ChatMessage::user("hello"),
            ChatMessage::assistant("hi"),
            ChatMessage::user("stats please"),
        ];
        let estimator = TokenEstimator::default();
        let outcome = truncate_to_target(&estimator, "novel", input(messages.clone()), 10_000);
        assert_eq!(outcome.messages, messages);
        assert_eq!(outcome.dropped_messages, 0);
        assert!(!outcome.dropped_tools);
        assert!(!outcome.dropped_rag);
    }
}
