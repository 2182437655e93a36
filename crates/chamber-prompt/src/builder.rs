// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Budget-aware prompt assembly.
//!
//! The templated base prompt is composed first and is never truncated.
//! Appendages are then admitted in a fixed order: retrieved listening
//! context under the all-or-half rule, then deterministic query facts under
//! a ninety percent ceiling.

use tracing::{debug, warn};

use chamber_tokens::TokenEstimator;

use crate::template::{PromptInputs, PromptTemplate};

const RAG_HEADER: &str = "\n\nRelevant listening history:\n";
const QUERY_HEADER: &str = "\n\nDeterministic listening facts:\n";

/// Fraction of the context window reserved for the base prompt.
const BASE_RESERVE: f64 = 0.5;

/// Retrieved context keeps at least this fraction of itself or is dropped.
const RAG_KEEP_FLOOR: f64 = 0.5;

/// Ceiling for admitting query facts, as a fraction of the window.
const QUERY_CEILING: f64 = 0.9;

/// What happened to the retrieved context block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RagDisposition {
    /// No retrieved context was offered.
    Absent,
    /// Appended in full.
    Full,
    /// Appended after a proportional character cut.
    Truncated,
    /// Needed more than half removed, so it was left out entirely.
    Dropped,
}

/// The assembled system prompt with its accounting.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltPrompt {
    pub text: String,
    pub base_tokens: u32,
    pub total_tokens: u32,
    pub rag: RagDisposition,
    pub query_context_included: bool,
    /// The base prompt alone exceeded its reserved half of the window.
    pub base_exceeds_reserve: bool,
}

/// Assembles system prompts for one model and window size.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    template: PromptTemplate,
    estimator: TokenEstimator,
}

impl PromptBuilder {
    pub fn new(template: PromptTemplate, estimator: TokenEstimator) -> Self {
        Self {
            template,
            estimator,
        }
    }

    pub fn build(
        &self,
        model: &str,
        context_window: u32,
        inputs: &PromptInputs<'_>,
        rag_context: Option<&str>,
        query_context: Option<&str>,
    ) -> BuiltPrompt {
        let base = self.template.render(inputs);
        let base_tokens = self.estimator.estimate_text(model, &base);

        let reserve = (context_window as f64 * BASE_RESERVE) as u32;
        let base_exceeds_reserve = base_tokens > reserve;
        if base_exceeds_reserve {
            warn!(
                base_tokens,
                reserve, context_window, "base prompt exceeds its reserved share of the window"
            );
        }

        let mut text = base;
        let mut total_tokens = base_tokens;

        let rag = match rag_context.map(str::trim).filter(|r| !r.is_empty()) {
            None => RagDisposition::Absent,
            Some(rag_text) => {
                let header_tokens = self.estimator.estimate_text(model, RAG_HEADER);
                let rag_tokens = self.estimator.estimate_text(model, rag_text);
                let allowed = context_window.saturating_sub(total_tokens + header_tokens);
                if rag_tokens <= allowed {
                    text.push_str(RAG_HEADER);
                    text.push_str(rag_text);
                    total_tokens += header_tokens + rag_tokens;
                    RagDisposition::Full
                } else {
                    let keep_fraction = allowed as f64 / rag_tokens as f64;
                    if keep_fraction < RAG_KEEP_FLOOR {
                        debug!(
                            rag_tokens,
                            allowed, "retrieved context dropped, would need more than half cut"
                        );
                        RagDisposition::Dropped
                    } else {
                        let kept = proportional_cut(rag_text, keep_fraction);
                        let kept_tokens = self.estimator.estimate_text(model, kept);
                        debug!(
                            rag_tokens,
                            kept_tokens, "retrieved context truncated proportionally"
                        );
                        text.push_str(RAG_HEADER);
                        text.push_str(kept);
                        total_tokens += header_tokens + kept_tokens;
                        RagDisposition::Truncated
                    }
                }
            }
        };

        let query_context_included = match query_context.map(str::trim).filter(|q| !q.is_empty()) {
            None => false,
            Some(query_text) => {
                let header_tokens = self.estimator.estimate_text(model, QUERY_HEADER);
                let query_tokens = self.estimator.estimate_text(model, query_text);
                let ceiling = (context_window as f64 * QUERY_CEILING) as u32;
                if total_tokens + header_tokens + query_tokens <= ceiling {
                    text.push_str(QUERY_HEADER);
                    text.push_str(query_text);
                    total_tokens += header_tokens + query_tokens;
                    true
                } else {
                    debug!(query_tokens, ceiling, "query facts omitted, over the ceiling");
                    false
                }
            }
        };

        BuiltPrompt {
            text,
            base_tokens,
            total_tokens,
            rag,
            query_context_included,
            base_exceeds_reserve,
        }
    }
}

/// Keep the leading `fraction` of `text`, cut on a character boundary.
fn proportional_cut(text: &str, fraction: f64) -> &str {
    let total_chars = text.chars().count();
    let keep_chars = (total_chars as f64 * fraction).floor() as usize;
    let cut_byte = text
        .char_indices()
        .nth(keep_chars)
        .map(|(byte, _)| byte)
        .unwrap_or(text.len());
    &text[..cut_byte]
}

#[cfg(test)]
mod tests {
    use super::*;

    // The default family table has no entry for "novel", so the fallback
    // ratio of 4 characters per token applies throughout.
    const MODEL: &str = "novel";

    fn builder() -> PromptBuilder {
        PromptBuilder::new(
            PromptTemplate::new("base prompt for {personality}"),
            TokenEstimator::default(),
        )
    }

    fn inputs<'a>() -> PromptInputs<'a> {
        PromptInputs {
            personality: "the Archivist",
            ..PromptInputs::default()
        }
    }

    #[test]
    fn rag_appended_in_full_when_it_fits() {
        let built = builder().build(MODEL, 1_000, &inputs(), Some("short context"), None);
        assert_eq!(built.rag, RagDisposition::Full);
        assert!(built.text.contains("Relevant listening history:\nshort context"));
        assert!(built.total_tokens <= 1_000);
    }

    #[test]
    fn rag_truncated_proportionally_when_half_or_less_must_go() {
        // Base and header are 8 tokens each, so window 60 leaves 44 for the
        // context text. A 60 token context keeps 44/60 of itself, inside the
        // half rule.
        let rag = "x".repeat(4 * 60);
        let built = builder().build(MODEL, 60, &inputs(), Some(&rag), None);
        assert_eq!(built.rag, RagDisposition::Truncated);
        assert!(built.total_tokens <= 60);
        assert!(built.text.contains("Relevant listening history:"));
    }

    #[test]
    fn rag_dropped_when_more_than_half_must_go() {
        let rag = "x".repeat(4 * 280);
        let built = builder().build(MODEL, 60, &inputs(), Some(&rag), None);
        assert_eq!(built.rag, RagDisposition::Dropped);
        assert!(!built.text.contains("Relevant listening history"));
    }

    #[test]
    fn whitespace_rag_counts_as_absent() {
        let built = builder().build(MODEL, 1_000, &inputs(), Some("   "), None);
        assert_eq!(built.rag, RagDisposition::Absent);
    }

    #[test]
    fn query_facts_admitted_under_ninety_percent() {
        let built = builder().build(MODEL, 1_000, &inputs(), None, Some("42 plays in March"));
        assert!(built.query_context_included);
        assert!(built.text.contains("Deterministic listening facts:\n42 plays in March"));
    }

    #[test]
    fn query_facts_omitted_over_ninety_percent() {
        // Window 100 → ceiling 90. A 95-token fact block plus base cannot fit.
        let facts = "f".repeat(4 * 95);
        let built = builder().build(MODEL, 100, &inputs(), None, Some(&facts));
        assert!(!built.query_context_included);
        assert!(!built.text.contains("Deterministic listening facts"));
    }

    #[test]
    fn query_facts_are_never_truncated_only_omitted() {
        let facts = "f".repeat(4 * 95);
        let built = builder().build(MODEL, 100, &inputs(), None, Some(&facts));
        assert_eq!(built.text, "base prompt for the Archivist");
    }

    #[test]
    fn oversized_base_is_flagged_but_never_cut() {
        let big_base = "b".repeat(4 * 80);
        let builder = PromptBuilder::new(PromptTemplate::new(big_base.clone()), TokenEstimator::default());
        let built = builder.build(MODEL, 100, &PromptInputs::default(), None, None);
        assert!(built.base_exceeds_reserve);
        assert_eq!(built.text, big_base);
    }

    #[test]
    fn base_within_reserve_is_not_flagged() {
        let built = builder().build(MODEL, 1_000, &inputs(), None, None);
        assert!(!built.base_exceeds_reserve);
    }

    #[test]
    fn proportional_cut_lands_on_char_boundary() {
        let text = "héllö wörld repeated héllö wörld";
        let cut = proportional_cut(text, 0.5);
        assert!(cut.len() < text.len());
        assert!(text.starts_with(cut));
    }

    #[test]
    fn rag_decision_happens_before_query_gate() {
        // Both appendages offered; RAG admitted first, then facts checked
        // against what remains below the ceiling.
        let rag = "r".repeat(4 * 100);
        let facts = "q".repeat(4 * 700);
        let built = builder().build(MODEL, 1_000, &inputs(), Some(&rag), Some(&facts));
        assert_eq!(built.rag, RagDisposition::Full);
        assert!(built.query_context_included);
        assert!(built.total_tokens <= 1_000);
    }
}
