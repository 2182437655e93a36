// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Incremental `<think>` region scanner.
//!
//! Local models interleave reasoning inside `<think>...</think>` tags.
//! The scanner splits an incoming text stream into thinking and visible
//! segments, tolerating tags split across chunk boundaries.

const OPEN_TAG: &str = "<think>";
const CLOSE_TAG: &str = "</think>";

/// One classified span of streamed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Thinking(String),
    Visible(String),
}

/// Streaming splitter for `<think>` regions.
///
/// Feed chunks as they arrive; call [`ThinkScanner::finish`] once the stream
/// ends to flush any held-back tail.
#[derive(Debug, Default)]
pub struct ThinkScanner {
    in_think: bool,
    pending: String,
}

impl ThinkScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &str) -> Vec<Segment> {
        self.pending.push_str(chunk);
        let mut out = Vec::new();
        loop {
            let marker = if self.in_think { CLOSE_TAG } else { OPEN_TAG };
            match self.pending.find(marker) {
                Some(pos) => {
                    if pos > 0 {
                        let before: String = self.pending.drain(..pos).collect();
                        out.push(self.classify(before));
                    }
                    self.pending.drain(..marker.len());
                    self.in_think = !self.in_think;
                }
                None => {
                    // Hold back a tail that might be the start of the marker.
                    let hold = partial_marker_len(&self.pending, marker);
                    let emit_len = self.pending.len() - hold;
                    if emit_len > 0 {
                        let emitted: String = self.pending.drain(..emit_len).collect();
                        out.push(self.classify(emitted));
                    }
                    break;
                }
            }
        }
        out
    }

    /// Flush whatever is still held back as literal text.
    pub fn finish(&mut self) -> Vec<Segment> {
        if self.pending.is_empty() {
            return Vec::new();
        }
        let tail = std::mem::take(&mut self.pending);
        vec![self.classify(tail)]
    }

    fn classify(&self, text: String) -> Segment {
        if self.in_think {
            Segment::Thinking(text)
        } else {
            Segment::Visible(text)
        }
    }
}

/// Length of the longest buffer suffix that is a proper prefix of `marker`.
fn partial_marker_len(buffer: &str, marker: &str) -> usize {
    let max = marker.len().saturating_sub(1).min(buffer.len());
    for len in (1..=max).rev() {
        if buffer.ends_with(&marker[..len]) {
            return len;
        }
    }
    0
}

/// Split a complete text into its visible body and joined thinking content.
pub fn split_thinking(text: &str) -> (String, Option<String>) {
    let mut scanner = ThinkScanner::new();
    let mut segments = scanner.feed(text);
    segments.extend(scanner.finish());

    let mut visible = String::new();
    let mut thinking = String::new();
    for segment in segments {
        match segment {
            Segment::Visible(t) => visible.push_str(&t),
            Segment::Thinking(t) => thinking.push_str(&t),
        }
    }
    let thinking = {
        let trimmed = thinking.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    };
    (visible, thinking)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(chunks: &[&str]) -> Vec<Segment> {
        let mut scanner = ThinkScanner::new();
        let mut out = Vec::new();
        for chunk in chunks {
            out.extend(scanner.feed(chunk));
        }
        out.extend(scanner.finish());
        out
    }

    fn joined(segments: &[Segment]) -> (String, String) {
        let mut visible = String::new();
        let mut thinking = String::new();
        for segment in segments {
            match segment {
                Segment::Visible(t) => visible.push_str(t),
                Segment::Thinking(t) => thinking.push_str(t),
            }
        }
        (visible, thinking)
    }

    #[test]
    fn plain_text_is_all_visible() {
        let (visible, thinking) = joined(&feed_all(&["hello ", "world"]));
        assert_eq!(visible, "hello world");
        assert_eq!(thinking, "");
    }

    #[test]
    fn whole_region_in_one_chunk() {
        let (visible, thinking) =
            joined(&feed_all(&["before <think>reasoning</think> after"]));
        assert_eq!(visible, "before  after");
        assert_eq!(thinking, "reasoning");
    }

    #[test]
    fn open_tag_split_across_chunks() {
        let (visible, thinking) =
            joined(&feed_all(&["before <th", "ink>inside</think>after"]));
        assert_eq!(visible, "before after");
        assert_eq!(thinking, "inside");
    }

    #[test]
    fn close_tag_split_across_chunks() {
        let (visible, thinking) =
            joined(&feed_all(&["<think>inside</thi", "nk>visible"]));
        assert_eq!(visible, "visible");
        assert_eq!(thinking, "inside");
    }

    #[test]
    fn tag_split_one_char_at_a_time() {
        let chunks: Vec<String> = "<think>ab</think>cd".chars().map(String::from).collect();
        let refs: Vec<&str> = chunks.iter().map(String::as_str).collect();
        let (visible, thinking) = joined(&feed_all(&refs));
        assert_eq!(visible, "cd");
        assert_eq!(thinking, "ab");
    }

    #[test]
    fn unterminated_think_flushes_as_thinking() {
        let (visible, thinking) = joined(&feed_all(&["<think>never closed"]));
        assert_eq!(visible, "");
        assert_eq!(thinking, "never closed");
    }

    #[test]
    fn lone_angle_bracket_is_literal() {
        let (visible, thinking) = joined(&feed_all(&["a < b and <thinker> c"]));
        assert_eq!(visible, "a < b and <thinker> c");
        assert_eq!(thinking, "");
    }

    #[test]
    fn multiple_regions_accumulate() {
        let (visible, thinking) =
            joined(&feed_all(&["<think>one</think>mid<think>two</think>end"]));
        assert_eq!(visible, "midend");
        assert_eq!(thinking, "onetwo");
    }

    #[test]
    fn split_thinking_on_complete_text() {
        let (visible, thinking) = split_thinking("<think>plan</think>The answer is 4.");
        assert_eq!(visible, "The answer is 4.");
        assert_eq!(thinking.as_deref(), Some("plan"));

        let (visible, thinking) = split_thinking("no tags here");
        assert_eq!(visible, "no tags here");
        assert!(thinking.is_none());
    }
}
