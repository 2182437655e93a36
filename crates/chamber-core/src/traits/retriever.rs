// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retrieval capability supplying listening-history context for a query.

use async_trait::async_trait;

use crate::error::ChamberError;

/// Supplies retrieved listening-history snippets relevant to a user query.
///
/// Retrieval is best-effort: callers treat errors as "no context" and
/// continue the turn without it.
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    /// Returns a context block for the query, or `None` when nothing relevant
    /// is indexed.
    async fn retrieve(&self, query: &str) -> Result<Option<String>, ChamberError>;
}
