// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Router-layer error taxonomy.

use std::time::Duration;

use thiserror::Error;

use chamber_core::{ChamberError, ProviderKind};

/// What went wrong talking to a chat backend.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The backend answered 2xx but the body had no usable choices.
    #[error("invalid provider response: {detail}")]
    InvalidResponse { detail: String },

    /// The cloud backend rejected the bearer token.
    #[error("api key rejected (401); the token has expired or was revoked")]
    TokenExpired,

    /// The backend asked us to back off.
    #[error("rate limited (429)")]
    RateLimited,

    /// Any other non-2xx answer.
    #[error("provider returned {status}: {body}")]
    Server { status: u16, body: String },

    /// Transport failure before a status line arrived.
    #[error("network failure: {detail}")]
    Network { detail: String },

    /// The call outlived its deadline.
    #[error("{provider} call timed out after {elapsed:?}")]
    Timeout {
        provider: ProviderKind,
        elapsed: Duration,
    },
}

impl From<ProviderError> for ChamberError {
    fn from(err: ProviderError) -> Self {
        ChamberError::Provider {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}
