// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Rhythm Chamber turn engine.
//!
//! This crate provides the foundational trait definitions, error types, and
//! common types used throughout the Rhythm Chamber workspace. The engine's
//! environment (clock, ids, storage, providers, retrieval) is expressed as
//! capability traits defined here so hosts and tests supply their own.

pub mod bus;
pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use bus::{EngineEvent, EventBus};
pub use error::ChamberError;
pub use types::{
    ChatMessage, ChatRequest, ChatResponse, Choice, EmergencyBackup, FunctionCall,
    ListenerProfile, ProviderKind, Role, Session, SessionMetadata, StreamDelta, StreamRecord,
    ToolCall, ToolSpec, ToolSpecFunction,
};

// Re-export all capability traits at crate root.
pub use traits::{
    ChatProvider, Clock, ContextRetriever, IdGen, ProgressSink, ProviderProfile, SessionStore,
    SyncKv, SystemClock, UuidGen,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chamber_error_has_all_variants() {
        // Verify every error variant can be constructed.
        let _config = ChamberError::Config("test".into());
        let _storage = ChamberError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _provider = ChamberError::Provider {
            message: "test".into(),
            source: None,
        };
        let _license = ChamberError::License("test".into());
        let _tool = ChamberError::Tool {
            name: "topArtist".into(),
            message: "test".into(),
        };
        let _unknown = ChamberError::UnknownTool("mystery".into());
        let _timeout = ChamberError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _cancelled = ChamberError::Cancelled;
        let _budget = ChamberError::BudgetExhausted;
        let _internal = ChamberError::Internal("test".into());
    }

    #[test]
    fn error_messages_are_stable() {
        let err = ChamberError::Timeout {
            duration: std::time::Duration::from_secs(60),
        };
        assert_eq!(err.to_string(), "operation timed out after 60s");
        assert_eq!(ChamberError::Cancelled.to_string(), "turn cancelled");
    }
}
