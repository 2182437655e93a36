// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identifier generation capability.

/// Source of unique identifiers for sessions and turns.
pub trait IdGen: Send + Sync {
    fn new_id(&self) -> String;
}

/// UUID v4 identifiers, the production source.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGen;

impl IdGen for UuidGen {
    fn new_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}
