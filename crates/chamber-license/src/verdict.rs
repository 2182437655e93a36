// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Verification outcomes and the paid-tier set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Paid license tiers, lowest to highest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Tier {
    Curator,
    Chamber,
    Sovereign,
}

/// Outcome of one license verification attempt.
///
/// Failures are folded into `valid: false` with the wire code in `error`;
/// callers downgrade to the free tier rather than treating this as a fault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub valid: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,

    /// True when the verdict came from the offline path rather than the server.
    pub offline_mode: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Verification {
    /// A failed verdict carrying only the failure code.
    pub fn rejected(code: impl Into<String>, offline_mode: bool) -> Self {
        Self {
            valid: false,
            tier: None,
            instance_id: None,
            expires_at: None,
            features: Vec::new(),
            offline_mode,
            error: Some(code.into()),
        }
    }

    /// Whether this verdict unlocks the named feature flag.
    pub fn grants(&self, feature: &str) -> bool {
        self.valid && self.features.iter().any(|f| f == feature)
    }
}
