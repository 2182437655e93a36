// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token accounting for the Rhythm Chamber turn engine.
//!
//! Estimates request sizes with per-family character ratios, produces
//! utilization reports with a recommended action, and reduces oversized
//! requests to a target while protecting the newest conversation turns.

pub mod accountant;
pub mod estimator;
pub mod truncate;

pub use accountant::{
    BudgetAction, BudgetThresholds, Recommendation, RequestParts, TokenAccountant, TokenInfo,
    TokenWarning, WarnLevel,
};
pub use estimator::{EstimatorConfig, TokenEstimator};
pub use truncate::{TruncationInput, TruncationOutcome, truncate_to_target};
