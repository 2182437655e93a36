// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! License verification failure taxonomy.
//!
//! Every failure is terminal for the token being checked; callers downgrade
//! the user to the free tier rather than retrying.

use thiserror::Error;

use chamber_core::ChamberError;

/// Why a license token failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LicenseError {
    /// Token is not a three-segment JWT with decodable parts.
    #[error("license token is not a well-formed JWT")]
    InvalidFormat,

    /// Header `alg` is something other than ES256.
    #[error("license header algorithm is not ES256")]
    UnsupportedAlgorithm,

    /// Header `typ` is something other than JWT.
    #[error("license header type is not JWT")]
    InvalidType,

    /// Signature does not verify against the active pinned key.
    #[error("license signature does not verify against the active key")]
    InvalidSignature,

    /// `tier` claim is missing or outside the allowed set.
    #[error("license tier is not recognized")]
    InvalidTier,

    /// `exp` claim is in the past.
    #[error("license has expired")]
    Expired,

    /// `nbf` claim is in the future.
    #[error("license is not yet valid")]
    NotYetValid,

    /// `deviceBinding` claim does not match this device's fingerprint.
    #[error("license is bound to a different device")]
    DeviceMismatch,

    /// License server answered and did not accept the token.
    #[error("license server rejected the token")]
    ServerRejected,
}

impl LicenseError {
    /// Stable wire code for this failure, as the server and stored
    /// verdicts spell it.
    pub fn code(self) -> &'static str {
        match self {
            Self::InvalidFormat => "INVALID_FORMAT",
            Self::UnsupportedAlgorithm => "UNSUPPORTED_ALGORITHM",
            Self::InvalidType => "INVALID_TYPE",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::InvalidTier => "INVALID_TIER",
            Self::Expired => "EXPIRED",
            Self::NotYetValid => "NOT_YET_VALID",
            Self::DeviceMismatch => "DEVICE_MISMATCH",
            Self::ServerRejected => "SERVER_REJECTED",
        }
    }
}

impl From<LicenseError> for ChamberError {
    fn from(error: LicenseError) -> Self {
        ChamberError::License(error.to_string())
    }
}
