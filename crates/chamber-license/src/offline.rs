// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Offline license verification against the pinned public key.
//!
//! Reached only when the license server is unreachable. Checks run in a
//! fixed order: header, signature, then claims; the first failure wins.

use chrono::{DateTime, Utc};

use crate::error::LicenseError;
use crate::keys::PinnedKey;
use crate::token::ParsedToken;
use crate::verdict::{Tier, Verification};

/// Verify a license token without the server.
///
/// `device_fingerprint` is compared against the `deviceBinding` claim when
/// that claim is present; unbound tokens pass on any device.
pub fn verify_token(
    key: &PinnedKey,
    token: &str,
    device_fingerprint: &str,
    now: DateTime<Utc>,
) -> Result<Verification, LicenseError> {
    let parsed = ParsedToken::parse(token)?;

    if parsed.header.alg.as_deref() != Some("ES256") {
        return Err(LicenseError::UnsupportedAlgorithm);
    }
    if parsed.header.typ.as_deref() != Some("JWT") {
        return Err(LicenseError::InvalidType);
    }
    if !key.verify(parsed.signing_input.as_bytes(), &parsed.signature) {
        return Err(LicenseError::InvalidSignature);
    }

    let claims = parsed.claims;
    let tier: Tier = claims
        .tier
        .as_deref()
        .and_then(|raw| raw.parse().ok())
        .ok_or(LicenseError::InvalidTier)?;

    let now_secs = now.timestamp();
    if let Some(exp) = claims.exp
        && exp <= now_secs
    {
        return Err(LicenseError::Expired);
    }
    if let Some(nbf) = claims.nbf
        && nbf > now_secs
    {
        return Err(LicenseError::NotYetValid);
    }
    if let Some(binding) = &claims.device_binding
        && binding != device_fingerprint
    {
        return Err(LicenseError::DeviceMismatch);
    }

    Ok(Verification {
        valid: true,
        tier: Some(tier),
        instance_id: claims.instance_id,
        expires_at: claims.exp.and_then(|secs| DateTime::from_timestamp(secs, 0)),
        features: claims.features,
        offline_mode: true,
        error: None,
    })
}
