// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pinned license verification keys.
//!
//! The client ships only public keys; licenses are signed server-side with
//! the matching private keys. Two slots exist so a new key can ship one
//! release before it takes over, but exactly one slot is active at a time.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ring::signature::{ECDSA_P256_SHA256_FIXED, UnparsedPublicKey};

use chamber_core::ChamberError;

/// SubjectPublicKeyInfo DER prefix for an uncompressed P-256 point.
///
/// ecPublicKey OID, prime256v1 OID, then a 66-byte BIT STRING header.
pub(crate) const P256_SPKI_PREFIX: [u8; 26] = [
    0x30, 0x59, 0x30, 0x13, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x08,
    0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07, 0x03, 0x42, 0x00,
];

const SPKI_LEN: usize = 91;
const POINT_LEN: usize = 65;

const PRIMARY_SPKI: &str = "MFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAEYP7UuiVanTHJYet0xjVtaMBJuJI7Yfps5mliLmDyn7Z5A_4QCLi8maQa6elWKLxk8vGyDC1-n1F3o8KU1EYimQ";
const SECONDARY_SPKI: &str = "MFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAEHMvpHAdfx_TwM7-iSNuPzNNWXelLv7EvPFn_RsJxv4POQBTGiBH5ohof2ywOYRPgbbfKk7dATnjcfM1cqJpMqQ";

/// Which pinned key slot to verify against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySlot {
    Primary,
    Secondary,
}

impl KeySlot {
    /// The slot current builds verify against.
    pub const fn active() -> KeySlot {
        KeySlot::Primary
    }

    /// Base64url-encoded SPKI for this slot.
    pub fn spki(self) -> &'static str {
        match self {
            KeySlot::Primary => PRIMARY_SPKI,
            KeySlot::Secondary => SECONDARY_SPKI,
        }
    }
}

/// A decoded P-256 verification key.
pub struct PinnedKey {
    point: Vec<u8>,
}

impl PinnedKey {
    /// Decode a base64url SPKI, keeping the uncompressed curve point.
    ///
    /// The DER prefix is fixed for P-256, so anything that is not exactly
    /// `prefix || 0x04 || X || Y` is rejected before touching the crypto.
    pub fn from_spki(spki_b64: &str) -> Result<Self, ChamberError> {
        let der = URL_SAFE_NO_PAD
            .decode(spki_b64)
            .map_err(|e| ChamberError::Config(format!("license key is not base64url: {e}")))?;
        if der.len() != SPKI_LEN {
            return Err(ChamberError::Config(format!(
                "license key SPKI must be {SPKI_LEN} bytes, got {}",
                der.len()
            )));
        }
        if der[..P256_SPKI_PREFIX.len()] != P256_SPKI_PREFIX {
            return Err(ChamberError::Config(
                "license key SPKI does not carry the P-256 prefix".to_string(),
            ));
        }
        let point = der[P256_SPKI_PREFIX.len()..].to_vec();
        if point.len() != POINT_LEN || point[0] != 0x04 {
            return Err(ChamberError::Config(
                "license key point is not an uncompressed P-256 point".to_string(),
            ));
        }
        Ok(Self { point })
    }

    /// Decode the key pinned in the given slot.
    pub fn from_slot(slot: KeySlot) -> Result<Self, ChamberError> {
        Self::from_spki(slot.spki())
    }

    /// Verify a raw `r||s` ECDSA signature over `message`.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        UnparsedPublicKey::new(&ECDSA_P256_SHA256_FIXED, &self.point)
            .verify(message, signature)
            .is_ok()
    }
}
