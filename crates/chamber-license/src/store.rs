// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisted license records.
//!
//! A verified license is kept in the durable config store together with an
//! integrity checksum. A record that fails its checksum on load (edited by
//! hand, copied from another device) is deleted rather than trusted.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use chamber_core::{ChamberError, SessionStore};

use crate::verdict::Tier;

/// Config key the license record is stored under.
pub const LICENSE_CONFIG_KEY: &str = "rhythm_chamber_license";

/// A license accepted at some point, for re-verification on boot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredLicense {
    pub token: String,
    pub tier: Tier,
    pub device_fingerprint: String,
    /// RFC 3339 instant of the verification that stored this record.
    pub verified_at: String,
    checksum: String,
}

impl StoredLicense {
    pub fn new(
        token: impl Into<String>,
        tier: Tier,
        device_fingerprint: impl Into<String>,
        verified_at: impl Into<String>,
    ) -> Self {
        let token = token.into();
        let device_fingerprint = device_fingerprint.into();
        let checksum = checksum_of(&token, tier, &device_fingerprint);
        Self {
            token,
            tier,
            device_fingerprint,
            verified_at: verified_at.into(),
            checksum,
        }
    }

    /// Whether the stored checksum still matches the record's own fields.
    pub fn integrity_ok(&self) -> bool {
        self.checksum == checksum_of(&self.token, self.tier, &self.device_fingerprint)
    }

    /// Load the stored record, deleting it when it is corrupt or has been
    /// tampered with.
    pub async fn load(store: &dyn SessionStore) -> Result<Option<StoredLicense>, ChamberError> {
        let Some(raw) = store.get_config(LICENSE_CONFIG_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<StoredLicense>(&raw) {
            Ok(record) if record.integrity_ok() => Ok(Some(record)),
            Ok(_) => {
                warn!("stored license failed its integrity check, deleting");
                store.remove_config(LICENSE_CONFIG_KEY).await?;
                Ok(None)
            }
            Err(error) => {
                warn!(%error, "stored license record is unreadable, deleting");
                store.remove_config(LICENSE_CONFIG_KEY).await?;
                Ok(None)
            }
        }
    }

    pub async fn save(&self, store: &dyn SessionStore) -> Result<(), ChamberError> {
        let raw = serde_json::to_string(self)
            .map_err(|e| ChamberError::License(format!("failed to encode license record: {e}")))?;
        store.set_config(LICENSE_CONFIG_KEY, &raw).await
    }

    pub async fn clear(store: &dyn SessionStore) -> Result<(), ChamberError> {
        store.remove_config(LICENSE_CONFIG_KEY).await
    }
}

fn checksum_of(token: &str, tier: Tier, device_fingerprint: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{token}|{tier}|{device_fingerprint}").as_bytes());
    format!("{:x}", hasher.finalize())
}
