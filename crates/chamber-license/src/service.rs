// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server-first license verification.
//!
//! [`LicenseService::verify`] asks the license server for a verdict and
//! accepts whatever it answers. Offline verification runs only when the
//! server never answered. Valid verdicts are memoized per token for the
//! configured TTL; rejections are recomputed on every attempt so that a
//! license activated or unrevoked server-side is picked up immediately.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use chamber_config::LicenseConfig;
use chamber_core::{ChamberError, Clock, SessionStore};

use crate::fingerprint::DeviceProfile;
use crate::keys::{KeySlot, PinnedKey};
use crate::offline;
use crate::server::ServerClient;
use crate::store::StoredLicense;
use crate::verdict::Verification;

struct CachedVerdict {
    verification: Verification,
    at: DateTime<Utc>,
}

/// License verification entry point.
pub struct LicenseService {
    server: ServerClient,
    key: PinnedKey,
    clock: Arc<dyn Clock>,
    cache_ttl: Duration,
    cache: Mutex<HashMap<String, CachedVerdict>>,
}

impl LicenseService {
    /// Build a service verifying against the active pinned key slot.
    pub fn new(config: &LicenseConfig, clock: Arc<dyn Clock>) -> Result<Self, ChamberError> {
        let key = PinnedKey::from_slot(KeySlot::active())?;
        Self::with_key(config, key, clock)
    }

    /// Build a service verifying against an explicit key.
    pub fn with_key(
        config: &LicenseConfig,
        key: PinnedKey,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ChamberError> {
        Ok(Self {
            server: ServerClient::new(config)?,
            key,
            clock,
            cache_ttl: Duration::seconds(
                i64::try_from(config.cache_ttl_secs).unwrap_or(i64::MAX),
            ),
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Verify a token for this device, server-first.
    ///
    /// Never fails: every failure mode folds into a `valid: false` verdict
    /// and the caller continues on the free tier.
    pub async fn verify(&self, token: &str, profile: &DeviceProfile) -> Verification {
        let now = self.clock.now();
        if let Some(hit) = self.cached(token, now).await {
            debug!("license verification served from cache");
            return hit;
        }

        let fingerprint = profile.fingerprint();
        let verification = match self.server.check(token, &fingerprint, &profile.origin).await {
            Ok(verdict) => verdict.into_verification(),
            Err(error) => {
                warn!(%error, "license server unreachable, verifying offline");
                self.verify_offline(token, &fingerprint, now)
            }
        };

        if verification.valid {
            self.cache.lock().await.insert(
                token.to_string(),
                CachedVerdict {
                    verification: verification.clone(),
                    at: now,
                },
            );
        }
        verification
    }

    /// Verify a token against the pinned key alone.
    pub fn verify_offline(
        &self,
        token: &str,
        device_fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Verification {
        match offline::verify_token(&self.key, token, device_fingerprint, now) {
            Ok(verification) => verification,
            Err(error) => {
                warn!(code = error.code(), "offline license verification failed");
                Verification::rejected(error.code(), true)
            }
        }
    }

    /// Re-verify the stored license on boot.
    ///
    /// Returns `None` when nothing is stored. A record the verifier no
    /// longer accepts is cleared so the next boot starts clean.
    pub async fn restore(
        &self,
        store: &dyn SessionStore,
        profile: &DeviceProfile,
    ) -> Result<Option<Verification>, ChamberError> {
        let Some(record) = StoredLicense::load(store).await? else {
            return Ok(None);
        };
        let verification = self.verify(&record.token, profile).await;
        if !verification.valid {
            StoredLicense::clear(store).await?;
        }
        Ok(Some(verification))
    }

    /// Persist an accepted verification for the next boot.
    pub async fn remember(
        &self,
        store: &dyn SessionStore,
        token: &str,
        profile: &DeviceProfile,
        verification: &Verification,
    ) -> Result<(), ChamberError> {
        if !verification.valid {
            return Err(ChamberError::License(
                "refusing to store an invalid license".to_string(),
            ));
        }
        let Some(tier) = verification.tier else {
            return Err(ChamberError::License(
                "refusing to store a license without a tier".to_string(),
            ));
        };
        let record = StoredLicense::new(
            token,
            tier,
            profile.fingerprint(),
            self.clock.now_rfc3339(),
        );
        record.save(store).await
    }

    async fn cached(&self, token: &str, now: DateTime<Utc>) -> Option<Verification> {
        let mut cache = self.cache.lock().await;
        match cache.get(token) {
            Some(hit) if now.signed_duration_since(hit.at) < self.cache_ttl => {
                Some(hit.verification.clone())
            }
            Some(_) => {
                cache.remove(token);
                None
            }
            None => None,
        }
    }
}
