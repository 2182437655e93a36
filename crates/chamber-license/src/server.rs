// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! License server client.
//!
//! The server is authoritative: any HTTP response it produces, success
//! status or not, is a verdict. Only transport failures (unreachable host,
//! timeout, aborted connection) are surfaced as errors, and those are the
//! sole path into offline verification. A revocation therefore cannot be
//! bypassed by serving an error page, only by cutting the network, and a
//! cut network still faces the signature check.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use chamber_config::LicenseConfig;
use chamber_core::ChamberError;

use crate::error::LicenseError;
use crate::verdict::{Tier, Verification};

const VERIFY_PATH: &str = "/api/license/verify";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequest<'a> {
    token: &'a str,
    device_fingerprint: &'a str,
    origin: &'a str,
}

/// Raw verdict body from the license server.
///
/// Every field defaults so that sparse rejection bodies still decode;
/// fields this client does not consume (such as `activatedAt`) are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct ServerVerdict {
    pub valid: bool,
    pub tier: Option<String>,
    pub instance_id: Option<String>,
    pub expires_at: Option<String>,
    pub features: Option<Vec<String>>,
    pub error: Option<String>,
    pub message: Option<String>,
}

impl ServerVerdict {
    fn rejection() -> Self {
        Self {
            error: Some(LicenseError::ServerRejected.code().to_string()),
            ..Self::default()
        }
    }

    pub(crate) fn into_verification(self) -> Verification {
        if !self.valid {
            if let Some(message) = &self.message {
                debug!(message, "license server rejection detail");
            }
            return Verification::rejected(
                self.error
                    .unwrap_or_else(|| LicenseError::ServerRejected.code().to_string()),
                false,
            );
        }

        let tier = self.tier.as_deref().and_then(|raw| match raw.parse::<Tier>() {
            Ok(tier) => Some(tier),
            Err(_) => {
                warn!(tier = raw, "license server returned an unknown tier");
                None
            }
        });
        Verification {
            valid: true,
            tier,
            instance_id: self.instance_id,
            expires_at: self.expires_at.as_deref().and_then(parse_instant),
            features: self.features.unwrap_or_default(),
            offline_mode: false,
            error: None,
        }
    }
}

fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// HTTP client for the verification endpoint.
pub(crate) struct ServerClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ServerClient {
    pub fn new(config: &LicenseConfig) -> Result<Self, ChamberError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                ChamberError::License(format!("failed to build license HTTP client: {e}"))
            })?;
        Ok(Self {
            http,
            endpoint: format!("{}{VERIFY_PATH}", config.server_url.trim_end_matches('/')),
        })
    }

    /// Ask the server for a verdict.
    ///
    /// `Err` means the server never answered; an unreadable body on an
    /// otherwise delivered response is folded into a rejection verdict.
    pub async fn check(
        &self,
        token: &str,
        device_fingerprint: &str,
        origin: &str,
    ) -> Result<ServerVerdict, reqwest::Error> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&VerifyRequest {
                token,
                device_fingerprint,
                origin,
            })
            .send()
            .await?;

        let status = response.status();
        debug!(%status, "license server answered");
        match response.json::<ServerVerdict>().await {
            Ok(verdict) => Ok(verdict),
            Err(error) => {
                warn!(%status, %error, "license server body unreadable, treating as rejection");
                Ok(ServerVerdict::rejection())
            }
        }
    }
}
