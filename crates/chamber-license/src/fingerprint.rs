// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device fingerprinting for license binding.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Stable attributes of the running device.
///
/// Device-bound license tokens carry a `deviceBinding` claim equal to this
/// profile's fingerprint; the same hardware and origin reproduce the same
/// fingerprint across sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProfile {
    pub user_agent: String,
    pub language: String,
    pub hardware_cores: u32,
    pub memory_gb: u32,
    pub screen_resolution: String,
    pub timezone_offset_minutes: i32,
    pub origin: String,
}

impl DeviceProfile {
    /// Hex SHA-256 over the pipe-joined attributes, origin last.
    pub fn fingerprint(&self) -> String {
        let material = format!(
            "{}|{}|{}|{}|{}|{}|{}",
            self.user_agent,
            self.language,
            self.hardware_cores,
            self.memory_gb,
            self.screen_resolution,
            self.timezone_offset_minutes,
            self.origin
        );
        let mut hasher = Sha256::new();
        hasher.update(material.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> DeviceProfile {
        DeviceProfile {
            user_agent: "RhythmChamber/1.0".to_string(),
            language: "en-US".to_string(),
            hardware_cores: 8,
            memory_gb: 16,
            screen_resolution: "2560x1440".to_string(),
            timezone_offset_minutes: -300,
            origin: "https://app.rhythmchamber.test".to_string(),
        }
    }

    #[test]
    fn fingerprint_is_hex_sha256() {
        let fp = profile().fingerprint();
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn same_profile_reproduces_fingerprint() {
        assert_eq!(profile().fingerprint(), profile().fingerprint());
    }

    #[test]
    fn any_attribute_change_moves_the_fingerprint() {
        let base = profile().fingerprint();

        let mut other_origin = profile();
        other_origin.origin = "https://other.example".to_string();
        assert_ne!(base, other_origin.fingerprint());

        let mut other_cores = profile();
        other_cores.hardware_cores = 4;
        assert_ne!(base, other_cores.fingerprint());

        let mut other_resolution = profile();
        other_resolution.screen_resolution = "1920x1080".to_string();
        assert_ne!(base, other_resolution.fingerprint());
    }
}
