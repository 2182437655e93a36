// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! License verification for the Rhythm Chamber turn engine.
//!
//! Tokens are ES256 JWTs signed by the license server and checked against a
//! key pinned at build time. Verification is server-first: the server's
//! verdict is authoritative whenever it answers (revocations included), and
//! local signature verification runs only when the server is unreachable.
//! Accepted licenses are persisted with a device-bound checksum and verified
//! again on every boot.

pub mod error;
pub mod fingerprint;
pub mod keys;
pub mod offline;
pub(crate) mod server;
pub mod service;
pub mod store;
pub mod token;
pub mod verdict;

pub use error::LicenseError;
pub use fingerprint::DeviceProfile;
pub use keys::{KeySlot, PinnedKey};
pub use offline::verify_token;
pub use service::LicenseService;
pub use store::{LICENSE_CONFIG_KEY, StoredLicense};
pub use verdict::{Tier, Verification};
