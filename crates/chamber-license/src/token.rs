// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! License token (JWT) structure and parsing.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use crate::error::LicenseError;

/// JOSE header of a license token.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenHeader {
    pub alg: Option<String>,
    pub typ: Option<String>,
}

/// Claims carried by a license token.
///
/// `deviceBinding` is optional: tokens without it are valid on any device.
/// `exp` and `nbf` are optional seconds-since-epoch; absent means unchecked.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseClaims {
    pub tier: Option<String>,
    pub exp: Option<i64>,
    pub nbf: Option<i64>,
    pub iat: Option<i64>,
    pub instance_id: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    pub device_binding: Option<String>,
}

/// A structurally valid license token, decoded but not yet verified.
#[derive(Debug, Clone)]
pub struct ParsedToken {
    pub header: TokenHeader,
    pub claims: LicenseClaims,
    /// The exact `header.payload` bytes the signature covers.
    pub signing_input: String,
    /// Raw `r||s` signature bytes.
    pub signature: Vec<u8>,
}

impl ParsedToken {
    /// Split and decode the three token segments.
    ///
    /// Anything that is not `base64url(json).base64url(json).base64url(sig)`
    /// is an [`LicenseError::InvalidFormat`]; the signature's length is left
    /// for the verifier to judge.
    pub fn parse(token: &str) -> Result<ParsedToken, LicenseError> {
        let mut segments = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(LicenseError::InvalidFormat);
        };
        if header_b64.is_empty() || payload_b64.is_empty() || signature_b64.is_empty() {
            return Err(LicenseError::InvalidFormat);
        }

        let header_json = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|_| LicenseError::InvalidFormat)?;
        let header: TokenHeader =
            serde_json::from_slice(&header_json).map_err(|_| LicenseError::InvalidFormat)?;

        let claims_json = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| LicenseError::InvalidFormat)?;
        let claims: LicenseClaims =
            serde_json::from_slice(&claims_json).map_err(|_| LicenseError::InvalidFormat)?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| LicenseError::InvalidFormat)?;

        Ok(ParsedToken {
            header,
            claims,
            signing_input: format!("{header_b64}.{payload_b64}"),
            signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(raw: &str) -> String {
        URL_SAFE_NO_PAD.encode(raw.as_bytes())
    }

    #[test]
    fn parses_well_formed_token() {
        let header = encode(r#"{"alg":"ES256","typ":"JWT"}"#);
        let payload = encode(
            r#"{"tier":"chamber","exp":1900000000,"instanceId":"inst-7","features":["rag"],"deviceBinding":"abc"}"#,
        );
        let signature = URL_SAFE_NO_PAD.encode([7u8; 64]);
        let token = format!("{header}.{payload}.{signature}");

        let parsed = ParsedToken::parse(&token).unwrap();
        assert_eq!(parsed.header.alg.as_deref(), Some("ES256"));
        assert_eq!(parsed.header.typ.as_deref(), Some("JWT"));
        assert_eq!(parsed.claims.tier.as_deref(), Some("chamber"));
        assert_eq!(parsed.claims.exp, Some(1_900_000_000));
        assert_eq!(parsed.claims.instance_id.as_deref(), Some("inst-7"));
        assert_eq!(parsed.claims.features, vec!["rag".to_string()]);
        assert_eq!(parsed.claims.device_binding.as_deref(), Some("abc"));
        assert_eq!(parsed.signing_input, format!("{header}.{payload}"));
        assert_eq!(parsed.signature, vec![7u8; 64]);
    }

    #[test]
    fn optional_claims_default_cleanly() {
        let header = encode(r#"{"alg":"ES256","typ":"JWT"}"#);
        let payload = encode(r#"{"tier":"curator"}"#);
        let token = format!("{header}.{payload}.{}", URL_SAFE_NO_PAD.encode([0u8; 64]));

        let parsed = ParsedToken::parse(&token).unwrap();
        assert_eq!(parsed.claims.exp, None);
        assert_eq!(parsed.claims.nbf, None);
        assert!(parsed.claims.features.is_empty());
        assert!(parsed.claims.device_binding.is_none());
    }

    #[test]
    fn rejects_wrong_segment_counts() {
        assert_eq!(
            ParsedToken::parse("only-one-segment").unwrap_err(),
            LicenseError::InvalidFormat
        );
        assert_eq!(
            ParsedToken::parse("two.segments").unwrap_err(),
            LicenseError::InvalidFormat
        );
        assert_eq!(
            ParsedToken::parse("a.b.c.d").unwrap_err(),
            LicenseError::InvalidFormat
        );
        assert_eq!(
            ParsedToken::parse("a.b.").unwrap_err(),
            LicenseError::InvalidFormat
        );
    }

    #[test]
    fn rejects_undecodable_segments() {
        let good_header = encode(r#"{"alg":"ES256","typ":"JWT"}"#);
        let good_payload = encode(r#"{"tier":"chamber"}"#);

        let bad_b64 = format!("{good_header}.{good_payload}.!!!");
        assert_eq!(
            ParsedToken::parse(&bad_b64).unwrap_err(),
            LicenseError::InvalidFormat
        );

        let not_json = format!(
            "{}.{good_payload}.{}",
            encode("plainly not json"),
            URL_SAFE_NO_PAD.encode([0u8; 64])
        );
        assert_eq!(
            ParsedToken::parse(&not_json).unwrap_err(),
            LicenseError::InvalidFormat
        );
    }

    #[test]
    fn unknown_claim_fields_are_ignored() {
        let header = encode(r#"{"alg":"ES256","typ":"JWT"}"#);
        let payload = encode(r#"{"tier":"sovereign","edition":"deluxe","seat":12}"#);
        let token = format!("{header}.{payload}.{}", URL_SAFE_NO_PAD.encode([0u8; 64]));

        let parsed = ParsedToken::parse(&token).unwrap();
        assert_eq!(parsed.claims.tier.as_deref(), Some("sovereign"));
    }
}
