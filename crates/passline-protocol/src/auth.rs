//! Access-token signing and verification.
//!
//! Tokens are `base64url(claims JSON) . base64url(HMAC-SHA256(claims))`,
//! signed with the gateway's shared secret. Compact enough for a query
//! parameter, and verification needs no network round trip.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use passline_core::types::{StaffRole, UserId, VenueId};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("bad signature")]
    BadSignature,
    #[error("token expired at {0}")]
    Expired(i64),
}

/// Identity carried by every realtime connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub user_id: UserId,
    pub venue_id: VenueId,
    pub role: StaffRole,
    /// Unix seconds after which the token is rejected.
    pub exp: i64,
}

/// Sign claims into a wire token.
pub fn encode(claims: &AccessClaims, secret: &str) -> String {
    let body = URL_SAFE_NO_PAD
        .encode(serde_json::to_vec(claims).unwrap_or_default());
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body.as_bytes());
    let sig = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    format!("{}.{}", body, sig)
}

/// Verify a wire token and return its claims.
///
/// Malformed, tampered, and expired tokens are all rejected; callers treat
/// every failure identically (policy-violation close, no retry).
pub fn verify(token: &str, secret: &str, now_unix: i64) -> Result<AccessClaims, TokenError> {
    let (body, sig) = token.split_once('.').ok_or(TokenError::Malformed)?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body.as_bytes());
    let sig_bytes = URL_SAFE_NO_PAD
        .decode(sig)
        .map_err(|_| TokenError::Malformed)?;
    // verify_slice is constant-time
    mac.verify_slice(&sig_bytes)
        .map_err(|_| TokenError::BadSignature)?;

    let claims_bytes = URL_SAFE_NO_PAD
        .decode(body)
        .map_err(|_| TokenError::Malformed)?;
    let claims: AccessClaims =
        serde_json::from_slice(&claims_bytes).map_err(|_| TokenError::Malformed)?;

    if claims.exp <= now_unix {
        return Err(TokenError::Expired(claims.exp));
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> AccessClaims {
        AccessClaims {
            user_id: UserId::from("u-1"),
            venue_id: VenueId::from("v-1"),
            role: StaffRole::Staff,
            exp: 2_000_000_000,
        }
    }

    #[test]
    fn round_trip() {
        let token = encode(&claims(), "secret");
        let verified = verify(&token, "secret", 1_000_000_000).unwrap();
        assert_eq!(verified, claims());
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = encode(&claims(), "secret");
        assert_eq!(
            verify(&token, "other", 1_000_000_000),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn tampered_body_rejected() {
        let token = encode(&claims(), "secret");
        let (body, sig) = token.split_once('.').unwrap();
        let mut raw = URL_SAFE_NO_PAD.decode(body).unwrap();
        // flip the venue id inside the claims JSON
        let s = String::from_utf8(raw.clone()).unwrap().replace("v-1", "v-2");
        raw = s.into_bytes();
        let forged = format!("{}.{}", URL_SAFE_NO_PAD.encode(&raw), sig);
        assert_eq!(
            verify(&forged, "secret", 1_000_000_000),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn expired_rejected() {
        let token = encode(&claims(), "secret");
        assert_eq!(
            verify(&token, "secret", 2_000_000_001),
            Err(TokenError::Expired(2_000_000_000))
        );
    }

    #[test]
    fn missing_separator_is_malformed() {
        assert_eq!(
            verify("nodot", "secret", 0),
            Err(TokenError::Malformed)
        );
    }
}
