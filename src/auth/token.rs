//! Signed session tokens.
//!
//! A token is `<claims>.<signature>`: the base64url JSON claims and the
//! ED25519 signature over that first segment.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use super::KeyManager;
use crate::error::AppError;
use crate::models::{Role, User};

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id.
    pub sub: i64,
    pub email: String,
    pub role: Role,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Expires at (unix seconds).
    pub exp: i64,
}

impl SessionClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// A freshly issued token and its expiry.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Sign a payload segment with the signing key.
fn sign_segment(segment: &str, key: &SigningKey) -> String {
    let signature: Signature = key.sign(segment.as_bytes());
    URL_SAFE_NO_PAD.encode(signature.to_bytes())
}

/// Verify a signature against a payload segment.
fn verify_segment(segment: &str, signature_b64: &str, key: &VerifyingKey) -> bool {
    let signature_bytes = match URL_SAFE_NO_PAD.decode(signature_b64) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let signature = match Signature::from_slice(&signature_bytes) {
        Ok(sig) => sig,
        Err(_) => return false,
    };

    key.verify(segment.as_bytes(), &signature).is_ok()
}

/// Issues a token for `user` valid for `ttl_secs` from `now`.
pub fn issue_token(keys: &KeyManager, user: &User, ttl_secs: i64, now: DateTime<Utc>) -> IssuedToken {
    let expires_at = now + chrono::Duration::seconds(ttl_secs);
    let claims = SessionClaims {
        sub: user.id,
        email: user.email.clone(),
        role: user.role,
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
    };

    // Serializing a struct of plain fields cannot fail.
    let json = serde_json::to_vec(&claims).unwrap_or_default();
    let payload = URL_SAFE_NO_PAD.encode(json);
    let signature = sign_segment(&payload, keys.signing_key());

    IssuedToken {
        token: format!("{}.{}", payload, signature),
        expires_at,
    }
}

/// Checks shape, signature and expiry, returning the claims.
pub fn verify_token(keys: &KeyManager, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, AppError> {
    let unauthorized = |reason: &str| AppError::Unauthorized(reason.to_string());

    let (payload, signature) = token
        .trim()
        .split_once('.')
        .ok_or_else(|| unauthorized("Malformed session token"))?;

    if !verify_segment(payload, signature, keys.verifying_key()) {
        return Err(unauthorized("Invalid session token signature"));
    }

    let json = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| unauthorized("Malformed session token"))?;
    let claims: SessionClaims =
        serde_json::from_slice(&json).map_err(|_| unauthorized("Malformed session token"))?;

    if claims.exp <= now.timestamp() {
        return Err(unauthorized("Session expired"));
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user() -> User {
        User {
            id: 7,
            email: "grower@farm.io".into(),
            name: "Grower".into(),
            role: Role::Manager,
            farm_name: None,
            farm_location: None,
            plan: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let keys = KeyManager::ephemeral();
        let now = Utc::now();
        let issued = issue_token(&keys, &user(), 3600, now);

        let claims = verify_token(&keys, &issued.token, now).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.role, Role::Manager);
        assert_eq!(claims.exp, issued.expires_at.timestamp());
    }

    #[test]
    fn test_expired_token_rejected() {
        let keys = KeyManager::ephemeral();
        let now = Utc::now();
        let issued = issue_token(&keys, &user(), 60, now);

        let later = now + Duration::seconds(61);
        let err = verify_token(&keys, &issued.token, later).unwrap_err();
        assert!(err.to_string().contains("expired"));
    }

    #[test]
    fn test_token_from_other_key_rejected() {
        let keys1 = KeyManager::ephemeral();
        let keys2 = KeyManager::ephemeral();
        let now = Utc::now();
        let issued = issue_token(&keys1, &user(), 3600, now);

        // Verify with different key should fail
        assert!(verify_token(&keys2, &issued.token, now).is_err());
    }

    #[test]
    fn test_tampered_claims_rejected() {
        let keys = KeyManager::ephemeral();
        let now = Utc::now();
        let issued = issue_token(&keys, &user(), 3600, now);
        let (_, signature) = issued.token.split_once('.').unwrap();

        let mut forged_claims = verify_token(&keys, &issued.token, now).unwrap();
        forged_claims.role = Role::Admin;
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).unwrap());
        let forged = format!("{}.{}", forged_payload, signature);

        assert!(matches!(
            verify_token(&keys, &forged, now),
            Err(AppError::Unauthorized(_))
        ));
        assert!(verify_token(&keys, "not-a-token", now).is_err());
    }
}
