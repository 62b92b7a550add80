//! Session token authentication.
//!
//! The core consumes a narrow [`Authenticator`] interface: given the token a
//! client presented during the WebSocket handshake, produce the stable user
//! identity or reject. The built-in implementation verifies HMAC-SHA256
//! signed tokens minted by [`TokenAuthenticator::mint`], so the server stays
//! stateless about sessions.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::protocol::UserId;

type HmacSha256 = Hmac<Sha256>;

/// Identity established for a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub display_name: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature mismatch")]
    BadSignature,
}

/// Credential verification boundary.
pub trait Authenticator: Send + Sync {
    /// Identify the holder of `token`, or reject.
    fn identify(&self, token: &str) -> Result<Identity, AuthError>;
}

/// HMAC-SHA256 token authenticator.
///
/// Token layout: `base64url(user_id ":" display_name) "." base64url(mac)`.
pub struct TokenAuthenticator {
    secret: Vec<u8>,
}

impl TokenAuthenticator {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn mac(&self, payload: &[u8]) -> HmacSha256 {
        // HMAC accepts keys of any length, so this cannot fail.
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
        mac.update(payload);
        mac
    }

    /// Mint a token for the given identity. Exposed for the operator surface
    /// and for tests; production session issuance lives outside the core.
    pub fn mint(&self, user_id: UserId, display_name: &str) -> String {
        let payload = format!("{user_id}:{display_name}");
        let tag = self.mac(payload.as_bytes()).finalize().into_bytes();
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(payload.as_bytes()),
            URL_SAFE_NO_PAD.encode(tag)
        )
    }
}

impl Authenticator for TokenAuthenticator {
    fn identify(&self, token: &str) -> Result<Identity, AuthError> {
        let (payload_b64, tag_b64) = token.split_once('.').ok_or(AuthError::Malformed)?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| AuthError::Malformed)?;
        let tag = URL_SAFE_NO_PAD
            .decode(tag_b64)
            .map_err(|_| AuthError::Malformed)?;

        self.mac(&payload)
            .verify_slice(&tag)
            .map_err(|_| AuthError::BadSignature)?;

        let payload = String::from_utf8(payload).map_err(|_| AuthError::Malformed)?;
        let (user_id, display_name) = payload.split_once(':').ok_or(AuthError::Malformed)?;
        let user_id: UserId = user_id.parse().map_err(|_| AuthError::Malformed)?;
        if display_name.is_empty() {
            return Err(AuthError::Malformed);
        }

        Ok(Identity {
            user_id,
            display_name: display_name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticator() -> TokenAuthenticator {
        TokenAuthenticator::new(b"test-secret".to_vec())
    }

    #[test]
    fn minted_tokens_verify() {
        let auth = authenticator();
        let token = auth.mint(42, "Alice");
        let identity = auth.identify(&token).unwrap();
        assert_eq!(identity.user_id, 42);
        assert_eq!(identity.display_name, "Alice");
    }

    #[test]
    fn display_names_with_colons_survive() {
        let auth = authenticator();
        let token = auth.mint(7, "DJ:Bob");
        assert_eq!(auth.identify(&token).unwrap().display_name, "DJ:Bob");
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let auth = authenticator();
        let token = auth.mint(42, "Alice");
        let (_, tag) = token.split_once('.').unwrap();
        let forged_payload = URL_SAFE_NO_PAD.encode(b"43:Alice");
        let forged = format!("{forged_payload}.{tag}");
        assert_eq!(auth.identify(&forged), Err(AuthError::BadSignature));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = authenticator().mint(42, "Alice");
        let other = TokenAuthenticator::new(b"other-secret".to_vec());
        assert_eq!(other.identify(&token), Err(AuthError::BadSignature));
    }

    #[test]
    fn garbage_is_malformed() {
        let auth = authenticator();
        assert_eq!(auth.identify("not-a-token"), Err(AuthError::Malformed));
        assert_eq!(auth.identify(""), Err(AuthError::Malformed));
        assert_eq!(auth.identify("a.b.c"), Err(AuthError::Malformed));
    }
}
