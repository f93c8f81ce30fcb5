//! Signed opaque verify token.
//!
//! The token binds a guild, a member and a server-side session id
//! together with an expiry, signed with HMAC-SHA256 under a symmetric
//! secret. It is defence in depth on top of the session row: both the
//! token and a usable session are required to verify a wallet.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use derive_more::{Display, Error};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Claims bound into a verify token.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct TokenClaims {
    pub(crate) guild_id: i64,
    pub(crate) member_id: i64,
    pub(crate) session_id: i64,
    /// Expiry, unix seconds.
    pub(crate) exp: i64,
}

/// Errors that may occur during token verification.
#[derive(Debug, Display, Error, PartialEq, Eq)]
pub(crate) enum TokenError {
    /// The token does not parse into payload and tag.
    #[display(fmt = "malformed token")]
    Malformed,

    /// The tag does not match the payload.
    #[display(fmt = "token signature mismatch")]
    BadSignature,

    /// The token is past its expiry.
    #[display(fmt = "token expired")]
    Expired,
}

fn tag(secret: &str, payload: &str) -> Vec<u8> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload.as_bytes());

    mac.finalize().into_bytes().to_vec()
}

/// Sign claims into an opaque `payload.tag` token.
pub(crate) fn sign(claims: &TokenClaims, secret: &str) -> String {
    let payload = URL_SAFE_NO_PAD
        .encode(serde_json::to_vec(claims).expect("claims serialization cannot fail"));
    let tag = URL_SAFE_NO_PAD.encode(tag(secret, &payload));

    format!("{payload}.{tag}")
}

/// Verify a token and recover its claims.
///
/// The tag comparison is constant-time and happens before the payload
/// is parsed.
pub(crate) fn verify(token: &str, secret: &str, now_unix: i64) -> Result<TokenClaims, TokenError> {
    let (payload, provided_tag) = token.split_once('.').ok_or(TokenError::Malformed)?;

    let provided = URL_SAFE_NO_PAD
        .decode(provided_tag)
        .map_err(|_| TokenError::Malformed)?;

    if !bool::from(provided.ct_eq(&tag(secret, payload))) {
        return Err(TokenError::BadSignature);
    }

    let raw = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| TokenError::Malformed)?;
    let claims: TokenClaims = serde_json::from_slice(&raw).map_err(|_| TokenError::Malformed)?;

    if claims.exp <= now_unix {
        return Err(TokenError::Expired);
    }

    Ok(claims)
}
