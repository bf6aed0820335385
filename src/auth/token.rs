//! Access-token payload decoding.
//!
//! Tokens are read without signature verification: they only ever arrive
//! through the session cookies this service writes from provider responses,
//! and the provider re-validates them on `get_user`. Anything decoded here
//! must not be trusted outside that boundary.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token does not have three segments")]
    Malformed,
    #[error("token payload is not base64url")]
    Base64,
    #[error("token payload is not a JSON object")]
    Json,
}

/// Decode the payload segment of a JWT into its claim map.
pub fn decode_claims(token: &str) -> Result<Map<String, Value>, TokenError> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed);
    };

    // Some issuers pad their segments; base64url-no-pad rejects that.
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| TokenError::Base64)?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(claims)) => Ok(claims),
        _ => Err(TokenError::Json),
    }
}

/// Read a string claim. Absent, `null` and non-string values all yield `None`.
pub fn string_claim(token: &str, claim: &str) -> Result<Option<String>, TokenError> {
    let claims = decode_claims(token)?;
    Ok(claims.get(claim).and_then(Value::as_str).map(str::to_owned))
}

/// `exp` in unix seconds, if the token carries one.
pub fn expires_at(token: &str) -> Option<i64> {
    decode_claims(token).ok()?.get("exp").and_then(Value::as_i64)
}

/// Build an unsigned token around `claims`. Test helper.
#[cfg(test)]
pub fn encode_unsigned(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}
