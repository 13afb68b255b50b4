use crate::types::Identity;

use base64::{STANDARD, STANDARD_NO_PAD, URL_SAFE_NO_PAD, decode_config};
use jwt_simple::algorithms::MACLike;
use jwt_simple::prelude::{HS256Key, NoCustomClaims, VerificationOptions};
use serde::Deserialize;
use serde_json::{Map, Value};
use time::OffsetDateTime;

use std::collections::BTreeSet;

const LONG_EMAIL_CLAIM: &str = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/emailaddress";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("credential is not a three-part token")]
    Malformed,
    #[error("credential payload is not base64url")]
    Encoding,
    #[error("credential claims are unreadable: {0}")]
    Claims(String),
    #[error("credential has expired")]
    Expired,
    #[error("credential carries no email or subject")]
    MissingEmail,
    #[error("invalid verification key")]
    InvalidKey,
    #[error("credential signature rejected")]
    Signature,
}

#[derive(Debug, Clone)]
pub struct DecoderOptions {
    pub role_claim: String,
    pub verification_key: Option<String>,
}

/// Reads identity claims out of a bearer credential.
///
/// Without a verification key the signature is not checked; the backend
/// remains the authority and rejects forged tokens on every call.
#[derive(Debug, Clone)]
pub struct CredentialDecoder {
    role_claim: String,
    key: Option<HS256Key>,
}

#[derive(Debug, Deserialize)]
struct RawClaims {
    sub: Option<String>,
    email: Option<String>,
    exp: Option<f64>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl CredentialDecoder {
    pub fn new(options: DecoderOptions) -> Result<Self, DecodeError> {
        let key = match options.verification_key.as_deref() {
            Some(raw) => Some(HS256Key::from_bytes(&decode_key(raw)?)),
            None => None,
        };
        Ok(Self {
            role_claim: options.role_claim,
            key,
        })
    }

    pub fn decode(&self, token: &str, now: OffsetDateTime) -> Result<Identity, DecodeError> {
        let token = token.trim();
        let mut parts = token.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(DecodeError::Malformed);
        };

        if let Some(key) = &self.key {
            key.verify_token::<NoCustomClaims>(token, Some(VerificationOptions::default()))
                .map_err(|_| DecodeError::Signature)?;
        }

        let payload = decode_config(payload.trim_end_matches('='), URL_SAFE_NO_PAD)
            .map_err(|_| DecodeError::Encoding)?;
        let claims: RawClaims = serde_json::from_slice(&payload)
            .map_err(|err| DecodeError::Claims(err.to_string()))?;

        if let Some(exp) = claims.exp
            && exp <= now.unix_timestamp() as f64
        {
            return Err(DecodeError::Expired);
        }

        let email = claims
            .email
            .or_else(|| string_claim(&claims.extra, LONG_EMAIL_CLAIM))
            .or(claims.sub)
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty())
            .ok_or(DecodeError::MissingEmail)?;

        let roles = role_values(claims.extra.get(&self.role_claim));

        Ok(Identity { email, roles })
    }
}

fn string_claim(claims: &Map<String, Value>, name: &str) -> Option<String> {
    claims.get(name).and_then(Value::as_str).map(str::to_string)
}

/// Role claims arrive as a single string for one role and an array for many.
fn role_values(value: Option<&Value>) -> BTreeSet<String> {
    match value {
        Some(Value::String(role)) => std::iter::once(role.trim())
            .filter(|role| !role.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|role| !role.is_empty())
            .map(str::to_string)
            .collect(),
        _ => BTreeSet::new(),
    }
}

fn decode_key(raw: &str) -> Result<Vec<u8>, DecodeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DecodeError::InvalidKey);
    }

    let decoded = decode_config(trimmed, URL_SAFE_NO_PAD)
        .or_else(|_| decode_config(trimmed, STANDARD))
        .or_else(|_| decode_config(trimmed, STANDARD_NO_PAD))
        .map_err(|_| DecodeError::InvalidKey)?;

    if decoded.is_empty() {
        return Err(DecodeError::InvalidKey);
    }

    Ok(decoded)
}
