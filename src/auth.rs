//! Caller identity from the access token issued by the hosted auth
//! service. Tokens come from the `sb-access-token` cookie or from an
//! `Authorization: Bearer` header.

use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::HeaderMap;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, NO_PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use log::debug;
use serde::Deserialize;

pub const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";

const JWT_PAYLOAD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    NO_PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Option<UserMetadata>,
    #[serde(default)]
    pub exp: Option<i64>,
}

/// Who is calling. At least one of the fields is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Option<String>,
    pub email: Option<String>,
}

impl Identity {
    pub fn from_claims(claims: Claims) -> Option<Identity> {
        let user_id = claims.sub.filter(|s| !s.trim().is_empty());
        let email = claims
            .email
            .or_else(|| claims.user_metadata.and_then(|m| m.email))
            .filter(|s| !s.trim().is_empty());

        if user_id.is_none() && email.is_none() {
            None
        } else {
            Some(Identity { user_id, email })
        }
    }
}

/// Reads the claims of `token`.
///
/// With a secret the signature (HS256) and expiry are verified. Without
/// one the payload is only decoded, but an expired `exp` is still refused.
pub fn decode_claims(token: &str, secret: Option<&str>) -> Option<Claims> {
    match secret {
        Some(secret) => {
            let mut validation = Validation::new(Algorithm::HS256);
            validation.validate_aud = false;
            validation.required_spec_claims.clear();

            jsonwebtoken::decode::<Claims>(
                token,
                &DecodingKey::from_secret(secret.as_bytes()),
                &validation,
            )
            .map(|data| data.claims)
            .map_err(|e| debug!("rejected access token: {e}"))
            .ok()
        }
        None => {
            let payload = token.split('.').nth(1)?;
            let bytes = JWT_PAYLOAD.decode(payload.trim_end_matches('=')).ok()?;
            let claims: Claims = serde_json::from_slice(&bytes).ok()?;

            match claims.exp {
                Some(exp) if exp <= Utc::now().timestamp() => None,
                _ => Some(claims),
            }
        }
    }
}

/// Value of the cookie `name`, if present and non-empty.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub fn identity_from_cookie(headers: &HeaderMap, secret: Option<&str>) -> Option<Identity> {
    let token = cookie_value(headers, ACCESS_TOKEN_COOKIE)?;
    Identity::from_claims(decode_claims(token, secret)?)
}

/// User id (`sub`) of a bearer token.
pub fn bearer_user_id(headers: &HeaderMap, secret: Option<&str>) -> Option<String> {
    let claims = decode_claims(bearer_token(headers)?, secret)?;
    claims.sub.filter(|sub| !sub.trim().is_empty())
}

/// Builds an unsigned token carrying `claims`, for tests and local runs.
pub fn unsigned_token(claims: &serde_json::Value) -> String {
    let header = JWT_PAYLOAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = JWT_PAYLOAD.encode(claims.to_string());
    format!("{header}.{payload}.")
}
