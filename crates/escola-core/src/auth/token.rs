//! Bearer token decoding.
//!
//! Access tokens are JWTs issued by the portal API. The client never holds
//! the signing key, so decoding only checks structure and expiry; signature
//! verification happens server-side on every request.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::dangerous::insecure_decode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Credential has expired")]
    Expired,

    #[error("Malformed credential: {0}")]
    Malformed(String),
}

/// Access role carried in the `role` claim.
///
/// The API issues Portuguese tags (`aluno`, `coordenador`, `professor`);
/// English tags are accepted too. Known tags are normalised to their English
/// form, so `aluno` displays and serialises as `student`. Unknown tags are
/// kept verbatim and only ever match themselves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Student,
    Coordinator,
    Teacher,
    Other(String),
}

impl Role {
    /// Normalised tag: English for known roles, verbatim otherwise.
    pub fn as_str(&self) -> &str {
        match self {
            Role::Student => "student",
            Role::Coordinator => "coordinator",
            Role::Teacher => "teacher",
            Role::Other(tag) => tag,
        }
    }
}

impl From<String> for Role {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "student" | "aluno" => Role::Student,
            "coordinator" | "coordenador" => Role::Coordinator,
            "teacher" | "professor" => Role::Teacher,
            _ => Role::Other(tag),
        }
    }
}

impl From<&str> for Role {
    fn from(tag: &str) -> Self {
        Role::from(tag.to_string())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity fields projected out of an access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub subject_id: String,
    pub username: String,
    pub role: Role,
    pub display_name: String,
    pub expires_at: DateTime<Utc>,
}

impl Claims {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// `user_id` is an integer primary key on the API side, but other issuers
/// put a string subject in `sub`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum SubjectId {
    Number(i64),
    Text(String),
}

#[derive(Debug, Clone, Deserialize)]
struct TokenPayload {
    #[serde(alias = "sub")]
    user_id: SubjectId,
    username: String,
    role: Role,
    #[serde(default)]
    name: Option<String>,
    exp: i64,
}

impl TokenPayload {
    fn into_claims(self) -> Result<Claims, DecodeError> {
        let expires_at = Utc
            .timestamp_opt(self.exp, 0)
            .single()
            .ok_or_else(|| DecodeError::Malformed(format!("exp out of range: {}", self.exp)))?;

        let subject_id = match self.user_id {
            SubjectId::Number(id) => id.to_string(),
            SubjectId::Text(id) => id,
        };

        let display_name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| self.username.clone());

        Ok(Claims {
            subject_id,
            username: self.username,
            role: self.role,
            display_name,
            expires_at,
        })
    }
}

/// Decode an access token into its claims without verifying the signature.
///
/// No key is involved, so tokens signed with any algorithm (HMAC, RSA, EC,
/// EdDSA) decode the same way. Expiry is checked here with zero leeway.
pub fn decode_claims(raw: &str) -> Result<Claims, DecodeError> {
    let data = insecure_decode::<TokenPayload>(raw).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let claims = data.claims.into_claims()?;
    if claims.is_expired() {
        return Err(DecodeError::Expired);
    }
    Ok(claims)
}
