//! Identity records, auth request payloads and session payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use crate::types::UserId;
use crate::utils::jwt::AccessToken;
use crate::validation::rules;

/// Stored half of a refresh token. The fingerprint and expiry only exist
/// together, so a token without an expiry cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenState {
    /// SHA-256 hex of the issued token.
    pub fingerprint: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
/// Durable identity record.
pub struct User {
    pub id: UserId,
    pub name: String,
    pub surname: Option<String>,
    /// Unique across all identities.
    pub email: String,
    /// Unique across all identities.
    pub username: String,
    /// Argon2id PHC string; carries its own salt.
    pub password_hash: String,
    pub refresh_token: Option<RefreshTokenState>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        name: String,
        surname: Option<String>,
        email: String,
        username: String,
        password_hash: String,
        refresh_token: RefreshTokenState,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: UserId::new(),
            name,
            surname,
            email,
            username,
            password_hash,
            refresh_token: Some(refresh_token),
            created_at: now,
            updated_at: now,
        }
    }

    /// True when `fingerprint` is the current refresh token and it has not
    /// expired at `now`.
    pub fn accepts_refresh_token(&self, fingerprint: &str, now: DateTime<Utc>) -> bool {
        match &self.refresh_token {
            Some(state) => state.fingerprint == fingerprint && state.expires_at >= now,
            None => false,
        }
    }

    pub fn refresh_fingerprint(&self) -> Option<&str> {
        self.refresh_token.as_ref().map(|s| s.fingerprint.as_str())
    }

    /// Replaces the refresh token; the previous one stops being accepted.
    pub fn rotate_refresh_token(&mut self, state: RefreshTokenState, now: DateTime<Utc>) {
        self.refresh_token = Some(state);
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
/// Payload for creating a new identity.
pub struct RegisterRequest {
    #[validate(length(max = 50), custom(function = "rules::validate_not_blank"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 50))]
    pub surname: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(custom(function = "rules::validate_username"))]
    pub username: String,
    #[validate(custom(function = "rules::validate_not_blank"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
/// Credentials submitted by a user attempting to authenticate.
pub struct LoginRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(custom(function = "rules::validate_not_blank"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
/// Payload for exchanging a refresh token. The token itself normally comes
/// from the refresh cookie; the body field is a fallback.
pub struct RefreshRequest {
    #[validate(custom(function = "rules::validate_username"))]
    pub username: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Everything a successful Register, Authenticate or RefreshSession hands
/// back to the transport layer.
#[derive(Clone, Serialize)]
pub struct SessionPayload {
    pub id: UserId,
    pub name: String,
    pub surname: Option<String>,
    pub email: String,
    pub username: String,
    pub access_token: String,
    pub access_token_expiry: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_token_expiry: DateTime<Utc>,
}

impl SessionPayload {
    pub fn new(
        user: &User,
        access: AccessToken,
        refresh_token: String,
        refresh_expiry: DateTime<Utc>,
    ) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            surname: user.surname.clone(),
            email: user.email.clone(),
            username: user.username.clone(),
            access_token: access.token,
            access_token_expiry: access.expires_at,
            refresh_token,
            refresh_token_expiry: refresh_expiry,
        }
    }
}

// Tokens stay out of logs.
impl fmt::Debug for SessionPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionPayload")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("username", &self.username)
            .field("access_token", &"<redacted>")
            .field("access_token_expiry", &self.access_token_expiry)
            .field("refresh_token", &"<redacted>")
            .field("refresh_token_expiry", &self.refresh_token_expiry)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Public view of an identity.
pub struct UserResponse {
    pub id: UserId,
    pub name: String,
    pub surname: Option<String>,
    pub email: String,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Response body for the auth endpoints. Tokens travel in cookies only.
pub struct SessionResponse {
    pub user: UserResponse,
    pub access_token_expiry: DateTime<Utc>,
    pub refresh_token_expiry: DateTime<Utc>,
}

impl From<&SessionPayload> for SessionResponse {
    fn from(payload: &SessionPayload) -> Self {
        Self {
            user: UserResponse {
                id: payload.id,
                name: payload.name.clone(),
                surname: payload.surname.clone(),
                email: payload.email.clone(),
                username: payload.username.clone(),
            },
            access_token_expiry: payload.access_token_expiry,
            refresh_token_expiry: payload.refresh_token_expiry,
        }
    }
}
