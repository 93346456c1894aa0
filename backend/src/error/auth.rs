//! Failure taxonomy for the session flows.
//!
//! Expected business outcomes (conflicts, bad credentials, stale tokens) are
//! ordinary `Err` values. Storage and credential faults share the same type
//! but render a generic payload; their cause is only logged.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::repositories::identity::{StoreError, UniqueField};

/// Which identity field(s) are already registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    Email,
    Username,
    EmailAndUsername,
}

impl From<UniqueField> for ConflictKind {
    fn from(field: UniqueField) -> Self {
        match field {
            UniqueField::Email => ConflictKind::Email,
            UniqueField::Username => ConflictKind::Username,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    BadRequest,
    NotFound,
    Internal,
}

impl StatusClass {
    pub fn status_code(self) -> StatusCode {
        match self {
            StatusClass::BadRequest => StatusCode::BAD_REQUEST,
            StatusClass::NotFound => StatusCode::NOT_FOUND,
            StatusClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthFailure {
    #[error("identity already registered ({0:?})")]
    IdentityConflict(ConflictKind),

    #[error("no identity matches the lookup key")]
    NotFound,

    #[error("password does not match")]
    InvalidCredentials,

    #[error("refresh token is invalid or expired")]
    InvalidOrExpiredToken,

    #[error("persistence failure")]
    Persistence(#[source] StoreError),

    #[error("credential processing failure")]
    Internal(#[from] anyhow::Error),
}

/// Wire shape of a failed session flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailurePayload {
    pub title: String,
    pub description: String,
    pub status: StatusClass,
}

impl AuthFailure {
    pub fn title(&self) -> &'static str {
        match self {
            AuthFailure::IdentityConflict(ConflictKind::Email) => "Email already registered",
            AuthFailure::IdentityConflict(ConflictKind::Username) => "Username already registered",
            AuthFailure::IdentityConflict(ConflictKind::EmailAndUsername) => {
                "Username and email unavailable"
            }
            AuthFailure::NotFound => "User not found",
            AuthFailure::InvalidCredentials => "Invalid password",
            AuthFailure::InvalidOrExpiredToken => "Invalid token",
            AuthFailure::Persistence(_) | AuthFailure::Internal(_) => "Internal error",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AuthFailure::IdentityConflict(ConflictKind::Email) => {
                "The email provided is already in use, please try another email."
            }
            AuthFailure::IdentityConflict(ConflictKind::Username) => {
                "The username provided is already in use, please try another username."
            }
            AuthFailure::IdentityConflict(ConflictKind::EmailAndUsername) => {
                "The username and email provided are already in use, please try others."
            }
            AuthFailure::NotFound => "The email provided is not registered.",
            AuthFailure::InvalidCredentials => "The password provided is incorrect.",
            AuthFailure::InvalidOrExpiredToken => {
                "Refresh token is invalid or expired. Please log in again."
            }
            AuthFailure::Persistence(_) | AuthFailure::Internal(_) => {
                "The request could not be completed. Please try again later."
            }
        }
    }

    /// Unknown email and wrong password are both reported as not-found.
    pub fn status(&self) -> StatusClass {
        match self {
            AuthFailure::IdentityConflict(_) | AuthFailure::InvalidOrExpiredToken => {
                StatusClass::BadRequest
            }
            AuthFailure::NotFound | AuthFailure::InvalidCredentials => StatusClass::NotFound,
            AuthFailure::Persistence(_) | AuthFailure::Internal(_) => StatusClass::Internal,
        }
    }

    pub fn conflict(&self) -> Option<ConflictKind> {
        match self {
            AuthFailure::IdentityConflict(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn payload(&self) -> FailurePayload {
        FailurePayload {
            title: self.title().to_string(),
            description: self.description().to_string(),
            status: self.status(),
        }
    }
}

impl From<StoreError> for AuthFailure {
    fn from(err: StoreError) -> Self {
        AuthFailure::Persistence(err)
    }
}

impl IntoResponse for AuthFailure {
    fn into_response(self) -> Response {
        match &self {
            AuthFailure::Persistence(err) => {
                tracing::error!(error = ?err, "Session flow failed in storage");
            }
            AuthFailure::Internal(err) => {
                tracing::error!(error = ?err, "Session flow failed in credential processing");
            }
            _ => {}
        }

        let status = self.status().status_code();
        (status, Json(self.payload())).into_response()
    }
}
