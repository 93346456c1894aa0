//! Register, Authenticate and RefreshSession.
//!
//! Each flow opens one unit of work, stages at most one change and commits
//! it before any token leaves the service. Concurrency between flows:
//!
//! * Register relies on the store's unique constraint when two requests pass
//!   the availability check at once; the loser gets `IdentityConflict`.
//! * RefreshSession guards its update on the fingerprint it validated, so a
//!   refresh token is redeemed at most once.
//! * Authenticate is last-writer-wins. A second login replaces the refresh
//!   token handed out by the first.

use std::sync::Arc;

use crate::error::AuthFailure;
use crate::models::user::{LoginRequest, RegisterRequest, SessionPayload, User};
use crate::repositories::identity::{IdentityFilter, IdentityStore, StoreError};
use crate::services::clock::{Clock, SystemClock};
use crate::services::credentials::CredentialIssuer;
use crate::services::uniqueness::check_availability;
use crate::utils::jwt::fingerprint_refresh_token;
use crate::utils::password::generate_salt;

#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn IdentityStore>,
    credentials: Arc<CredentialIssuer>,
    clock: Arc<dyn Clock>,
}

impl SessionService {
    pub fn new(store: Arc<dyn IdentityStore>, credentials: Arc<CredentialIssuer>) -> Self {
        Self::with_clock(store, credentials, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn IdentityStore>,
        credentials: Arc<CredentialIssuer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            credentials,
            clock,
        }
    }

    pub fn credentials(&self) -> &CredentialIssuer {
        &self.credentials
    }

    pub async fn register(&self, req: &RegisterRequest) -> Result<SessionPayload, AuthFailure> {
        let now = self.clock.now();
        let mut uow = self.store.begin().await?;

        let availability = check_availability(uow.as_mut(), &req.email, &req.username).await?;
        if let Some(kind) = availability.conflict() {
            tracing::info!(conflict = ?kind, "Registration rejected: identity already exists");
            return Err(AuthFailure::IdentityConflict(kind));
        }

        let password_hash = self
            .credentials
            .hash_password(&req.password, &generate_salt())?;
        let grant = self.credentials.issue_refresh_token(now);
        let refresh_expiry = grant.expires_at();
        let user = User::new(
            req.name.clone(),
            req.surname.clone(),
            req.email.clone(),
            req.username.clone(),
            password_hash,
            grant.state.clone(),
            now,
        );

        uow.create(user.clone());
        uow.commit().await.map_err(|err| match err {
            StoreError::Conflict(field) => {
                tracing::info!(field = ?field, "Registration lost a uniqueness race");
                AuthFailure::IdentityConflict(field.into())
            }
            other => AuthFailure::Persistence(other),
        })?;

        let access = self
            .credentials
            .issue_access_token(&user.email, &user.username, now)?;
        tracing::info!(user_id = %user.id, username = %user.username, "Identity registered");

        Ok(SessionPayload::new(&user, access, grant.token, refresh_expiry))
    }

    pub async fn authenticate(&self, req: &LoginRequest) -> Result<SessionPayload, AuthFailure> {
        let now = self.clock.now();
        let mut uow = self.store.begin().await?;

        let Some(mut user) = uow
            .find_one(&IdentityFilter::Email(req.email.clone()))
            .await?
        else {
            tracing::info!("Login rejected: unknown email");
            return Err(AuthFailure::NotFound);
        };

        if !self
            .credentials
            .verify_password(&req.password, &user.password_hash)?
        {
            tracing::info!(user_id = %user.id, "Login rejected: password mismatch");
            return Err(AuthFailure::InvalidCredentials);
        }

        let grant = self.credentials.issue_refresh_token(now);
        let refresh_expiry = grant.expires_at();
        user.rotate_refresh_token(grant.state.clone(), now);
        uow.update(user.clone());
        uow.commit().await?;

        let access = self
            .credentials
            .issue_access_token(&user.email, &user.username, now)?;
        tracing::info!(user_id = %user.id, "Login succeeded");

        Ok(SessionPayload::new(&user, access, grant.token, refresh_expiry))
    }

    pub async fn refresh_session(
        &self,
        username: &str,
        refresh_token: &str,
    ) -> Result<SessionPayload, AuthFailure> {
        let now = self.clock.now();
        let mut uow = self.store.begin().await?;

        let presented = fingerprint_refresh_token(refresh_token);
        let mut user = match uow
            .find_one(&IdentityFilter::Username(username.to_string()))
            .await?
        {
            Some(user) if user.accepts_refresh_token(&presented, now) => user,
            _ => {
                tracing::info!("Refresh rejected: unknown user or invalid token");
                return Err(AuthFailure::InvalidOrExpiredToken);
            }
        };

        let grant = self.credentials.issue_refresh_token(now);
        let refresh_expiry = grant.expires_at();
        user.rotate_refresh_token(grant.state.clone(), now);
        uow.update_guarded(user.clone(), presented);
        uow.commit().await.map_err(|err| match err {
            StoreError::Stale => {
                tracing::info!(user_id = %user.id, "Refresh rejected: token already redeemed");
                AuthFailure::InvalidOrExpiredToken
            }
            other => AuthFailure::Persistence(other),
        })?;

        let access = self
            .credentials
            .issue_access_token(&user.email, &user.username, now)?;
        tracing::info!(user_id = %user.id, "Session refreshed");

        Ok(SessionPayload::new(&user, access, grant.token, refresh_expiry))
    }
}
