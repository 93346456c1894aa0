use crate::error::ConflictKind;
use crate::repositories::identity::{IdentityFilter, IdentityUnitOfWork, StoreError};

/// Whether an email/username pair can be registered. Both fields are looked
/// up independently, so a request that collides on both reports both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    EmailTaken,
    UsernameTaken,
    BothTaken,
}

impl Availability {
    pub fn from_flags(email_taken: bool, username_taken: bool) -> Self {
        match (email_taken, username_taken) {
            (false, false) => Availability::Available,
            (true, false) => Availability::EmailTaken,
            (false, true) => Availability::UsernameTaken,
            (true, true) => Availability::BothTaken,
        }
    }

    pub fn conflict(self) -> Option<ConflictKind> {
        match self {
            Availability::Available => None,
            Availability::EmailTaken => Some(ConflictKind::Email),
            Availability::UsernameTaken => Some(ConflictKind::Username),
            Availability::BothTaken => Some(ConflictKind::EmailAndUsername),
        }
    }
}

/// Runs both lookups inside `uow`, the same unit of work that will later
/// stage the insert.
pub async fn check_availability(
    uow: &mut dyn IdentityUnitOfWork,
    email: &str,
    username: &str,
) -> Result<Availability, StoreError> {
    let email_taken = uow
        .find_one(&IdentityFilter::Email(email.to_string()))
        .await?
        .is_some();
    let username_taken = uow
        .find_one(&IdentityFilter::Username(username.to_string()))
        .await?
        .is_some();

    Ok(Availability::from_flags(email_taken, username_taken))
}
