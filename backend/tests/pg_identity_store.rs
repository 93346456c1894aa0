use std::sync::OnceLock;

use chrono::{Duration, Utc};
use sqlx::Executor;
use taskboard_backend::{
    models::user::{RefreshTokenState, User},
    repositories::{
        identity::{IdentityFilter, IdentityStore, StoreError, UniqueField},
        postgres::PgIdentityStore,
    },
};
use tokio::sync::Mutex;

#[path = "support/mod.rs"]
mod support;

async fn integration_guard() -> tokio::sync::MutexGuard<'static, ()> {
    static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
    GUARD.get_or_init(|| Mutex::new(())).lock().await
}

async fn fresh_store() -> Option<PgIdentityStore> {
    let pool = support::test_pool().await?;
    pool.execute("TRUNCATE users").await.expect("truncate users");
    Some(PgIdentityStore::new(pool))
}

fn user(email: &str, username: &str, fingerprint: &str) -> User {
    User::new(
        "Ana".into(),
        Some("Silva".into()),
        email.into(),
        username.into(),
        "$argon2id$stub".into(),
        RefreshTokenState {
            fingerprint: fingerprint.into(),
            expires_at: Utc::now() + Duration::days(7),
        },
        Utc::now(),
    )
}

#[tokio::test]
async fn created_identity_is_found_by_every_key() {
    let _guard = integration_guard().await;
    let Some(store) = fresh_store().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return;
    };

    let ana = user("ana@x.com", "ana1", "fp-0");
    let mut uow = store.begin().await.unwrap();
    uow.create(ana.clone());
    uow.commit().await.unwrap();

    let mut reader = store.begin().await.unwrap();
    for filter in [
        IdentityFilter::Id(ana.id),
        IdentityFilter::Email("ana@x.com".into()),
        IdentityFilter::Username("ana1".into()),
    ] {
        let found = reader.find_one(&filter).await.unwrap().expect("found");
        assert_eq!(found.id, ana.id);
        assert_eq!(found.surname.as_deref(), Some("Silva"));
        assert_eq!(found.refresh_fingerprint(), Some("fp-0"));
    }
}

#[tokio::test]
async fn unique_constraints_map_to_conflict_fields() {
    let _guard = integration_guard().await;
    let Some(store) = fresh_store().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return;
    };

    let mut uow = store.begin().await.unwrap();
    uow.create(user("ana@x.com", "ana1", "fp-0"));
    uow.commit().await.unwrap();

    let mut same_email = store.begin().await.unwrap();
    same_email.create(user("ana@x.com", "ana2", "fp-1"));
    assert!(matches!(
        same_email.commit().await,
        Err(StoreError::Conflict(UniqueField::Email))
    ));

    let mut same_username = store.begin().await.unwrap();
    same_username.create(user("other@x.com", "ana1", "fp-2"));
    assert!(matches!(
        same_username.commit().await,
        Err(StoreError::Conflict(UniqueField::Username))
    ));
}

#[tokio::test]
async fn guarded_update_applies_once() {
    let _guard = integration_guard().await;
    let Some(store) = fresh_store().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return;
    };

    let ana = user("ana@x.com", "ana1", "fp-0");
    let mut uow = store.begin().await.unwrap();
    uow.create(ana.clone());
    uow.commit().await.unwrap();

    let rotated = |fp: &str| {
        let mut u = ana.clone();
        u.rotate_refresh_token(
            RefreshTokenState {
                fingerprint: fp.into(),
                expires_at: Utc::now() + Duration::days(7),
            },
            Utc::now(),
        );
        u
    };

    let mut winner = store.begin().await.unwrap();
    winner.update_guarded(rotated("fp-1"), "fp-0".into());
    winner.commit().await.unwrap();

    let mut loser = store.begin().await.unwrap();
    loser.update_guarded(rotated("fp-2"), "fp-0".into());
    assert!(matches!(loser.commit().await, Err(StoreError::Stale)));

    let mut reader = store.begin().await.unwrap();
    let stored = reader
        .find_one(&IdentityFilter::Id(ana.id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.refresh_fingerprint(), Some("fp-1"));
}
