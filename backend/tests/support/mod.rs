#![allow(dead_code)]
use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{
    env,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration as StdDuration,
};
use taskboard_backend::{
    config::{Config, JwtConfig},
    models::user::{LoginRequest, RegisterRequest},
    repositories::identity::IdentityStore,
    services::{clock::Clock, credentials::CredentialIssuer, session::SessionService},
    state::AppState,
    utils::{cookies::SameSite, password::Argon2Params},
};

pub const TEST_SECRET: &str = "a_secure_token_that_is_long_enough_123";

pub fn test_config() -> Config {
    Config {
        database_url: env::var("TEST_DATABASE_URL").unwrap_or_default(),
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        jwt: JwtConfig {
            issuer: "taskboard".into(),
            audience: "taskboard-api".into(),
            secret: TEST_SECRET.into(),
            access_token_days: 2,
            refresh_token_days: 7,
        },
        argon2: Argon2Params {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        },
        cookie_secure: true,
        cookie_same_site: SameSite::Strict,
        cors_allow_origins: vec!["*".into()],
    }
}

pub fn credentials(config: &Config) -> Arc<CredentialIssuer> {
    Arc::new(CredentialIssuer::new(config.jwt.clone(), config.argon2).expect("credential issuer"))
}

/// Clock that only moves when a test moves it.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn starting_at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock lock");
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock")
    }
}

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
}

pub fn session_service(
    store: Arc<dyn IdentityStore>,
    clock: Arc<dyn Clock>,
) -> SessionService {
    SessionService::with_clock(store, credentials(&test_config()), clock)
}

pub fn app_state(store: Arc<dyn IdentityStore>, clock: Arc<dyn Clock>) -> AppState {
    let config = test_config();
    let sessions = SessionService::with_clock(store, credentials(&config), clock);
    AppState::new(sessions, config)
}

pub fn register_request(email: &str, username: &str, password: &str) -> RegisterRequest {
    RegisterRequest {
        name: "Ana".into(),
        surname: Some("Silva".into()),
        email: email.into(),
        username: username.into(),
        password: password.into(),
    }
}

pub fn login_request(email: &str, password: &str) -> LoginRequest {
    LoginRequest {
        email: email.into(),
        password: password.into(),
    }
}

/// Connects to `TEST_DATABASE_URL`, or returns `None` so PostgreSQL tests can
/// skip on machines without a database.
pub async fn test_pool() -> Option<PgPool> {
    let database_url = env::var("TEST_DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(StdDuration::from_secs(30))
        .connect(&database_url)
        .await
        .expect("connect to TEST_DATABASE_URL");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");
    Some(pool)
}
