use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taskboard_backend::{
    config::{mask_secret, Config},
    db::create_pool,
    repositories::PgIdentityStore,
    routes::build_router,
    services::{CredentialIssuer, SessionService},
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskboard_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    if config.database_url.is_empty() {
        anyhow::bail!("DATABASE_URL must be set");
    }
    tracing::info!(
        database_url = %mask_secret(&config.database_url),
        jwt_issuer = %config.jwt.issuer,
        jwt_audience = %config.jwt.audience,
        jwt_secret = %mask_secret(&config.jwt.secret),
        jwt_expiration_days = config.jwt.access_token_days,
        refresh_token_expiration_days = config.jwt.refresh_token_days,
        cookie_secure = config.cookie_secure,
        cookie_same_site = ?config.cookie_same_site,
        "Loaded configuration from environment/.env"
    );

    let pool = create_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let credentials = CredentialIssuer::new(config.jwt.clone(), config.argon2)?;
    let sessions = SessionService::new(Arc::new(PgIdentityStore::new(pool)), Arc::new(credentials));
    let bind_addr = config.bind_addr;
    let app = build_router(AppState::new(sessions, config));

    tracing::info!("Server listening on {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
