use anyhow::{anyhow, bail, Context};
use std::env;
use std::fmt;
use std::net::SocketAddr;

use crate::utils::{cookies::SameSite, password::Argon2Params};

pub const MIN_JWT_SECRET_LEN: usize = 32;
/// Upper bound for both token lifetimes, in days.
pub const MAX_TOKEN_LIFETIME_DAYS: i64 = 3650;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub jwt: JwtConfig,
    pub argon2: Argon2Params,
    pub cookie_secure: bool,
    pub cookie_same_site: SameSite,
    pub cors_allow_origins: Vec<String>,
}

/// Signing settings shared by every token issuance.
#[derive(Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub secret: String,
    pub access_token_days: i64,
    pub refresh_token_days: i64,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("secret", &mask_secret(&self.secret))
            .field("access_token_days", &self.access_token_days)
            .field("refresh_token_days", &self.refresh_token_days)
            .finish()
    }
}

impl JwtConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.secret.len() < MIN_JWT_SECRET_LEN {
            bail!("JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} characters");
        }
        if !(1..=MAX_TOKEN_LIFETIME_DAYS).contains(&self.access_token_days) {
            bail!("JWT_EXPIRATION_DAYS must be between 1 and {MAX_TOKEN_LIFETIME_DAYS}");
        }
        if !(1..=MAX_TOKEN_LIFETIME_DAYS).contains(&self.refresh_token_days) {
            bail!("REFRESH_TOKEN_EXPIRATION_DAYS must be between 1 and {MAX_TOKEN_LIFETIME_DAYS}");
        }
        Ok(())
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup so tests do not
    /// have to mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").unwrap_or_default();

        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:3000".to_string())
            .parse()
            .context("Invalid BIND_ADDR value")?;

        let jwt = JwtConfig {
            issuer: lookup("JWT_ISSUER").unwrap_or_else(|| "taskboard".to_string()),
            audience: lookup("JWT_AUDIENCE").unwrap_or_else(|| "taskboard-api".to_string()),
            secret: lookup("JWT_SECRET").ok_or_else(|| anyhow!("JWT_SECRET must be set"))?,
            access_token_days: parse_or(&lookup, "JWT_EXPIRATION_DAYS", 2)?,
            refresh_token_days: parse_or(&lookup, "REFRESH_TOKEN_EXPIRATION_DAYS", 7)?,
        };
        jwt.validate()?;

        let defaults = Argon2Params::default();
        let argon2 = Argon2Params {
            memory_kib: parse_or(&lookup, "ARGON2_MEMORY_KIB", defaults.memory_kib)?,
            iterations: parse_or(&lookup, "ARGON2_ITERATIONS", defaults.iterations)?,
            parallelism: parse_or(&lookup, "ARGON2_PARALLELISM", defaults.parallelism)?,
        };

        let cookie_secure = lookup("COOKIE_SECURE")
            .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "false" | "0" | "no"))
            .unwrap_or(true);

        let cookie_same_site = match lookup("COOKIE_SAME_SITE") {
            Some(raw) => raw.parse::<SameSite>().map_err(|e| anyhow!(e))?,
            None => SameSite::Strict,
        };

        let cors_allow_origins = lookup("CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().trim_end_matches('/').to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(Config {
            database_url,
            bind_addr,
            jwt,
            argon2,
            cookie_secure,
            cookie_same_site,
            cors_allow_origins,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid {} value: {}", key, raw)),
        None => Ok(default),
    }
}

pub fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "<empty>".into();
    }
    let prefix = s.chars().take(4).collect::<String>();
    format!("{}*** (len={})", prefix, s.len())
}
