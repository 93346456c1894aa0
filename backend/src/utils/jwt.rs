use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::JwtConfig;

/// Number of random bytes behind every refresh token.
pub const REFRESH_TOKEN_BYTES: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub email: String,
    pub username: String,
    /// Local part of the email address.
    pub email_identifier: String,
    pub iss: String,
    pub aud: String,
    pub exp: i64, // expiration time
    pub iat: i64, // issued at
    pub jti: String,
}

impl Claims {
    pub fn new(email: &str, username: &str, config: &JwtConfig, now: DateTime<Utc>) -> Self {
        let exp = now + Duration::days(config.access_token_days);
        let email_identifier = email.split('@').next().unwrap_or_default().to_string();

        Self {
            email: email.to_string(),
            username: username.to_string(),
            email_identifier,
            iss: config.issuer.clone(),
            aud: config.audience.clone(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        }
    }
}

/// A signed access token together with its expiry.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub fn create_access_token(
    email: &str,
    username: &str,
    config: &JwtConfig,
    key: &EncodingKey,
    now: DateTime<Utc>,
) -> anyhow::Result<AccessToken> {
    let claims = Claims::new(email, username, config, now);
    let expires_at = DateTime::from_timestamp(claims.exp, 0)
        .ok_or_else(|| anyhow::anyhow!("Access token expiry out of range"))?;
    let token = encode(&Header::new(Algorithm::HS256), &claims, key)?;

    Ok(AccessToken { token, expires_at })
}

pub fn verify_access_token(
    token: &str,
    config: &JwtConfig,
    key: &DecodingKey,
) -> anyhow::Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);
    validation.set_audience(&[&config.audience]);
    let token_data = decode::<Claims>(token, key, &validation)?;

    Ok(token_data.claims)
}

/// Draws a fresh refresh token from the OS CSPRNG, base64 encoded.
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

/// SHA-256 hex digest of a refresh token. Only this value is persisted.
pub fn fingerprint_refresh_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
