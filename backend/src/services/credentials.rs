//! Password hashing and token issuance bound to the loaded configuration.

use argon2::password_hash::SaltString;
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey};

use crate::config::JwtConfig;
use crate::models::user::RefreshTokenState;
use crate::utils::jwt::{
    create_access_token, fingerprint_refresh_token, generate_refresh_token, verify_access_token,
    AccessToken, Claims,
};
use crate::utils::password::{self, Argon2Params};

/// A freshly drawn refresh token. `token` goes to the client, `state` is
/// what gets persisted.
#[derive(Clone)]
pub struct RefreshGrant {
    pub token: String,
    pub state: RefreshTokenState,
}

impl RefreshGrant {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.state.expires_at
    }
}

pub struct CredentialIssuer {
    jwt: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    hasher: Argon2<'static>,
}

impl CredentialIssuer {
    pub fn new(jwt: JwtConfig, argon2: Argon2Params) -> anyhow::Result<Self> {
        jwt.validate()?;
        let encoding_key = EncodingKey::from_secret(jwt.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(jwt.secret.as_bytes());
        Ok(Self {
            jwt,
            encoding_key,
            decoding_key,
            hasher: argon2.hasher()?,
        })
    }

    pub fn hash_password(&self, password: &str, salt: &SaltString) -> anyhow::Result<String> {
        password::hash_password(&self.hasher, password, salt)
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> anyhow::Result<bool> {
        password::verify_password(password, hash)
    }

    pub fn issue_access_token(
        &self,
        email: &str,
        username: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<AccessToken> {
        create_access_token(email, username, &self.jwt, &self.encoding_key, now)
    }

    pub fn verify_access_token(&self, token: &str) -> anyhow::Result<Claims> {
        verify_access_token(token, &self.jwt, &self.decoding_key)
    }

    pub fn issue_refresh_token(&self, now: DateTime<Utc>) -> RefreshGrant {
        let token = generate_refresh_token();
        let state = RefreshTokenState {
            fingerprint: fingerprint_refresh_token(&token),
            expires_at: now + Duration::days(self.jwt.refresh_token_days),
        };
        RefreshGrant { token, state }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::password::generate_salt;

    fn jwt_config() -> JwtConfig {
        JwtConfig {
            issuer: "taskboard".into(),
            audience: "taskboard-api".into(),
            secret: "0123456789abcdef0123456789abcdef".into(),
            access_token_days: 2,
            refresh_token_days: 7,
        }
    }

    fn issuer() -> CredentialIssuer {
        CredentialIssuer::new(
            jwt_config(),
            Argon2Params {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
        )
        .expect("valid issuer")
    }

    #[test]
    fn refresh_grant_persists_only_the_fingerprint() {
        let issuer = issuer();
        let now = Utc::now();
        let grant = issuer.issue_refresh_token(now);
        assert_ne!(grant.state.fingerprint, grant.token);
        assert_eq!(
            grant.state.fingerprint,
            fingerprint_refresh_token(&grant.token)
        );
        assert_eq!(grant.expires_at(), now + Duration::days(7));
    }

    #[test]
    fn access_token_round_trips_through_the_issuer() {
        let issuer = issuer();
        let now = Utc::now();
        let access = issuer.issue_access_token("ana@x.com", "ana1", now).unwrap();
        assert_eq!(access.expires_at.timestamp(), (now + Duration::days(2)).timestamp());
        let claims = issuer.verify_access_token(&access.token).unwrap();
        assert_eq!(claims.username, "ana1");
        assert_eq!(claims.aud, "taskboard-api");
    }

    #[test]
    fn password_hash_verifies_with_its_own_salt() {
        let issuer = issuer();
        let hash = issuer.hash_password("pw1", &generate_salt()).unwrap();
        assert!(issuer.verify_password("pw1", &hash).unwrap());
        assert!(!issuer.verify_password("pw2", &hash).unwrap());
    }

    #[test]
    fn short_secret_is_refused() {
        let mut jwt = jwt_config();
        jwt.secret = "short".into();
        assert!(CredentialIssuer::new(jwt, Argon2Params::default()).is_err());
    }

    #[test]
    fn unbounded_refresh_lifetime_is_refused() {
        let mut jwt = jwt_config();
        jwt.refresh_token_days = 100_000_000;
        assert!(CredentialIssuer::new(jwt, Argon2Params::default()).is_err());
    }
}
