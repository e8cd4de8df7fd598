//! Signed access and refresh tokens.
//!
//! Access tokens are short-lived and self-contained: signature plus expiry,
//! no store lookup. Refresh tokens additionally embed the user's
//! token_version at mint time; bumping the stored counter voids every
//! refresh token issued before the bump without keeping a blacklist.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::config::AuthConfig;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to sign token: {0}")]
    Signing(jsonwebtoken::errors::Error),
    #[error("invalid token")]
    Invalid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User id
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// User id
    pub sub: String,
    /// Must match the user's stored counter for the token to be accepted
    pub token_version: i64,
    pub iat: i64,
    pub exp: i64,
}

pub struct TokenIssuer {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(config.access_token_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_token_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_token_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_token_secret.as_bytes()),
            access_ttl: Duration::minutes(config.access_token_ttl_minutes),
            refresh_ttl: Duration::days(config.refresh_token_ttl_days),
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn issue_access(&self, user_id: &str, role: &str) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: user_id.to_string(),
            role: role.to_string(),
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.access_encoding).map_err(TokenError::Signing)
    }

    /// `token_version` must be read from the user record immediately before
    /// calling this, so a refresh token is never minted against a counter a
    /// concurrent invalidation has already moved past.
    pub fn issue_refresh(&self, user_id: &str, token_version: i64) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = RefreshClaims {
            sub: user_id.to_string(),
            token_version,
            iat: now.timestamp(),
            exp: (now + self.refresh_ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.refresh_encoding).map_err(TokenError::Signing)
    }

    pub fn decode_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        decode::<AccessClaims>(token, &self.access_decoding, &strict_validation())
            .map(|data| data.claims)
            .map_err(|_| TokenError::Invalid)
    }

    pub fn decode_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        decode::<RefreshClaims>(token, &self.refresh_decoding, &strict_validation())
            .map(|data| data.claims)
            .map_err(|_| TokenError::Invalid)
    }
}

/// Expiry is exact: no leeway window in which a just-expired token still
/// passes.
fn strict_validation() -> Validation {
    let mut validation = Validation::default();
    validation.leeway = 0;
    validation
}

/// Atomically bump the user's token version, voiding every refresh token
/// minted before the bump. A single in-place increment, never
/// read-modify-write, so concurrent bumps cannot lose updates.
pub async fn bump_token_version(db: &SqlitePool, user_id: &str) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        "UPDATE users SET token_version = token_version + 1 WHERE id = ? RETURNING token_version",
    )
    .bind(user_id)
    .fetch_one(db)
    .await?;
    Ok(row.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn test_config() -> AuthConfig {
        AuthConfig {
            access_token_secret: "access-secret".to_string(),
            refresh_token_secret: "refresh-secret".to_string(),
            ..AuthConfig::default()
        }
    }

    #[test]
    fn test_access_token_roundtrip() {
        let issuer = TokenIssuer::new(&test_config());
        let token = issuer.issue_access("u1", "admin").unwrap();

        let claims = issuer.decode_access(&token).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.role, "admin");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_refresh_token_roundtrip() {
        let issuer = TokenIssuer::new(&test_config());
        let token = issuer.issue_refresh("u1", 3).unwrap();

        let claims = issuer.decode_refresh(&token).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.token_version, 3);
    }

    #[test]
    fn test_secrets_are_not_interchangeable() {
        let issuer = TokenIssuer::new(&test_config());

        let access = issuer.issue_access("u1", "user").unwrap();
        assert!(issuer.decode_refresh(&access).is_err());

        let refresh = issuer.issue_refresh("u1", 1).unwrap();
        assert!(issuer.decode_access(&refresh).is_err());
    }

    #[test]
    fn test_expired_access_token_is_rejected() {
        let config = AuthConfig {
            access_token_ttl_minutes: -1,
            ..test_config()
        };
        let issuer = TokenIssuer::new(&config);

        let token = issuer.issue_access("u1", "user").unwrap();
        assert!(matches!(
            issuer.decode_access(&token),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_tampered_token_is_rejected() {
        let issuer = TokenIssuer::new(&test_config());
        let token = issuer.issue_access("u1", "user").unwrap();

        let mut tampered = token.clone();
        tampered.pop();
        assert!(issuer.decode_access(&tampered).is_err());
    }

    #[tokio::test]
    async fn test_bump_is_monotonic() {
        let pool = db::init_in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO users (id, first_name, last_name, email, password_hash, role)
             VALUES ('u1', 'Test', 'User', 'u1@example.com', 'x', 'user')",
        )
        .execute(&pool)
        .await
        .unwrap();

        assert_eq!(bump_token_version(&pool, "u1").await.unwrap(), 2);
        assert_eq!(bump_token_version(&pool, "u1").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_bump_unknown_user_errors() {
        let pool = db::init_in_memory().await.unwrap();
        assert!(bump_token_version(&pool, "ghost").await.is_err());
    }

    #[tokio::test]
    async fn test_version_revocation() {
        let pool = db::init_in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO users (id, first_name, last_name, email, password_hash, role)
             VALUES ('u1', 'Test', 'User', 'u1@example.com', 'x', 'user')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let issuer = TokenIssuer::new(&test_config());
        let refresh = issuer.issue_refresh("u1", 1).unwrap();

        let new_version = bump_token_version(&pool, "u1").await.unwrap();

        // The old refresh token still decodes, but its embedded version no
        // longer matches the stored counter, which is the revocation check.
        let claims = issuer.decode_refresh(&refresh).unwrap();
        assert_ne!(claims.token_version, new_version);

        // An access token minted after the bump is unaffected
        let access = issuer.issue_access("u1", "user").unwrap();
        assert!(issuer.decode_access(&access).is_ok());
    }
}
