//! One-time-passcode challenges.
//!
//! A user has at most one pending challenge; issuing a new code overwrites
//! any outstanding one. Only the argon2 hash of the code is stored, with an
//! expiry checked against the wall clock at verification time. Consumption
//! is a conditional update so two concurrent verifications of the same code
//! cannot both succeed.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sqlx::SqlitePool;
use thiserror::Error;

use super::password::{PasswordError, SecretHasher};

/// Codes are drawn uniformly from the full 6-digit range.
const CODE_MIN: u32 = 100_000;
const CODE_MAX: u32 = 1_000_000;

#[derive(Debug, Error)]
pub enum OtpError {
    /// No pending challenge: never issued, already consumed, or superseded.
    #[error("no pending passcode")]
    NotFound,
    #[error("passcode expired")]
    Expired,
    #[error("passcode mismatch")]
    Mismatch,
    #[error("passcode hashing failed: {0}")]
    Hash(#[from] PasswordError),
    #[error(transparent)]
    Store(#[from] sqlx::Error),
}

/// Generate and persist a fresh challenge for the user, returning the
/// plaintext code for out-of-band delivery. The plaintext is never stored.
pub async fn issue(
    db: &SqlitePool,
    hasher: &SecretHasher,
    user_id: &str,
    ttl: Duration,
) -> Result<String, OtpError> {
    let code = generate_code();
    let code_hash = hasher.hash(&code)?;
    let now = Utc::now();
    let expires_at = (now + ttl).to_rfc3339();

    let result = sqlx::query(
        "UPDATE users SET otp_hash = ?, otp_expires_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&code_hash)
    .bind(&expires_at)
    .bind(now.to_rfc3339())
    .bind(user_id)
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(OtpError::NotFound);
    }

    Ok(code)
}

/// Check a submitted code against the user's pending challenge and consume
/// it on success. Expired challenges are cleared as a side effect so they
/// cannot be retried.
pub async fn verify(
    db: &SqlitePool,
    hasher: &SecretHasher,
    user_id: &str,
    submitted: &str,
) -> Result<(), OtpError> {
    let row: Option<(Option<String>, Option<String>)> =
        sqlx::query_as("SELECT otp_hash, otp_expires_at FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(db)
            .await?;

    let (otp_hash, expires_at) = row.ok_or(OtpError::NotFound)?;
    let otp_hash = otp_hash.ok_or(OtpError::NotFound)?;
    let expires_at = expires_at.ok_or(OtpError::NotFound)?;

    // Wall clock at verify time is authoritative; an unparseable expiry is
    // treated as expired rather than trusted.
    let expired = DateTime::parse_from_rfc3339(&expires_at)
        .map(|t| Utc::now() > t.with_timezone(&Utc))
        .unwrap_or(true);
    if expired {
        clear_if_matches(db, user_id, &otp_hash).await?;
        return Err(OtpError::Expired);
    }

    if !hasher.verify(submitted, &otp_hash)? {
        return Err(OtpError::Mismatch);
    }

    // Single-use: the clear only succeeds if the pending hash is still the
    // one we verified. A concurrent verify or a superseding issue makes the
    // update a no-op and this attempt loses.
    if !clear_if_matches(db, user_id, &otp_hash).await? {
        return Err(OtpError::NotFound);
    }

    Ok(())
}

/// Drop whatever challenge is pending for the user, if any. Used when code
/// delivery fails after issuance, so the account is not left waiting on a
/// code that never went out.
pub async fn revoke(db: &SqlitePool, user_id: &str) -> Result<(), OtpError> {
    sqlx::query("UPDATE users SET otp_hash = NULL, otp_expires_at = NULL WHERE id = ?")
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(())
}

async fn clear_if_matches(
    db: &SqlitePool,
    user_id: &str,
    otp_hash: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE users SET otp_hash = NULL, otp_expires_at = NULL WHERE id = ? AND otp_hash = ?",
    )
    .bind(user_id)
    .bind(otp_hash)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

fn generate_code() -> String {
    let mut rng = rand::rng();
    rng.random_range(CODE_MIN..CODE_MAX).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn test_hasher() -> SecretHasher {
        SecretHasher::new(1024, 1).unwrap()
    }

    async fn seed_user(pool: &SqlitePool, id: &str) {
        sqlx::query(
            "INSERT INTO users (id, first_name, last_name, email, password_hash, role)
             VALUES (?, 'Test', 'User', ?, 'x', 'user')",
        )
        .bind(id)
        .bind(format!("{id}@example.com"))
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_issue_then_verify() {
        let pool = db::init_in_memory().await.unwrap();
        let hasher = test_hasher();
        seed_user(&pool, "u1").await;

        let code = issue(&pool, &hasher, "u1", Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));

        verify(&pool, &hasher, "u1", &code).await.unwrap();
    }

    #[tokio::test]
    async fn test_verify_is_single_use() {
        let pool = db::init_in_memory().await.unwrap();
        let hasher = test_hasher();
        seed_user(&pool, "u1").await;

        let code = issue(&pool, &hasher, "u1", Duration::minutes(5))
            .await
            .unwrap();
        verify(&pool, &hasher, "u1", &code).await.unwrap();

        let second = verify(&pool, &hasher, "u1", &code).await;
        assert!(matches!(second, Err(OtpError::NotFound)));
    }

    #[tokio::test]
    async fn test_expired_code_is_rejected_and_cleared() {
        let pool = db::init_in_memory().await.unwrap();
        let hasher = test_hasher();
        seed_user(&pool, "u1").await;

        let code = issue(&pool, &hasher, "u1", Duration::minutes(-1))
            .await
            .unwrap();

        let result = verify(&pool, &hasher, "u1", &code).await;
        assert!(matches!(result, Err(OtpError::Expired)));

        // The stale challenge was cleared, so a retry sees nothing pending
        let retry = verify(&pool, &hasher, "u1", &code).await;
        assert!(matches!(retry, Err(OtpError::NotFound)));
    }

    #[tokio::test]
    async fn test_reissue_invalidates_previous_code() {
        let pool = db::init_in_memory().await.unwrap();
        let hasher = test_hasher();
        seed_user(&pool, "u1").await;

        let first = issue(&pool, &hasher, "u1", Duration::minutes(5))
            .await
            .unwrap();
        let second = issue(&pool, &hasher, "u1", Duration::minutes(5))
            .await
            .unwrap();

        let result = verify(&pool, &hasher, "u1", &first).await;
        // The superseded code either mismatches the new hash or, in the
        // astronomically unlikely case the codes collide, still verifies.
        if first != second {
            assert!(matches!(result, Err(OtpError::Mismatch)));
        }

        verify(&pool, &hasher, "u1", &second).await.unwrap();
    }

    #[tokio::test]
    async fn test_wrong_code_is_mismatch() {
        let pool = db::init_in_memory().await.unwrap();
        let hasher = test_hasher();
        seed_user(&pool, "u1").await;

        let code = issue(&pool, &hasher, "u1", Duration::minutes(5))
            .await
            .unwrap();
        let wrong = if code == "123456" { "654321" } else { "123456" };

        let result = verify(&pool, &hasher, "u1", wrong).await;
        assert!(matches!(result, Err(OtpError::Mismatch)));

        // A wrong guess does not consume the pending challenge
        verify(&pool, &hasher, "u1", &code).await.unwrap();
    }

    #[tokio::test]
    async fn test_issue_for_unknown_user() {
        let pool = db::init_in_memory().await.unwrap();
        let hasher = test_hasher();

        let result = issue(&pool, &hasher, "ghost", Duration::minutes(5)).await;
        assert!(matches!(result, Err(OtpError::NotFound)));
    }

    #[tokio::test]
    async fn test_concurrent_verify_has_one_winner() {
        let pool = db::init_in_memory().await.unwrap();
        let hasher = test_hasher();
        seed_user(&pool, "u1").await;

        let code = issue(&pool, &hasher, "u1", Duration::minutes(5))
            .await
            .unwrap();

        let hasher2 = test_hasher();
        let pool2 = pool.clone();
        let code2 = code.clone();
        let first = tokio::spawn(async move { verify(&pool2, &hasher2, "u1", &code2).await });
        let second = verify(&pool, &hasher, "u1", &code).await;
        let first = first.await.unwrap();

        let winners = [&first, &second]
            .iter()
            .filter(|result| result.is_ok())
            .count();
        assert_eq!(winners, 1);

        for result in [first, second] {
            if let Err(e) = result {
                assert!(matches!(e, OtpError::NotFound));
            }
        }
    }
}
