//! User account model and auth DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const ROLE_USER: &str = "user";
pub const ROLE_ADMIN: &str = "admin";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub token_version: i64,
    pub otp_hash: Option<String>,
    pub otp_expires_at: Option<String>,
    pub profile_picture_url: String,
    pub created_at: String,
    pub updated_at: String,
}

/// User as exposed over the API. Never carries the password hash or any
/// pending OTP state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: String,
    pub profile_picture_url: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            role: user.role,
            profile_picture_url: user.profile_picture_url,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login succeeds with a message only; tokens are withheld until the OTP
/// is verified.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub email: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

/// Issued on registration and on successful OTP verification. The refresh
/// token travels separately as an http-only cookie.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub current_password: Option<String>,
    #[serde(default)]
    pub new_password: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: "u-1".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: "$argon2id$v=19$secret".to_string(),
            role: ROLE_USER.to_string(),
            token_version: 1,
            otp_hash: Some("pending".to_string()),
            otp_expires_at: Some("2030-01-01T00:00:00+00:00".to_string()),
            profile_picture_url: "https://www.gravatar.com/avatar/?d=mp".to_string(),
            created_at: "2030-01-01T00:00:00+00:00".to_string(),
            updated_at: "2030-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_user_response_scrubs_credentials() {
        let response = UserResponse::from(sample_user());
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("argon2id"));
        assert!(!json.contains("otp"));
        assert!(json.contains("ada@example.com"));
    }
}
