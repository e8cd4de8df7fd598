//! Registration, OTP-gated login, and session revocation endpoints.
//!
//! Registration issues a token pair directly. Login only checks credentials
//! and emails a one-time passcode; the pair is withheld until the code is
//! verified. The refresh token always travels as an http-only, same-site
//! cookie, never in a response body.

use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use std::sync::Arc;

use crate::api::error::{ApiError, ValidationErrorBuilder};
use crate::api::guard::{AuthUser, REFRESH_COOKIE};
use crate::api::validation;
use crate::auth::{bump_token_version, otp, OtpError};
use crate::db::{
    AuthResponse, LoginRequest, LoginResponse, RegisterRequest, User, VerifyOtpRequest, ROLE_USER,
};
use crate::AppState;

/// Register a new account and establish a session immediately.
///
/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let role = request
        .role
        .clone()
        .unwrap_or_else(|| ROLE_USER.to_string());

    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validation::validate_name(&request.first_name, "First name") {
        errors.add("first_name", e);
    }
    if let Err(e) = validation::validate_name(&request.last_name, "Last name") {
        errors.add("last_name", e);
    }
    if let Err(e) = validation::validate_email(&request.email) {
        errors.add("email", e);
    }
    if let Err(e) = validation::validate_password(&request.password) {
        errors.add("password", e);
    }
    if let Err(e) = validation::validate_role(&role) {
        errors.add("role", e);
    }
    errors.finish()?;

    let email = request.email.trim().to_lowercase();

    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::bad_request("User already exists."));
    }

    let password_hash = state.hasher.hash(&request.password)?;
    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO users (id, first_name, last_name, email, password_hash, role, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&request.first_name)
    .bind(&request.last_name)
    .bind(&email)
    .bind(&password_hash)
    .bind(&role)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    tracing::info!(email = %email, "User registered");

    // Re-read the row so the refresh token binds to the stored counter
    let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    let access_token = state.tokens.issue_access(&user.id, &user.role)?;
    let refresh_token = state.tokens.issue_refresh(&user.id, user.token_version)?;
    let cookie = refresh_cookie_header(&refresh_token, state.tokens.refresh_ttl().num_seconds())?;

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse {
            access_token,
            user: user.into(),
        }),
    ))
}

/// First login phase: check credentials, then issue and email an OTP.
///
/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validation::validate_email(&request.email) {
        errors.add("email", e);
    }
    if let Err(e) = validation::validate_password(&request.password) {
        errors.add("password", e);
    }
    errors.finish()?;

    let email = request.email.trim().to_lowercase();

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?;
    let user = user.ok_or_else(|| ApiError::not_found("User not found."))?;

    if !state.hasher.verify(&request.password, &user.password_hash)? {
        return Err(ApiError::bad_request("Invalid credentials."));
    }

    let ttl = Duration::minutes(state.config.auth.otp_ttl_minutes);
    let code = otp::issue(&state.db, &state.hasher, &user.id, ttl)
        .await
        .map_err(otp_error)?;

    if let Err(e) = state.mailer.send_otp(&user.email, &code).await {
        tracing::error!(email = %user.email, error = %e, "Failed to deliver OTP");
        // Do not leave the account waiting on a code that never went out
        otp::revoke(&state.db, &user.id).await.map_err(otp_error)?;
        return Err(ApiError::internal("Failed to send the OTP email"));
    }

    tracing::info!(email = %user.email, "OTP issued for login");

    Ok(Json(LoginResponse {
        email: user.email,
        message: "Verify your email for the OTP".to_string(),
    }))
}

/// Second login phase: consume the OTP and establish the session.
///
/// POST /api/auth/verify-otp
pub async fn verify_otp(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyOtpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validation::validate_email(&request.email) {
        errors.add("email", e);
    }
    if let Err(e) = validation::validate_otp_code(&request.otp) {
        errors.add("otp", e);
    }
    errors.finish()?;

    let email = request.email.trim().to_lowercase();

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?;
    let user = user.ok_or_else(|| ApiError::not_found("User not found."))?;

    otp::verify(&state.db, &state.hasher, &user.id, &request.otp)
        .await
        .map_err(otp_error)?;

    // Re-read immediately before minting: a concurrent password change may
    // have moved the counter past the row read above
    let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&user.id)
        .fetch_one(&state.db)
        .await?;

    let access_token = state.tokens.issue_access(&user.id, &user.role)?;
    let refresh_token = state.tokens.issue_refresh(&user.id, user.token_version)?;
    let cookie = refresh_cookie_header(&refresh_token, state.tokens.refresh_ttl().num_seconds())?;

    tracing::info!(user_id = %user.id, "OTP verified, session established");

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse {
            access_token,
            user: user.into(),
        }),
    ))
}

/// Revoke every outstanding refresh token for the calling user.
///
/// POST /api/auth/logout-all
pub async fn logout_all(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let new_version = bump_token_version(&state.db, &auth_user.id).await?;

    tracing::info!(
        user_id = %auth_user.id,
        token_version = new_version,
        "All sessions revoked"
    );

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, clear_refresh_cookie_header()?)],
        Json(serde_json::json!({ "message": "Logged out everywhere." })),
    ))
}

/// Expected OTP outcomes collapse to one deliberately vague message;
/// infrastructure faults surface as 500s.
fn otp_error(err: OtpError) -> ApiError {
    match err {
        OtpError::NotFound | OtpError::Expired | OtpError::Mismatch => {
            ApiError::bad_request("Invalid or expired OTP.")
        }
        OtpError::Hash(e) => e.into(),
        OtpError::Store(e) => e.into(),
    }
}

fn refresh_cookie_header(token: &str, max_age_secs: i64) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(&format!(
        "{REFRESH_COOKIE}={token}; Max-Age={max_age_secs}; Path=/; HttpOnly; Secure; SameSite=Strict"
    ))
    .map_err(|_| ApiError::internal("Internal server error"))
}

fn clear_refresh_cookie_header() -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(&format!(
        "{REFRESH_COOKIE}=; Max-Age=0; Path=/; HttpOnly; Secure; SameSite=Strict"
    ))
    .map_err(|_| ApiError::internal("Internal server error"))
}
