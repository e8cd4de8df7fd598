//! Session validation middleware.
//!
//! Every authenticated route passes through here: verify the bearer access
//! token, and when it is expired or invalid fall back to a silent renewal
//! from the refresh-token cookie. Renewal re-reads the user so the stored
//! token_version is checked fresh on every attempt; a bumped counter makes
//! every older refresh token unusable immediately.

use axum::{
    async_trait,
    extract::{Request, State},
    http::{header, request::Parts, HeaderValue},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::db::{User, ROLE_ADMIN};
use crate::AppState;

/// Name of the http-only cookie carrying the refresh token
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Identity attached to the request once the session is validated
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub role: String,
}

/// Middleware requiring any authenticated user
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(state, request, next, None).await
}

/// Middleware requiring the admin role
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(state, request, next, Some(ROLE_ADMIN)).await
}

async fn authorize(
    state: Arc<AppState>,
    mut request: Request,
    next: Next,
    required_role: Option<&str>,
) -> Result<Response, ApiError> {
    // A bearer access token must be present before a refresh is even
    // considered; a request carrying only the refresh cookie is rejected.
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string)
        .ok_or_else(|| ApiError::unauthorized("Access token not found"))?;

    match state.tokens.decode_access(&token) {
        Ok(claims) => {
            let auth_user = AuthUser {
                id: claims.sub,
                role: claims.role,
            };
            check_role(&auth_user, required_role)?;
            request.extensions_mut().insert(auth_user);
            Ok(next.run(request).await)
        }
        // Missing/expired/bad signature all take the renewal path
        Err(_) => renew_session(state, request, next, required_role).await,
    }
}

/// Attempt a silent renewal from the refresh-token cookie. On success the
/// fresh access token is surfaced in the Authorization response header.
async fn renew_session(
    state: Arc<AppState>,
    mut request: Request,
    next: Next,
    required_role: Option<&str>,
) -> Result<Response, ApiError> {
    let jar = CookieJar::from_headers(request.headers());
    let refresh_token = jar
        .get(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;

    let claims = state
        .tokens
        .decode_refresh(&refresh_token)
        .map_err(|_| ApiError::unauthorized("Invalid refresh token"))?;

    // token_version is read fresh from the store on every renewal; no
    // cached copy may be consulted here
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&claims.sub)
        .fetch_optional(&state.db)
        .await?;

    let user = user.ok_or_else(|| ApiError::unauthorized("Invalid refresh token"))?;
    if user.token_version != claims.token_version {
        return Err(ApiError::unauthorized("Invalid refresh token"));
    }

    // Mint from the user's current id/role, not from the stale claims
    let access_token = state.tokens.issue_access(&user.id, &user.role)?;

    let auth_user = AuthUser {
        id: user.id,
        role: user.role,
    };
    check_role(&auth_user, required_role)?;
    request.extensions_mut().insert(auth_user);

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&format!("Bearer {access_token}")) {
        response.headers_mut().insert(header::AUTHORIZATION, value);
    }
    Ok(response)
}

fn check_role(auth_user: &AuthUser, required_role: Option<&str>) -> Result<(), ApiError> {
    if let Some(required) = required_role {
        if auth_user.role != required {
            return Err(ApiError::forbidden("Access denied"));
        }
    }
    Ok(())
}

/// Extractor for handlers that need the validated identity
#[async_trait]
impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Not authenticated"))
    }
}
