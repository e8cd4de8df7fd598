pub mod auth;
mod challenges;
pub mod error;
pub mod guard;
pub mod rate_limit;
mod users;
mod validation;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Public auth routes sit behind the tight rate-limit tier
    let public_auth = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/verify-otp", post(auth::verify_otp))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_auth,
        ));

    let session_auth = Router::new()
        .route("/logout-all", post(auth::logout_all))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            guard::require_auth,
        ));

    let auth_routes = public_auth.merge(session_auth);

    // Routes open to any authenticated user
    let user_routes = Router::new()
        .route("/users/:id", get(users::get_user))
        .route("/users/me", put(users::update_me))
        .route("/challenges", get(challenges::list_challenges))
        .route("/challenges/:id", get(challenges::get_challenge))
        .route("/challenges/:id/join", post(challenges::join_challenge))
        .route("/challenges/:id/leave", post(challenges::leave_challenge))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            guard::require_auth,
        ));

    // Admin-only management routes
    let admin_routes = Router::new()
        .route("/users", get(users::list_users))
        .route("/users/:id", delete(users::delete_user))
        .route("/challenges", post(challenges::create_challenge))
        .route("/challenges/:id", put(challenges::update_challenge))
        .route("/challenges/:id", delete(challenges::delete_challenge))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            guard::require_admin,
        ));

    let api_routes = user_routes.merge(admin_routes).layer(
        middleware::from_fn_with_state(state.clone(), rate_limit::rate_limit_api),
    );

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
