pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod notifications;

pub use db::DbPool;

use std::sync::Arc;

use crate::api::rate_limit::RateLimiter;
use crate::auth::{SecretHasher, TokenIssuer};
use crate::cache::ReadCache;
use crate::config::Config;
use crate::notifications::OtpDelivery;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub hasher: SecretHasher,
    pub tokens: TokenIssuer,
    pub mailer: Arc<dyn OtpDelivery>,
    pub cache: Arc<ReadCache>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool, mailer: Arc<dyn OtpDelivery>) -> anyhow::Result<Self> {
        let hasher = SecretHasher::new(config.auth.hash_memory_kib, config.auth.hash_iterations)?;
        let tokens = TokenIssuer::new(&config.auth);
        let cache = Arc::new(ReadCache::new(&config.cache));
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        Ok(Self {
            config,
            db,
            hasher,
            tokens,
            mailer,
            cache,
            rate_limiter,
        })
    }
}
