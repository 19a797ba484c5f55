use std::sync::Arc;

use ptw_application::RateLimitRepository;
use ptw_core::AppError;
use ptw_infrastructure::{PostgresRateLimitRepository, RedisRateLimitRepository};
use sqlx::PgPool;
use tracing::info;

use crate::api_config::{ApiConfig, RateLimitStoreConfig};

const REDIS_KEY_PREFIX: &str = "ptw:rate_limit";

pub(super) async fn build_rate_limit_repository(
    pool: &PgPool,
    config: &ApiConfig,
) -> Result<Arc<dyn RateLimitRepository>, AppError> {
    match &config.rate_limit_store {
        RateLimitStoreConfig::Postgres => {
            info!(store = "postgres", "rate limit store configured");
            Ok(Arc::new(PostgresRateLimitRepository::new(pool.clone())))
        }
        RateLimitStoreConfig::Redis { redis_url } => {
            let client = redis::Client::open(redis_url.as_str())
                .map_err(|error| AppError::Validation(format!("invalid REDIS_URL: {error}")))?;
            let repository = RedisRateLimitRepository::connect(client, REDIS_KEY_PREFIX).await?;
            info!(store = "redis", "rate limit store configured");
            Ok(Arc::new(repository))
        }
    }
}
