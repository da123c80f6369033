//! Test utilities for Redis-backed blacklist tests
//!
//! Tests should handle connection failures gracefully and skip when Redis is absent

use anyhow::{Context, Result};
use redis::Client;
use std::env;

/// Get a Redis client whose server answers `PING`
///
/// Uses REDIS_TEST_URL environment variable or defaults to localhost
pub fn get_test_redis_client() -> Result<Client> {
    let redis_url =
        env::var("REDIS_TEST_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

    let client = Client::open(redis_url).context("Failed to create Redis client")?;
    let mut conn = client
        .get_connection()
        .context("Failed to connect to Redis")?;
    redis::cmd("PING")
        .query::<String>(&mut conn)
        .context("Redis did not answer PING")?;

    Ok(client)
}
