use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use petwalk_core::repository::{CooldownStore, RepoResult};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::debug;

use crate::StoreError;

/// Claims KEYS[1] for ARGV[1] (epoch ms) when it is unset or at least
/// ARGV[2] ms older. ARGV[3] is the TTL in seconds.
const CLAIM_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if current and (tonumber(ARGV[1]) - tonumber(current)) < tonumber(ARGV[2]) then
    return 0
end
redis.call('SET', KEYS[1], ARGV[1], 'EX', ARGV[3])
return 1
"#;

/// Rolls KEYS[1] back from ARGV[1] to ARGV[2] (empty string deletes) unless
/// another claim landed in between.
const RELEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) ~= ARGV[1] then
    return 0
end
if ARGV[2] == '' then
    redis.call('DEL', KEYS[1])
else
    redis.call('SET', KEYS[1], ARGV[2], 'EX', ARGV[3])
end
return 1
"#;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

fn ttl_seconds(ttl: Duration) -> i64 {
    ttl.num_seconds().max(1)
}

fn from_millis(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    raw.parse::<i64>()
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .ok_or_else(|| StoreError::Decode(format!("bad cooldown stamp {}", raw)))
}

impl RedisClient {
    pub fn new(connection_string: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// Fixed-window counter per key. Returns whether the request fits the window.
    pub async fn check_rate_limit(&self, key: &str, limit: u64, window_seconds: i64) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        let key = format!("ratelimit:{}", key);
        let (count,): (u64,) = redis::pipe()
            .atomic()
            .incr(&key, 1)
            .cmd("EXPIRE")
            .arg(&key)
            .arg(window_seconds)
            .arg("NX")
            .ignore()
            .query_async(&mut conn)
            .await?;
        if count > limit {
            debug!(key = %key, count, "rate limit exceeded");
        }
        Ok(count <= limit)
    }
}

#[async_trait]
impl CooldownStore for RedisClient {
    async fn get(&self, key: &str) -> RepoResult<Option<DateTime<Utc>>> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn.get(key).await?;
        Ok(raw.as_deref().map(from_millis).transpose()?)
    }

    async fn set_if_newer(&self, key: &str, at: DateTime<Utc>, min_gap: Duration, ttl: Duration) -> RepoResult<bool> {
        let mut conn = self.connection().await?;
        let claimed: i32 = redis::Script::new(CLAIM_SCRIPT)
            .key(key)
            .arg(at.timestamp_millis())
            .arg(min_gap.num_milliseconds())
            .arg(ttl_seconds(ttl))
            .invoke_async(&mut conn)
            .await?;
        Ok(claimed == 1)
    }

    async fn release(
        &self,
        key: &str,
        claimed: DateTime<Utc>,
        previous: Option<DateTime<Utc>>,
        ttl: Duration,
    ) -> RepoResult<()> {
        let mut conn = self.connection().await?;
        let previous = previous
            .map(|p| p.timestamp_millis().to_string())
            .unwrap_or_default();
        let _: i32 = redis::Script::new(RELEASE_SCRIPT)
            .key(key)
            .arg(claimed.timestamp_millis())
            .arg(previous)
            .arg(ttl_seconds(ttl))
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> RepoResult<()> {
        let mut conn = self.connection().await?;
        let _: i64 = conn.del(key).await?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> RepoResult<()> {
        let mut conn = self.connection().await?;
        let _: bool = conn.expire(key, ttl_seconds(ttl)).await?;
        Ok(())
    }

    async fn push_history(&self, key: &str, entry: &str, ttl: Duration) -> RepoResult<()> {
        let mut conn = self.connection().await?;
        let _: () = redis::pipe()
            .atomic()
            .rpush(key, entry)
            .ignore()
            .expire(key, ttl_seconds(ttl))
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn history(&self, key: &str) -> RepoResult<Vec<String>> {
        let mut conn = self.connection().await?;
        let entries: Vec<String> = conn.lrange(key, 0, -1).await?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamps_are_epoch_millis() {
        let at = Utc.timestamp_millis_opt(1_760_000_000_123).unwrap();
        assert_eq!(from_millis("1760000000123").unwrap(), at);
        assert!(matches!(from_millis("yesterday"), Err(StoreError::Decode(_))));
    }

    #[test]
    fn test_ttl_never_rounds_to_zero() {
        assert_eq!(ttl_seconds(Duration::milliseconds(200)), 1);
        assert_eq!(ttl_seconds(Duration::hours(24)), 86_400);
    }
}
