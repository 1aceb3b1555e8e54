//! Atomic primitives (spec.md §4.5) plus the named helpers built on top of
//! them for every coordination use in §4.8/§4.9/§4.10/§4.12: group
//! idempotency, webhook/click dedup, and the MessageBird MCC/rate caches.

use crate::pool::KvPool;
use redis::AsyncCommands;
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("redis pool error: {0}")]
    Pool(#[from] deadpool::managed::PoolError<redis::RedisError>),
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

async fn conn(pool: &KvPool) -> Result<deadpool::managed::Object<crate::pool::ClientManager>, KvError> {
    Ok(pool.get().await?)
}

pub async fn incr(pool: &KvPool, key: &str) -> Result<i64, KvError> {
    let mut c = conn(pool).await?;
    Ok(c.incr(key, 1).await?)
}

pub async fn expire(pool: &KvPool, key: &str, seconds: i64) -> Result<(), KvError> {
    let mut c = conn(pool).await?;
    let _: () = c.expire(key, seconds).await?;
    Ok(())
}

pub async fn get(pool: &KvPool, key: &str) -> Result<Option<String>, KvError> {
    let mut c = conn(pool).await?;
    Ok(c.get(key).await?)
}

pub async fn set(pool: &KvPool, key: &str, value: &str) -> Result<(), KvError> {
    let mut c = conn(pool).await?;
    let _: () = c.set(key, value).await?;
    Ok(())
}

pub async fn setex(pool: &KvPool, key: &str, seconds: i64, value: &str) -> Result<(), KvError> {
    let mut c = conn(pool).await?;
    let _: () = c.set_ex(key, value, seconds as u64).await?;
    Ok(())
}

pub async fn hset(pool: &KvPool, key: &str, field: &str, value: &str) -> Result<(), KvError> {
    let mut c = conn(pool).await?;
    let _: () = c.hset(key, field, value).await?;
    Ok(())
}

pub async fn hget_all(pool: &KvPool, key: &str) -> Result<HashMap<String, String>, KvError> {
    let mut c = conn(pool).await?;
    Ok(c.hgetall(key).await?)
}

pub async fn lpush(pool: &KvPool, key: &str, value: &str) -> Result<(), KvError> {
    let mut c = conn(pool).await?;
    let _: () = c.lpush(key, value).await?;
    Ok(())
}

pub async fn rpop(pool: &KvPool, key: &str) -> Result<Option<String>, KvError> {
    let mut c = conn(pool).await?;
    Ok(c.rpop(key, None).await?)
}

/// Admission algorithm steps 1-2 (spec.md §4.8): `INCR group:<uid>`, true
/// if this caller won the race, then `EXPIRE 86400` regardless so the key
/// doesn't linger past a day.
pub async fn claim_group(pool: &KvPool, uid: &str) -> Result<bool, KvError> {
    let key = format!("group:{uid}");
    let count = incr(pool, &key).await?;
    expire(pool, &key, 86_400).await?;
    Ok(count == 1)
}

/// Webhook dedup (spec.md §4.10 step 1): `INCR event-<ref>`, true if this
/// is the first delivery.
pub async fn claim_webhook_event(pool: &KvPool, ref_key: &str) -> Result<bool, KvError> {
    let key = format!("event-{ref_key}");
    let count = incr(pool, &key).await?;
    expire(pool, &key, 86_400).await?;
    Ok(count == 1)
}

/// Click dedup (spec.md §4.12): `INCR click-<link_id>-<ip>`, true if this
/// is the first click within the 60s window.
pub async fn claim_click(pool: &KvPool, link_id: i64, ip: &str) -> Result<bool, KvError> {
    let key = format!("click-{link_id}-{ip}");
    let count = incr(pool, &key).await?;
    if count == 1 {
        expire(pool, &key, 60).await?;
    }
    Ok(count == 1)
}

/// Cached MCC for a country code, set once an HLR lookup resolves it
/// (spec.md §4.9 step 5, cached for one year).
pub async fn get_messagebird_mcc(pool: &KvPool, country_code: &str) -> Result<Option<String>, KvError> {
    get(pool, &format!("messagebird-cc:{country_code}")).await
}

pub async fn set_messagebird_mcc(pool: &KvPool, country_code: &str, mcc: &str) -> Result<(), KvError> {
    setex(pool, &format!("messagebird-cc:{country_code}"), 365 * 86_400, mcc).await
}

/// Per-MCC outbound SMS rate table, refreshed from the provider every 24h
/// and read back as a hash (spec.md §4.9 step 5).
pub async fn get_messagebird_rates(pool: &KvPool) -> Result<HashMap<String, String>, KvError> {
    hget_all(pool, "messagebird-rates").await
}

pub async fn set_messagebird_rate(pool: &KvPool, mcc: &str, rate: &str) -> Result<(), KvError> {
    hset(pool, "messagebird-rates", mcc, rate).await
}

#[cfg(test)]
mod test {
    // Exercising these helpers needs a live Redis instance; integration
    // coverage lives alongside the worker crate's job tests, which run
    // against a throwaway Redis container.
}
