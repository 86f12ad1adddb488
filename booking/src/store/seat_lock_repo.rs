//! Advisory per-seat locks in Redis.
//!
//! Every entry maps `seat:lock:<flight>:<seat>` to the owning order id with a
//! TTL. Delete and expire are owner-scoped Lua scripts so a crashed worker's
//! retry can never touch another order's hold. Acquisition is two round
//! trips (read-verify, then write); the authoritative admission gate is the
//! conditional seat-row update in the relational store.

use std::collections::HashMap;
use std::time::Duration;

use redis::{AsyncCommands, Script};

use crate::domain::DomainError;

use super::StoreError;

const RELEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

const EXTEND_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("pexpire", KEYS[1], ARGV[2])
else
    return 0
end
"#;

pub struct SeatLockRepo {
    client: redis::Client,
    release: Script,
    extend: Script,
}

fn lock_key(flight_id: &str, seat_id: &str) -> String {
    format!("seat:lock:{flight_id}:{seat_id}")
}

impl SeatLockRepo {
    pub fn new(client: redis::Client) -> Self {
        Self {
            client,
            release: Script::new(RELEASE_SCRIPT),
            extend: Script::new(EXTEND_SCRIPT),
        }
    }

    /// Acquire all seats for `order_id`, failing if any seat is held by a
    /// different order. Re-locking seats already held by the same order is a
    /// TTL refresh.
    pub async fn lock_seats(
        &self,
        flight_id: &str,
        seat_ids: &[String],
        order_id: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        if seat_ids.is_empty() {
            return Ok(());
        }
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let keys: Vec<String> = seat_ids.iter().map(|s| lock_key(flight_id, s)).collect();

        let owners: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await?;
        for (seat_id, owner) in seat_ids.iter().zip(owners) {
            if let Some(owner) = owner {
                if owner != order_id {
                    return Err(DomainError::SeatAlreadyLocked {
                        seat: seat_id.clone(),
                        owner,
                    }
                    .into());
                }
            }
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for key in &keys {
            pipe.set_ex(key, order_id, ttl.as_secs());
        }
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    /// Compare-and-delete every entry owned by `order_id`. Missing or foreign
    /// entries are silently skipped.
    pub async fn release_locks(
        &self,
        flight_id: &str,
        seat_ids: &[String],
        order_id: &str,
    ) -> Result<(), StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        for seat_id in seat_ids {
            let _deleted: i64 = self
                .release
                .key(lock_key(flight_id, seat_id))
                .arg(order_id)
                .invoke_async(&mut conn)
                .await?;
        }
        Ok(())
    }

    /// Compare-and-expire: bump the TTL of every entry owned by `order_id`.
    pub async fn extend_locks(
        &self,
        flight_id: &str,
        seat_ids: &[String],
        order_id: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        for seat_id in seat_ids {
            let _extended: i64 = self
                .extend
                .key(lock_key(flight_id, seat_id))
                .arg(order_id)
                .arg(ttl.as_millis() as u64)
                .invoke_async(&mut conn)
                .await?;
        }
        Ok(())
    }

    /// Enumerate all lock entries for a flight: seat id -> owning order id.
    /// Diagnostic path used by the reconciler.
    pub async fn locked_seats(
        &self,
        flight_id: &str,
    ) -> Result<HashMap<String, String>, StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let prefix = format!("seat:lock:{flight_id}:");
        let keys: Vec<String> = conn.keys(format!("{prefix}*")).await?;
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let owners: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await?;

        let mut locks = HashMap::new();
        for (key, owner) in keys.iter().zip(owners) {
            // Entries can expire between KEYS and MGET.
            if let Some(owner) = owner {
                locks.insert(key[prefix.len()..].to_string(), owner);
            }
        }
        Ok(locks)
    }
}
