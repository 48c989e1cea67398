//! Daily free-usage quota and license keys
//!
//! Counters are keyed by client id and UTC date, so every client gets a fresh
//! allowance at midnight UTC. Entries expire from the cache a day after they
//! were written.
//!
//! A request takes a slot with [`QuotaTracker::reserve`] before it calls any
//! remote service. The slot goes back when the reservation is dropped without
//! [`QuotaReservation::commit`], so only successful generations are counted.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use moka::future::Cache;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::ApiError;
use crate::services::credential_pool::SecretString;

pub const DEFAULT_FREE_DAILY_LIMIT: u32 = 5;

/// Plan the caller is on for this request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    Free,
    Pro,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
        }
    }
}

/// Tracks free usage per client and recognises license keys
#[derive(Clone)]
pub struct QuotaTracker {
    daily_limit: u32,
    license_keys: Arc<HashSet<String>>,
    counters: Cache<String, Arc<AtomicU32>>,
}

impl std::fmt::Debug for QuotaTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaTracker")
            .field("daily_limit", &self.daily_limit)
            .field("license_keys", &self.license_keys.len())
            .field("tracked_clients", &self.counters.entry_count())
            .finish()
    }
}

impl QuotaTracker {
    pub fn new(daily_limit: u32, license_keys: &[SecretString]) -> Self {
        let counters = Cache::builder()
            .max_capacity(100_000)
            .time_to_live(Duration::from_secs(24 * 60 * 60))
            .build();

        Self {
            daily_limit,
            license_keys: Arc::new(
                license_keys
                    .iter()
                    .map(|key| key.expose().trim().to_string())
                    .filter(|key| !key.is_empty())
                    .collect(),
            ),
            counters,
        }
    }

    /// Whether `key` is one of the configured license keys
    pub fn verify_license(&self, key: &str) -> bool {
        let key = key.trim();
        !key.is_empty() && self.license_keys.contains(key)
    }

    /// Plan for a request carrying an optional license key
    pub fn plan_for(&self, license_key: Option<&str>) -> Plan {
        match license_key {
            Some(key) if self.verify_license(key) => Plan::Pro,
            _ => Plan::Free,
        }
    }

    /// Take one free slot for `client_id`, or fail with `QuotaExceeded`
    ///
    /// Pro requests are not metered and get `None`.
    pub async fn reserve(
        &self,
        client_id: &str,
        plan: Plan,
    ) -> Result<Option<QuotaReservation>, ApiError> {
        self.reserve_at(client_id, plan, Utc::now()).await
    }

    async fn reserve_at(
        &self,
        client_id: &str,
        plan: Plan,
        now: DateTime<Utc>,
    ) -> Result<Option<QuotaReservation>, ApiError> {
        if plan == Plan::Pro {
            return Ok(None);
        }

        let counter = self
            .counters
            .get_with(counter_key(client_id, now), async { Arc::new(AtomicU32::new(0)) })
            .await;

        let used = counter.fetch_add(1, Ordering::SeqCst);
        if used >= self.daily_limit {
            counter.fetch_sub(1, Ordering::SeqCst);
            tracing::info!(
                client_id = %client_id,
                used = used,
                limit = self.daily_limit,
                "Free daily quota exhausted"
            );
            return Err(ApiError::QuotaExceeded {
                limit: self.daily_limit,
                retry_after_seconds: seconds_until_utc_midnight(now),
            });
        }

        tracing::debug!(client_id = %client_id, used = used + 1, "Reserved free usage");

        Ok(Some(QuotaReservation {
            counter,
            limit: self.daily_limit,
            committed: false,
        }))
    }

    #[cfg(test)]
    async fn used_at(&self, client_id: &str, now: DateTime<Utc>) -> u32 {
        self.counters
            .get(&counter_key(client_id, now))
            .await
            .map_or(0, |counter| counter.load(Ordering::SeqCst))
    }
}

/// One free slot held by an in-flight request
///
/// Dropping it without [`commit`](Self::commit) returns the slot.
#[derive(Debug)]
pub struct QuotaReservation {
    counter: Arc<AtomicU32>,
    limit: u32,
    committed: bool,
}

impl QuotaReservation {
    /// Keep the slot and return the free generations left today
    pub fn commit(mut self) -> u32 {
        self.committed = true;
        self.limit.saturating_sub(self.counter.load(Ordering::SeqCst))
    }
}

impl Drop for QuotaReservation {
    fn drop(&mut self) {
        if !self.committed {
            self.counter.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

fn counter_key(client_id: &str, now: DateTime<Utc>) -> String {
    format!("{}:{}", client_id, now.date_naive())
}

/// Seconds from `now` until the next UTC midnight, at least 1
pub fn seconds_until_utc_midnight(now: DateTime<Utc>) -> u64 {
    let tomorrow = now.date_naive() + ChronoDuration::days(1);
    let midnight = tomorrow.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    midnight
        .map(|m| (m - now).num_seconds().max(1) as u64)
        .unwrap_or(1)
}
