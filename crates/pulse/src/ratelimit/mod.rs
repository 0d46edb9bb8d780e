//! C9 Tenant Rate Limiter: per-org token bucket with a lock-free fast path.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::config::RateLimitConfig;
use crate::error::CoreError;
use crate::org::DEFAULT_ORG_ID;

/// A single org's bucket. Refilled lazily on access rather than by a ticking
/// task, so the fast path never takes a timer or a lock beyond the map
/// lookup (spec.md §4.9/§5).
struct Bucket {
	tokens: AtomicI64,
	last_refill_millis: AtomicI64,
	last_access_millis: AtomicI64,
}

impl Bucket {
	fn new(capacity: u64, now: DateTime<Utc>) -> Self {
		Self {
			tokens: AtomicI64::new(capacity as i64),
			last_refill_millis: AtomicI64::new(now.timestamp_millis()),
			last_access_millis: AtomicI64::new(now.timestamp_millis()),
		}
	}

	/// Refills proportionally to elapsed time, then attempts to take one
	/// token. Returns `(allowed, remaining)`.
	fn try_acquire(&self, capacity: u64, window: Duration, now: DateTime<Utc>) -> (bool, i64) {
		let now_millis = now.timestamp_millis();
		self.last_access_millis.store(now_millis, Ordering::Relaxed);

		let last_refill = self.last_refill_millis.load(Ordering::Relaxed);
		let elapsed_millis = (now_millis - last_refill).max(0) as u64;
		if elapsed_millis > 0 && window.as_millis() > 0 {
			let refill = (elapsed_millis as u128 * capacity as u128 / window.as_millis().max(1)) as i64;
			if refill > 0 {
				self.tokens.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |t| Some((t + refill).min(capacity as i64))).ok();
				self.last_refill_millis.store(now_millis, Ordering::Relaxed);
			}
		}

		let prev = self.tokens.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |t| if t > 0 { Some(t - 1) } else { None });
		match prev {
			Ok(p) => (true, p - 1),
			Err(t) => (false, t),
		}
	}

	fn idle_for(&self, now: DateTime<Utc>) -> Duration {
		let last = self.last_access_millis.load(Ordering::Relaxed);
		Duration::from_millis((now.timestamp_millis() - last).max(0) as u64)
	}
}

/// `Get(orgId)`-style map of buckets, one read-write lock outer + atomic
/// inner counters per spec.md §5's shared-resource policy.
pub struct TenantRateLimiter {
	buckets: RwLock<HashMap<String, Arc<Bucket>>>,
	config: RateLimitConfig,
	denied_total: AtomicU64,
}

impl TenantRateLimiter {
	pub fn new(config: RateLimitConfig) -> Self {
		Self {
			buckets: RwLock::new(HashMap::new()),
			config,
			denied_total: AtomicU64::new(0),
		}
	}

	/// The default org is exempt from rate limiting entirely (Invariant I7).
	pub async fn check(&self, org_id: &str, now: DateTime<Utc>) -> Result<(), CoreError> {
		if org_id == DEFAULT_ORG_ID {
			return Ok(());
		}

		let bucket = {
			let read = self.buckets.read().await;
			if let Some(bucket) = read.get(org_id) {
				bucket.clone()
			} else {
				drop(read);
				let mut write = self.buckets.write().await;
				write
					.entry(org_id.to_string())
					.or_insert_with(|| Arc::new(Bucket::new(self.config.requests, now)))
					.clone()
			}
		};

		let (allowed, _remaining) = bucket.try_acquire(self.config.requests, self.config.window, now);
		if allowed {
			Ok(())
		} else {
			self.denied_total.fetch_add(1, Ordering::Relaxed);
			Err(CoreError::RateLimited {
				retry_after_secs: self.config.window.as_secs().max(1),
				limit: self.config.requests,
				org_id: org_id.to_string(),
			})
		}
	}

	/// Evicts buckets idle for longer than `idle_after`. The spec's default
	/// is 10 minutes (spec.md §4.9).
	pub async fn reap_idle(&self, idle_after: Duration, now: DateTime<Utc>) -> usize {
		let mut write = self.buckets.write().await;
		let before = write.len();
		write.retain(|_, bucket| bucket.idle_for(now) < idle_after);
		before - write.len()
	}

	pub fn denied_total(&self) -> u64 {
		self.denied_total.load(Ordering::Relaxed)
	}

	pub fn spawn_reaper(self: Arc<Self>, interval: Duration, idle_after: Duration, mut drain: pulse_core::shutdown::DrainWatcher) -> tokio::task::JoinHandle<()> {
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);
			loop {
				tokio::select! {
					_ = ticker.tick() => {
						let removed = self.reap_idle(idle_after, Utc::now()).await;
						if removed > 0 {
							tracing::debug!(removed, "reaped idle rate-limit buckets");
						}
					}
					_ = drain.signaled() => {
						tracing::info!("rate-limit reaper stopping");
						break;
					}
				}
			}
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn cfg(requests: u64, window_secs: u64) -> RateLimitConfig {
		RateLimitConfig {
			requests,
			window: Duration::from_secs(window_secs),
		}
	}

	#[tokio::test]
	async fn default_org_is_always_exempt() {
		let limiter = TenantRateLimiter::new(cfg(1, 60));
		let now = Utc::now();
		for _ in 0..10 {
			assert!(limiter.check(DEFAULT_ORG_ID, now).await.is_ok());
		}
	}

	#[tokio::test]
	async fn bucket_denies_once_exhausted() {
		let limiter = TenantRateLimiter::new(cfg(2, 60));
		let now = Utc::now();
		assert!(limiter.check("acme", now).await.is_ok());
		assert!(limiter.check("acme", now).await.is_ok());
		let err = limiter.check("acme", now).await.unwrap_err();
		assert!(matches!(err, CoreError::RateLimited { limit: 2, .. }));
		assert_eq!(limiter.denied_total(), 1);
	}

	#[tokio::test]
	async fn bucket_refills_after_the_window_elapses() {
		let limiter = TenantRateLimiter::new(cfg(1, 60));
		let now = Utc::now();
		assert!(limiter.check("acme", now).await.is_ok());
		assert!(limiter.check("acme", now).await.is_err());
		assert!(limiter.check("acme", now + chrono::Duration::seconds(61)).await.is_ok());
	}

	#[tokio::test]
	async fn idle_buckets_are_reaped() {
		let limiter = TenantRateLimiter::new(cfg(10, 60));
		let now = Utc::now();
		limiter.check("acme", now).await.unwrap();
		let removed = limiter.reap_idle(Duration::from_secs(600), now + chrono::Duration::seconds(601)).await;
		assert_eq!(removed, 1);
	}

	#[tokio::test]
	async fn distinct_orgs_have_independent_buckets() {
		let limiter = TenantRateLimiter::new(cfg(1, 60));
		let now = Utc::now();
		assert!(limiter.check("acme", now).await.is_ok());
		assert!(limiter.check("beta", now).await.is_ok());
	}
}
