use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{OnceCell, RwLock};

/// The per-tenant monitor; Pulse only needs to be able to close it down.
/// Its actual polling/state-machine internals are a domain collaborator
/// outside this crate.
#[async_trait]
pub trait Monitor: Send + Sync {
	async fn close(&self) -> anyhow::Result<()>;
}

/// Per-tenant persistence handle. Opaque here; constructed first so the
/// monitor and AI service can be wired against it (spec.md §4.6 construction
/// order).
pub trait Persistence: Send + Sync {}

/// The per-tenant AI service; only its stop lifecycle matters to the
/// registry.
#[async_trait]
pub trait AiService: Send + Sync {
	async fn stop(&self) -> anyhow::Result<()>;
}

#[async_trait]
pub trait TenantServiceFactory: Send + Sync {
	async fn construct(&self, org_id: &str) -> anyhow::Result<TenantServices>;
}

#[derive(Clone)]
pub struct TenantServices {
	pub monitor: Arc<dyn Monitor>,
	pub persistence: Arc<dyn Persistence>,
	pub ai_service: Arc<dyn AiService>,
}

/// C6 Tenant Service Registry: a map of org-id to {monitor, persistence,
/// ai-service}, built with double-checked locking so concurrent `Get`s for
/// the same org-id construct the triple at most once (Invariant I4).
///
/// A per-entry `OnceCell` is the double-check: the outer `RwLock` only
/// guards the map's shape (insert/remove), never the (possibly slow)
/// construction itself, so unrelated orgs never block on each other.
pub struct TenantServiceRegistry<F: TenantServiceFactory> {
	entries: RwLock<HashMap<String, Arc<OnceCell<TenantServices>>>>,
	factory: F,
}

impl<F: TenantServiceFactory> TenantServiceRegistry<F> {
	pub fn new(factory: F) -> Self {
		Self {
			entries: RwLock::new(HashMap::new()),
			factory,
		}
	}

	/// Returns the existing triple for `org_id`, or constructs it. On
	/// construction failure the entry is evicted so the next call retries
	/// instead of caching the failure (spec.md §4.6).
	pub async fn get(&self, org_id: &str) -> anyhow::Result<TenantServices> {
		let cell = {
			let read = self.entries.read().await;
			if let Some(cell) = read.get(org_id) {
				cell.clone()
			} else {
				drop(read);
				let mut write = self.entries.write().await;
				write.entry(org_id.to_string()).or_insert_with(|| Arc::new(OnceCell::new())).clone()
			}
		};

		let init_result = cell.get_or_try_init(|| async { self.factory.construct(org_id).await }).await;

		match init_result {
			Ok(services) => Ok(services.clone()),
			Err(err) => {
				let mut write = self.entries.write().await;
				write.remove(org_id);
				Err(err)
			},
		}
	}

	/// Stops and removes the entry for `org_id`, if present. Idempotent:
	/// removing an absent org-id is a no-op, not an error.
	pub async fn remove(&self, org_id: &str) -> bool {
		let cell = {
			let mut write = self.entries.write().await;
			write.remove(org_id)
		};
		let Some(cell) = cell else {
			return false;
		};
		if let Some(services) = cell.get() {
			if let Err(err) = services.ai_service.stop().await {
				tracing::warn!(org_id, error = %err, "error stopping ai service during tenant offboard");
			}
			if let Err(err) = services.monitor.close().await {
				tracing::warn!(org_id, error = %err, "error closing monitor during tenant offboard");
			}
		}
		true
	}

	/// Stops every constructed tenant service with a bounded deadline per
	/// service, logging (not propagating) timeouts so one stuck tenant never
	/// blocks the rest of shutdown.
	pub async fn shutdown(&self, per_service_timeout: Duration) {
		let org_ids: Vec<String> = self.entries.read().await.keys().cloned().collect();
		for org_id in org_ids {
			let outcome = tokio::time::timeout(per_service_timeout, self.remove(&org_id)).await;
			if outcome.is_err() {
				tracing::warn!(org_id, ?per_service_timeout, "tenant service shutdown timed out");
			}
		}
	}

	#[cfg(test)]
	pub async fn len(&self) -> usize {
		self.entries.read().await.len()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::*;

	struct NoopMonitor;
	#[async_trait]
	impl Monitor for NoopMonitor {
		async fn close(&self) -> anyhow::Result<()> {
			Ok(())
		}
	}

	struct NoopPersistence;
	impl Persistence for NoopPersistence {}

	struct NoopAiService;
	#[async_trait]
	impl AiService for NoopAiService {
		async fn stop(&self) -> anyhow::Result<()> {
			Ok(())
		}
	}

	struct CountingFactory {
		constructions: Arc<AtomicUsize>,
		fail_first_n: Arc<AtomicUsize>,
	}

	#[async_trait]
	impl TenantServiceFactory for CountingFactory {
		async fn construct(&self, _org_id: &str) -> anyhow::Result<TenantServices> {
			self.constructions.fetch_add(1, Ordering::SeqCst);
			if self.fail_first_n.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n > 0).then_some(n - 1)).is_ok() {
				anyhow::bail!("simulated construction failure");
			}
			Ok(TenantServices {
				monitor: Arc::new(NoopMonitor),
				persistence: Arc::new(NoopPersistence),
				ai_service: Arc::new(NoopAiService),
			})
		}
	}

	#[tokio::test]
	async fn concurrent_get_constructs_at_most_once() {
		let constructions = Arc::new(AtomicUsize::new(0));
		let registry = Arc::new(TenantServiceRegistry::new(CountingFactory {
			constructions: constructions.clone(),
			fail_first_n: Arc::new(AtomicUsize::new(0)),
		}));

		let mut handles = Vec::new();
		for _ in 0..16 {
			let registry = registry.clone();
			handles.push(tokio::spawn(async move { registry.get("acme").await }));
		}
		for handle in handles {
			handle.await.unwrap().unwrap();
		}

		assert_eq!(constructions.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn failed_construction_is_not_cached_and_retries() {
		let constructions = Arc::new(AtomicUsize::new(0));
		let registry = TenantServiceRegistry::new(CountingFactory {
			constructions: constructions.clone(),
			fail_first_n: Arc::new(AtomicUsize::new(1)),
		});

		assert!(registry.get("acme").await.is_err());
		assert_eq!(registry.len().await, 0);
		assert!(registry.get("acme").await.is_ok());
		assert_eq!(constructions.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn remove_is_idempotent() {
		let registry = TenantServiceRegistry::new(CountingFactory {
			constructions: Arc::new(AtomicUsize::new(0)),
			fail_first_n: Arc::new(AtomicUsize::new(0)),
		});
		registry.get("acme").await.unwrap();
		assert!(registry.remove("acme").await);
		assert!(!registry.remove("acme").await);
	}

	#[tokio::test]
	async fn shutdown_drains_all_entries() {
		let registry = TenantServiceRegistry::new(CountingFactory {
			constructions: Arc::new(AtomicUsize::new(0)),
			fail_first_n: Arc::new(AtomicUsize::new(0)),
		});
		registry.get("acme").await.unwrap();
		registry.get("beta").await.unwrap();
		registry.shutdown(Duration::from_secs(1)).await;
		assert_eq!(registry.len().await, 0);
	}
}
