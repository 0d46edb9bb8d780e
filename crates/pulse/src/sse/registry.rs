use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

use super::stream::{SseChannel, SseEvent};

/// Keyed by (client-ip, id). `id` is a monotonic per-registry counter rather
/// than a literal nanosecond timestamp: both are just uniqueness tie-breakers
/// for clients sharing an IP, and the counter keeps registry tests
/// deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId {
	pub ip: IpAddr,
	pub id: u64,
}

/// Registry of live SSE clients supporting broadcast-to-all and targeted
/// removal (spec.md §4.10).
pub struct SseRegistry {
	clients: RwLock<HashMap<ClientId, SseChannel>>,
	next_id: AtomicU64,
}

impl Default for SseRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl SseRegistry {
	pub fn new() -> Self {
		Self {
			clients: RwLock::new(HashMap::new()),
			next_id: AtomicU64::new(0),
		}
	}

	pub async fn register(&self, ip: IpAddr, channel: SseChannel) -> ClientId {
		let id = ClientId {
			ip,
			id: self.next_id.fetch_add(1, Ordering::Relaxed),
		};
		self.clients.write().await.insert(id, channel);
		id
	}

	pub async fn remove(&self, id: ClientId) -> bool {
		self.clients.write().await.remove(&id).is_some()
	}

	/// Broadcasts to every registered client, pruning any that turn out to
	/// be disconnected as a side effect.
	pub async fn broadcast(&self, event: SseEvent) {
		let snapshot: Vec<(ClientId, SseChannel)> =
			self.clients.read().await.iter().map(|(id, channel)| (*id, channel.clone())).collect();

		let mut dead = Vec::new();
		for (id, channel) in snapshot {
			if !channel.send(event.clone()).await {
				dead.push(id);
			}
		}
		if !dead.is_empty() {
			let mut write = self.clients.write().await;
			for id in dead {
				write.remove(&id);
			}
		}
	}

	pub async fn len(&self) -> usize {
		self.clients.read().await.len()
	}
}

#[cfg(test)]
mod tests {
	use std::net::{IpAddr, Ipv4Addr};

	use super::*;

	fn ip() -> IpAddr {
		IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
	}

	#[tokio::test]
	async fn same_ip_gets_distinct_client_ids() {
		let registry = SseRegistry::new();
		let (c1, _r1) = SseChannel::new(4);
		let (c2, _r2) = SseChannel::new(4);
		let id1 = registry.register(ip(), c1).await;
		let id2 = registry.register(ip(), c2).await;
		assert_ne!(id1, id2);
		assert_eq!(registry.len().await, 2);
	}

	#[tokio::test]
	async fn broadcast_reaches_every_registered_client() {
		let registry = SseRegistry::new();
		let (c1, mut r1) = SseChannel::new(4);
		let (c2, mut r2) = SseChannel::new(4);
		registry.register(ip(), c1).await;
		registry.register(ip(), c2).await;

		registry.broadcast(SseEvent::Done).await;

		assert!(matches!(r1.recv().await.unwrap(), SseEvent::Done));
		assert!(matches!(r2.recv().await.unwrap(), SseEvent::Done));
	}

	#[tokio::test]
	async fn broadcast_prunes_disconnected_clients() {
		let registry = SseRegistry::new();
		let (channel, receiver) = SseChannel::new(4);
		registry.register(ip(), channel).await;
		drop(receiver);

		registry.broadcast(SseEvent::Done).await;
		assert_eq!(registry.len().await, 0);
	}

	#[tokio::test]
	async fn targeted_removal_drops_a_single_client() {
		let registry = SseRegistry::new();
		let (c1, _r1) = SseChannel::new(4);
		let id = registry.register(ip(), c1).await;
		assert!(registry.remove(id).await);
		assert!(!registry.remove(id).await);
	}
}
