use std::time::Duration;

use tokio::sync::watch;
use tracing::warn;

/// Cooperative shutdown signal, reimplemented locally in the spirit of the
/// teacher's `agent_core::signal::ShutdownTrigger`/`DrainWatcher` pair.
///
/// The trigger side is held by the binary's main task; the watcher side is
/// cloned into every background task (session sweep, rate-limit reaper,
/// tenant registry shutdown, SSE heartbeats) that must stop promptly.
#[derive(Clone)]
pub struct ShutdownTrigger(watch::Sender<bool>);

#[derive(Clone)]
pub struct DrainWatcher(watch::Receiver<bool>);

pub fn channel() -> (ShutdownTrigger, DrainWatcher) {
	let (tx, rx) = watch::channel(false);
	(ShutdownTrigger(tx), DrainWatcher(rx))
}

impl ShutdownTrigger {
	/// Signal every watcher and return once all have observed the signal, or
	/// `timeout` has elapsed, whichever comes first.
	pub async fn shutdown(self, timeout: Duration) {
		let _ = self.0.send(true);
		if tokio::time::timeout(timeout, self.0.closed()).await.is_err() {
			warn!(?timeout, "shutdown timed out waiting for watchers to drain");
		}
	}
}

impl DrainWatcher {
	pub fn is_draining(&self) -> bool {
		*self.0.borrow()
	}

	/// Resolves once shutdown has been triggered. Cancel-safe: intended for
	/// use in a `tokio::select!` alongside the task's normal work.
	pub async fn signaled(&mut self) {
		// borrow/changed() only resolves on a *new* value; check first in case
		// shutdown already fired before this task started selecting on it.
		if *self.0.borrow() {
			return;
		}
		let _ = self.0.changed().await;
	}
}
