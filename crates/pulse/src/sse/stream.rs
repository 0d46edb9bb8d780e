use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::response::sse::Event;
use tokio::sync::mpsc;

/// The two explicit event types of spec.md §4.10, plus the heartbeat
/// comment line, which is not part of the producer-facing contract.
#[derive(Debug, Clone)]
pub enum SseEvent {
	Data(serde_json::Value),
	Done,
	Error(String),
	Heartbeat,
}

impl SseEvent {
	pub fn into_axum_event(self) -> Event {
		match self {
			SseEvent::Data(value) => Event::default().event("data").data(value.to_string()),
			SseEvent::Done => Event::default().event("done").data(""),
			SseEvent::Error(message) => Event::default()
				.event("error")
				.data(serde_json::json!({"type": "error", "data": message}).to_string()),
			SseEvent::Heartbeat => Event::default().comment("heartbeat"),
		}
	}
}

/// Producer-facing handle for a single SSE stream. Every send observes a
/// 10-second write deadline; a timed-out or closed send sets `disconnected`
/// permanently and all further sends are suppressed without error (spec.md
/// §4.10/§5 cancellation semantics).
#[derive(Clone)]
pub struct SseChannel {
	sender: mpsc::Sender<SseEvent>,
	disconnected: Arc<AtomicBool>,
}

const WRITE_DEADLINE: Duration = Duration::from_secs(10);

impl SseChannel {
	pub fn new(buffer: usize) -> (Self, mpsc::Receiver<SseEvent>) {
		let (sender, receiver) = mpsc::channel(buffer);
		(
			Self {
				sender,
				disconnected: Arc::new(AtomicBool::new(false)),
			},
			receiver,
		)
	}

	pub fn is_disconnected(&self) -> bool {
		self.disconnected.load(Ordering::Acquire)
	}

	/// Returns `true` if the event was delivered. A disconnected channel
	/// silently drops the event rather than erroring - callers are not
	/// expected to retry individual SSE writes.
	pub async fn send(&self, event: SseEvent) -> bool {
		if self.is_disconnected() {
			return false;
		}
		match tokio::time::timeout(WRITE_DEADLINE, self.sender.send(event)).await {
			Ok(Ok(())) => true,
			_ => {
				self.disconnected.store(true, Ordering::Release);
				false
			},
		}
	}

	/// Spawns the 5-second heartbeat loop. Stops as soon as a heartbeat
	/// write fails or the producer signals it is finished.
	pub fn spawn_heartbeat(&self, mut finished: tokio::sync::watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
		let channel = self.clone();
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(Duration::from_secs(5));
			loop {
				tokio::select! {
					_ = ticker.tick() => {
						if !channel.send(SseEvent::Heartbeat).await {
							break;
						}
					}
					_ = finished.changed() => {
						break;
					}
				}
			}
		})
	}
}
