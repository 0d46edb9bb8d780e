use std::sync::Arc;

use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::Histogram;
use prometheus_client::registry::Registry;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

/// Initializes the global `tracing` subscriber.
///
/// Mirrors the teacher's `telemetry::log` setup: an `EnvFilter` read from
/// `RUST_LOG` (defaulting to `info`), JSON output in production, pretty
/// output when `PULSE_DEV=1`. Call this exactly once, from `pulse-app`'s
/// `main`.
pub fn init_logging(dev_mode: bool) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	let subscriber = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_span_events(FmtSpan::CLOSE);
	if dev_mode {
		subscriber.pretty().init();
	} else {
		subscriber.json().flatten_event(true).init();
	}
}

#[derive(Clone, Hash, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct RouteLabel {
	pub route: String,
	pub method: String,
	pub status_class: String,
}

/// Process-wide request metrics, registered once at startup and cloned (cheaply,
/// it's all `Arc` internally) into every middleware that needs to record.
#[derive(Clone, Debug)]
pub struct Metrics {
	pub requests_total: Family<RouteLabel, Counter>,
	pub request_duration_seconds: Family<RouteLabel, Histogram>,
	pub rate_limited_total: Counter,
	pub demo_mode_rejections_total: Counter,
	pub sse_streams_active: Family<SseStreamLabel, Counter>,
}

#[derive(Clone, Hash, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct SseStreamLabel {
	pub kind: String,
}

impl Metrics {
	pub fn new(registry: &mut Registry) -> Self {
		let requests_total = Family::<RouteLabel, Counter>::default();
		let request_duration_seconds =
			Family::<RouteLabel, Histogram>::new_with_constructor(|| {
				Histogram::new([0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0].into_iter())
			});
		let rate_limited_total = Counter::default();
		let demo_mode_rejections_total = Counter::default();
		let sse_streams_active = Family::<SseStreamLabel, Counter>::default();

		registry.register("pulse_requests", "Total HTTP requests", requests_total.clone());
		registry.register(
			"pulse_request_duration_seconds",
			"HTTP request duration",
			request_duration_seconds.clone(),
		);
		registry.register(
			"pulse_rate_limited",
			"Requests rejected by the tenant rate limiter",
			rate_limited_total.clone(),
		);
		registry.register(
			"pulse_demo_mode_rejections",
			"Mutating requests rejected by the demo mode gate",
			demo_mode_rejections_total.clone(),
		);
		registry.register(
			"pulse_sse_streams_started",
			"SSE streams opened, by kind",
			sse_streams_active.clone(),
		);

		Metrics {
			requests_total,
			request_duration_seconds,
			rate_limited_total,
			demo_mode_rejections_total,
			sse_streams_active,
		}
	}
}

/// Renders the registry in Prometheus text exposition format, for the admin `/metrics` route.
pub fn encode_registry(registry: &Registry) -> anyhow::Result<String> {
	let mut buf = String::new();
	encode(&mut buf, registry)?;
	Ok(buf)
}

pub fn new_registry() -> (Registry, Arc<Metrics>) {
	let mut registry = Registry::default();
	let metrics = Arc::new(Metrics::new(&mut registry));
	(registry, metrics)
}
