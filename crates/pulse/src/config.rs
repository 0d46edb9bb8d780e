use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Auth subsystem mode (spec.md §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AuthMode {
	Open,
	Basic,
	ApiOnly,
	Oidc {
		issuer: String,
		client_id: String,
		jwks_uri: String,
	},
	Proxy {
		secret_header: String,
		user_header: String,
		role_header: Option<String>,
		admin_roles: Vec<String>,
		#[serde(default = "default_role_separator")]
		role_separator: String,
	},
}

fn default_role_separator() -> String {
	"|".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
	#[serde(default = "default_rl_requests")]
	pub requests: u64,
	#[serde(default = "default_rl_window", with = "humantime_secs")]
	pub window: Duration,
}

fn default_rl_requests() -> u64 {
	2000
}
fn default_rl_window() -> Duration {
	Duration::from_secs(60)
}

impl Default for RateLimitConfig {
	fn default() -> Self {
		Self {
			requests: default_rl_requests(),
			window: default_rl_window(),
		}
	}
}

/// Top-level configuration, loaded from YAML with environment overrides
/// layered on top (grounded on the teacher's layered config + env-var
/// conventions in `pat_global.rs`/`jwt.rs`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
	pub data_dir: PathBuf,
	pub auth: AuthMode,
	#[serde(default)]
	pub rate_limit: RateLimitConfig,
	#[serde(default)]
	pub demo_mode: bool,
	/// Whether an organization loader is configured; when false, the legacy
	/// default org has no membership rules applied (spec.md §4.4).
	#[serde(default)]
	pub organization_loader_configured: bool,
	/// Open Question resolution (spec.md §9 / SPEC_FULL.md §E): whether the
	/// legacy default org enforces membership even when a loader is
	/// configured. Defaults to false (always-allow).
	#[serde(default)]
	pub default_org_strict_membership: bool,
	#[serde(default)]
	pub hosted_mode: bool,
	#[serde(default)]
	pub dev_mode: bool,
}

impl Config {
	pub fn from_env_and_file(path: Option<&std::path::Path>) -> anyhow::Result<Self> {
		let mut cfg: Config = match path {
			Some(p) => {
				let raw = std::fs::read_to_string(p)?;
				serde_yaml::from_str(&raw)?
			},
			None => anyhow::bail!("no config file provided and no default config is embedded"),
		};
		if std::env::var("PULSE_DEV").is_ok() {
			cfg.dev_mode = true;
		}
		if let Ok(v) = std::env::var("PULSE_MULTI_TENANT_ENABLED") {
			set_multi_tenant_enabled(parse_bool_env(&v));
		}
		Ok(cfg)
	}
}

mod humantime_secs {
	use std::time::Duration;

	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
		s.serialize_u64(d.as_secs())
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
		let secs = u64::deserialize(d)?;
		Ok(Duration::from_secs(secs))
	}
}

fn parse_bool_env(v: &str) -> bool {
	matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Two deliberate process-wide knobs (spec.md §9), confined behind setter
/// functions with atomic semantics and never read from a hot path without
/// caching.
static MULTI_TENANT_ENABLED: AtomicBool = AtomicBool::new(false);

pub fn set_multi_tenant_enabled(enabled: bool) {
	MULTI_TENANT_ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn multi_tenant_enabled() -> bool {
	MULTI_TENANT_ENABLED.load(Ordering::Relaxed)
}

/// Whether the mock/Docker-updater flag is honored this run. `spec.md` §9
/// leaves this an open question for production builds; we refuse it unless
/// dev mode is also set, and log the decision (SPEC_FULL.md §E).
pub fn docker_updates_allowed(cfg: &Config) -> bool {
	let requested = std::env::var("PULSE_ALLOW_DOCKER_UPDATES")
		.map(|v| parse_bool_env(&v))
		.unwrap_or(false);
	if requested && !cfg.dev_mode {
		tracing::warn!(
			"PULSE_ALLOW_DOCKER_UPDATES set without PULSE_DEV; refusing to enable the mock updater"
		);
		return false;
	}
	requested
}

pub type SharedConfig = Arc<Config>;
