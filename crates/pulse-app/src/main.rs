mod admin;
mod entitlement_store;
mod fs_org_directory;
mod middleware;
mod routes;
mod sources;
mod state;
mod tenant_factory;

mod cli;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use jsonwebtoken::jwk::JwkSet;
use pulse::authn::oidc::JwksValidator;
use pulse::config::{AuthMode, Config, SharedConfig};
use pulse::ratelimit::TenantRateLimiter;
use pulse::session::SessionStore;
use pulse::sse::SseRegistry;
use pulse::tenant::registry::TenantServiceRegistry;
use pulse_core::clock::SystemClock;

use cli::{Args, Command};
use entitlement_store::OrgEntitlementStore;
use fs_org_directory::FsOrgDirectory;
use sources::AppPrincipalSources;
use state::AppState;
use tenant_factory::FsTenantServiceFactory;

/// OIDC JWKS is fetched once at startup; a production deployment would add a
/// refresh policy (the pinned `jsonwebtoken` key set goes stale only when the
/// IdP rotates signing keys, which is rare enough that a restart-to-refresh
/// is an acceptable interim answer - see DESIGN.md).
async fn fetch_jwks(jwks_uri: &str) -> anyhow::Result<JwkSet> {
	let response = reqwest::get(jwks_uri).await?.error_for_status()?;
	Ok(response.json::<JwkSet>().await?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();
	let config = Config::from_env_and_file(Some(&args.config))?;
	pulse_core::telemetry::init_logging(config.dev_mode);

	if matches!(args.command, Some(Command::CheckConfig)) {
		tracing::info!(config = ?config, "config parsed successfully");
		return Ok(());
	}

	tokio::fs::create_dir_all(&config.data_dir).await?;
	let session_db = config.data_dir.join("sessions.sqlite3");
	let sessions = SessionStore::connect(&format!("sqlite://{}?mode=rwc", session_db.display())).await?;

	let oidc_validator = match &config.auth {
		AuthMode::Oidc {
			issuer,
			client_id,
			jwks_uri,
		} => {
			let jwks = fetch_jwks(jwks_uri).await?;
			Some(Arc::new(JwksValidator::from_jwks(jwks, issuer, client_id)?))
		},
		_ => None,
	};

	let principal_sources = Arc::new(AppPrincipalSources::new(sessions.clone(), Arc::new(config.auth.clone()), oidc_validator));
	let org_directory = Arc::new(FsOrgDirectory::new(&config.data_dir));
	let tenant_registry = Arc::new(TenantServiceRegistry::new(FsTenantServiceFactory {
		data_dir: config.data_dir.clone(),
	}));
	let rate_limiter = Arc::new(TenantRateLimiter::new(config.rate_limit.clone()));
	let sse_registry = Arc::new(SseRegistry::new());
	let entitlement_store = Arc::new(OrgEntitlementStore::new(config.data_dir.clone()));
	let (registry, metrics) = pulse_core::telemetry::new_registry();
	let registry = Arc::new(tokio::sync::RwLock::new(registry));
	let clock: Arc<dyn pulse_core::Clock> = Arc::new(SystemClock);

	let config: SharedConfig = Arc::new(config);

	let state = AppState {
		config: config.clone(),
		sessions: sessions.clone(),
		principal_sources,
		org_directory,
		tenant_registry: tenant_registry.clone(),
		rate_limiter: rate_limiter.clone(),
		sse_registry,
		entitlement_store,
		metrics,
		clock,
	};

	let (shutdown_trigger, drain_watcher) = pulse_core::shutdown::channel();

	let ctrl_c_trigger = shutdown_trigger.clone();
	tokio::spawn(async move {
		let _ = tokio::signal::ctrl_c().await;
		tracing::info!("shutdown signal received");
		ctrl_c_trigger.shutdown(Duration::from_secs(10)).await;
	});

	let sweeper = sessions.spawn_sweeper(Duration::from_secs(60), drain_watcher.clone());
	let reaper = rate_limiter.clone().spawn_reaper(Duration::from_secs(60), Duration::from_secs(600), drain_watcher.clone());

	let app = routes::router(state.clone())
		.layer(axum::middleware::from_fn_with_state(state.clone(), middleware::pipeline))
		.layer(axum::middleware::from_fn(middleware::security_headers))
		.layer(tower_http::trace::TraceLayer::new_for_http())
		.layer(tower_http::compression::CompressionLayer::new())
		.layer(tower_http::cors::CorsLayer::permissive());

	let admin_app = admin::admin_router(admin::AdminState { registry });

	let listen_addr: SocketAddr = args.listen_addr.parse()?;
	let admin_addr: SocketAddr = args.admin_addr.parse()?;
	let listener = tokio::net::TcpListener::bind(listen_addr).await?;
	let admin_listener = tokio::net::TcpListener::bind(admin_addr).await?;

	tracing::info!(%listen_addr, %admin_addr, "pulse starting");

	let mut main_drain = drain_watcher.clone();
	let serve = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
		.with_graceful_shutdown(async move { main_drain.signaled().await });

	let mut admin_drain = drain_watcher.clone();
	let admin_serve =
		axum::serve(admin_listener, admin_app.into_make_service()).with_graceful_shutdown(async move { admin_drain.signaled().await });

	tokio::try_join!(serve, admin_serve)?;

	tenant_registry.shutdown(Duration::from_secs(10)).await;
	sweeper.abort();
	reaper.abort();

	Ok(())
}
