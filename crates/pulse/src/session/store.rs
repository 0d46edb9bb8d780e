use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

/// Fixed one-way function over the raw token. SHA-256 rather than a
/// password-hashing KDF: session tokens are high-entropy random values
/// (see [`new_raw_token`]), not user-chosen secrets, so a fast hash keyed
/// only by uniqueness of the input is sufficient and keeps `Validate` cheap
/// on the hot path - unlike `ApiTokenRecord`, which is a low-volume,
/// long-lived credential hashed with argon2 instead (see `crate::principal`).
pub fn hash_token(raw: &SecretString) -> String {
	let mut hasher = Sha256::new();
	hasher.update(raw.expose_secret().as_bytes());
	hex::encode(hasher.finalize())
}

pub fn new_raw_token() -> SecretString {
	let mut bytes = [0u8; 32];
	rand::thread_rng().fill_bytes(&mut bytes);
	SecretString::new(hex::encode(bytes).into())
}

#[derive(Debug, Clone)]
pub struct Session {
	pub user_id: String,
	pub created_at: DateTime<Utc>,
	pub expires_at: DateTime<Utc>,
	pub user_agent: Option<String>,
	pub ip: Option<String>,
	pub last_seen: DateTime<Utc>,
}

/// Crash-safe, persisted session store backed by SQLite in WAL mode so a
/// process restart never loses an in-flight session (spec.md §4.2). Tokens
/// are hashed before they ever reach a `VALUES` clause.
#[derive(Clone)]
pub struct SessionStore {
	pool: SqlitePool,
}

impl SessionStore {
	pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
		let pool = SqlitePool::connect(database_url).await?;
		sqlx::query(
			"CREATE TABLE IF NOT EXISTS sessions (
				token_hash TEXT PRIMARY KEY,
				user_id TEXT NOT NULL,
				created_at TEXT NOT NULL,
				expires_at TEXT NOT NULL,
				user_agent TEXT,
				ip TEXT,
				last_seen TEXT NOT NULL
			)",
		)
		.execute(&pool)
		.await?;
		Ok(Self { pool })
	}

	#[cfg(test)]
	pub async fn in_memory() -> anyhow::Result<Self> {
		Self::connect("sqlite::memory:").await
	}

	pub async fn create(
		&self,
		user_id: &str,
		ttl: Duration,
		user_agent: Option<&str>,
		ip: Option<&str>,
		now: DateTime<Utc>,
	) -> anyhow::Result<SecretString> {
		let raw = new_raw_token();
		let hash = hash_token(&raw);
		let expires_at = now + chrono::Duration::from_std(ttl)?;
		sqlx::query(
			"INSERT INTO sessions (token_hash, user_id, created_at, expires_at, user_agent, ip, last_seen)
			 VALUES (?, ?, ?, ?, ?, ?, ?)",
		)
		.bind(&hash)
		.bind(user_id)
		.bind(now.to_rfc3339())
		.bind(expires_at.to_rfc3339())
		.bind(user_agent)
		.bind(ip)
		.bind(now.to_rfc3339())
		.execute(&self.pool)
		.await?;
		tracing::info!(target = "audit", action = "session.create", user_id, "session created");
		Ok(raw)
	}

	/// Validates a presented token and slides its `last_seen` forward.
	/// Returns `None` for both "not found" and "expired" - callers must not
	/// distinguish the two, to avoid leaking which is which.
	pub async fn validate(&self, raw: &SecretString, now: DateTime<Utc>) -> anyhow::Result<Option<Session>> {
		let hash = hash_token(raw);
		let row: Option<(String, String, String, Option<String>, Option<String>, String)> = sqlx::query_as(
			"SELECT user_id, created_at, expires_at, user_agent, ip, last_seen FROM sessions WHERE token_hash = ?",
		)
		.bind(&hash)
		.fetch_optional(&self.pool)
		.await?;

		let Some((user_id, created_at, expires_at, user_agent, ip, _last_seen)) = row else {
			return Ok(None);
		};
		let expires_at: DateTime<Utc> = expires_at.parse()?;
		if now >= expires_at {
			return Ok(None);
		}
		sqlx::query("UPDATE sessions SET last_seen = ? WHERE token_hash = ?")
			.bind(now.to_rfc3339())
			.bind(&hash)
			.execute(&self.pool)
			.await?;

		Ok(Some(Session {
			user_id,
			created_at: created_at.parse()?,
			expires_at,
			user_agent,
			ip,
			last_seen: now,
		}))
	}

	pub async fn revoke(&self, raw: &SecretString) -> anyhow::Result<()> {
		let hash = hash_token(raw);
		sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
			.bind(&hash)
			.execute(&self.pool)
			.await?;
		tracing::info!(target = "audit", action = "session.revoke", "session revoked");
		Ok(())
	}

	/// Removes every session whose `expires_at` has passed. Invoked by a
	/// background task at least once a minute (spec.md §4.2).
	pub async fn sweep(&self, now: DateTime<Utc>) -> anyhow::Result<u64> {
		let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
			.bind(now.to_rfc3339())
			.execute(&self.pool)
			.await?;
		let removed = result.rows_affected();
		if removed > 0 {
			tracing::debug!(target = "audit", action = "session.sweep", removed, "swept expired sessions");
		}
		Ok(removed)
	}

	/// Spawns the background sweep loop; returns a handle the caller can
	/// abort on shutdown.
	pub fn spawn_sweeper(self, interval: Duration, mut drain: pulse_core::shutdown::DrainWatcher) -> tokio::task::JoinHandle<()> {
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);
			loop {
				tokio::select! {
					_ = ticker.tick() => {
						if let Err(err) = self.sweep(Utc::now()).await {
							tracing::warn!(error = %err, "session sweep failed");
						}
					}
					_ = drain.signaled() => {
						tracing::info!("session sweeper stopping");
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

	#[tokio::test]
	async fn validate_succeeds_within_ttl_and_fails_after_expiry() {
		let store = SessionStore::in_memory().await.unwrap();
		let now = Utc::now();
		let raw = store
			.create("user-1", Duration::from_secs(60), Some("curl/8"), Some("127.0.0.1"), now)
			.await
			.unwrap();

		let session = store.validate(&raw, now + chrono::Duration::seconds(30)).await.unwrap();
		assert_eq!(session.unwrap().user_id, "user-1");

		let expired = store.validate(&raw, now + chrono::Duration::seconds(61)).await.unwrap();
		assert!(expired.is_none());
	}

	#[tokio::test]
	async fn revoke_invalidates_immediately() {
		let store = SessionStore::in_memory().await.unwrap();
		let now = Utc::now();
		let raw = store.create("user-1", Duration::from_secs(60), None, None, now).await.unwrap();
		store.revoke(&raw).await.unwrap();
		assert!(store.validate(&raw, now).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn sweep_removes_only_expired_rows() {
		let store = SessionStore::in_memory().await.unwrap();
		let now = Utc::now();
		let _live = store.create("user-1", Duration::from_secs(3600), None, None, now).await.unwrap();
		let _dead = store.create("user-2", Duration::from_secs(1), None, None, now).await.unwrap();

		let removed = store.sweep(now + chrono::Duration::seconds(5)).await.unwrap();
		assert_eq!(removed, 1);
	}

	#[test]
	fn same_token_hashes_identically() {
		let raw = SecretString::new("same-token".to_string().into());
		assert_eq!(hash_token(&raw), hash_token(&raw));
	}
}
