//! Per-worker database connections.
//!
//! Every worker owns exactly one `PgConnection`; connections are never
//! shared across tasks. When a statement or the link itself fails, the
//! worker drops its connection and asks the [`Reconnector`] for a fresh
//! one, which retries with capped exponential backoff up to the configured
//! attempt budget.

use sqlx::postgres::PgConnection;
use sqlx::Connection;
use tokio_util::sync::CancellationToken;

use crate::config::{DatabaseSettings, RetryPolicy};
use crate::error::{LoadError, LoadResult};

/// Open a single connection and pin its schema search path.
pub async fn connect(settings: &DatabaseSettings) -> LoadResult<PgConnection> {
	let mut conn = PgConnection::connect(&settings.url).await?;
	let set_path = format!("SET search_path TO {}", settings.search_path);
	sqlx::query(&set_path).execute(&mut conn).await?;
	Ok(conn)
}

/// Re-establishes a worker's exclusive connection after failures.
#[derive(Debug, Clone)]
pub struct Reconnector {
	settings: DatabaseSettings,
	retry: RetryPolicy,
}

impl Reconnector {
	pub fn new(settings: DatabaseSettings, retry: RetryPolicy) -> Self {
		Self { settings, retry }
	}

	/// Connect, retrying transient failures until the attempt budget runs
	/// out. Returns early with the last error once cancelled.
	pub async fn connect(&self, cancel: &CancellationToken) -> LoadResult<PgConnection> {
		let mut attempt = 0u32;
		loop {
			attempt += 1;
			match connect(&self.settings).await {
				Ok(conn) => {
					if attempt > 1 {
						tracing::info!(attempt, "database connection re-established");
					}
					return Ok(conn);
				}
				Err(LoadError::Database(source)) if attempt < self.retry.max_attempts => {
					let delay = self.retry.delay_for(attempt);
					tracing::warn!(
						error = %source,
						attempt,
						delay_ms = delay.as_millis() as u64,
						"connection attempt failed, backing off"
					);
					tokio::select! {
						_ = cancel.cancelled() => {
							return Err(LoadError::RetriesExhausted { attempts: attempt, source });
						}
						_ = tokio::time::sleep(delay) => {}
					}
				}
				Err(LoadError::Database(source)) => {
					return Err(LoadError::RetriesExhausted {
						attempts: attempt,
						source,
					});
				}
				Err(other) => return Err(other),
			}
		}
	}

	/// Drop a broken connection and open a replacement.
	pub async fn replace(
		&self,
		broken: PgConnection,
		cancel: &CancellationToken,
	) -> LoadResult<PgConnection> {
		// Best effort; the server side may already be gone.
		broken.close().await.ok();
		self.connect(cancel).await
	}
}
