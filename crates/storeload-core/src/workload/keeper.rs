//! Connection keeper: holds idle connections open against the server.
//!
//! Useful for exercising connection-count dashboards. Each slot owns one
//! connection and pings it on a fixed interval; a failed ping goes
//! through the bounded reconnect path, and the slot closes only when the
//! retry budget is exhausted.

use std::time::Duration;

use sqlx::Connection;

use crate::db::Reconnector;
use crate::error::LoadResult;
use crate::workload::{idle, WorkerContext};

/// Interval between keepalive pings.
const PING_INTERVAL: Duration = Duration::from_secs(5);

/// Stagger between slot startups, so connections ramp visibly.
pub const SLOT_STAGGER: Duration = Duration::from_millis(100);

/// Hold one connection open, pinging until cancelled.
pub async fn run(ctx: WorkerContext) -> LoadResult<()> {
	let reconnector = Reconnector::new(ctx.settings.database.clone(), ctx.settings.retry.clone());
	let mut conn = reconnector.connect(&ctx.cancel).await?;
	tracing::info!(slot = ctx.worker, "keeper connection established");

	let mut pings = 0u64;
	while !ctx.cancel.is_cancelled() {
		if !idle(&ctx.cancel, PING_INTERVAL).await {
			break;
		}
		match sqlx::query("SELECT 1").execute(&mut conn).await {
			Ok(_) => {
				pings += 1;
				tracing::trace!(slot = ctx.worker, pings, "keepalive ping");
			}
			Err(error) => {
				tracing::warn!(
					slot = ctx.worker,
					error = %error,
					"keepalive ping failed, reconnecting"
				);
				conn = reconnector.replace(conn, &ctx.cancel).await?;
			}
		}
	}
	conn.close().await.ok();
	tracing::info!(slot = ctx.worker, pings, "keeper connection closed");
	Ok(())
}
