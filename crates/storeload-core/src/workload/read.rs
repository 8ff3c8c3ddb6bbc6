//! Read workload: a perpetual stream of analytical queries.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use sqlx::postgres::PgConnection;
use sqlx::Connection;
use tokio_util::sync::CancellationToken;

use crate::config::SleepRange;
use crate::db::Reconnector;
use crate::error::LoadResult;
use crate::queries::READ_QUERIES;
use crate::workload::{draw_pause, idle, WorkerContext};

/// Queries grouped under one transaction, so the commit cadence stays at
/// one commit per five reads.
const QUERIES_PER_COMMIT: usize = 5;

/// Run the read loop until cancelled. Statement failures roll back, back
/// off, and reconnect; only an exhausted reconnect budget ends the task.
pub async fn run(ctx: WorkerContext) -> LoadResult<()> {
	let reconnector = Reconnector::new(ctx.settings.database.clone(), ctx.settings.retry.clone());
	let mut conn = reconnector.connect(&ctx.cancel).await?;
	let mut rng = StdRng::from_entropy();
	let mut commits = 0u64;

	while !ctx.cancel.is_cancelled() {
		match run_batch(&mut conn, &mut rng, &ctx.cancel, ctx.settings.read_sleep).await {
			Ok(rows) => {
				commits += 1;
				tracing::debug!(worker = ctx.worker, commit = commits, rows, "read batch done");
				if !idle(&ctx.cancel, draw_pause(&mut rng, ctx.settings.read_sleep)).await {
					break;
				}
			}
			Err(error) => {
				tracing::warn!(
					worker = ctx.worker,
					error = %error,
					"read query failed, rolled back, reconnecting"
				);
				if !idle(&ctx.cancel, ctx.settings.retry.base_delay).await {
					break;
				}
				conn = reconnector.replace(conn, &ctx.cancel).await?;
			}
		}
	}
	conn.close().await.ok();
	tracing::info!(worker = ctx.worker, commits, "read worker stopped");
	Ok(())
}

/// Execute five randomly chosen catalog queries inside one read-only
/// transaction, pausing between consecutive queries, and commit. The
/// caller pauses once more after the commit, so every query is followed
/// by one sleep from the configured range. Cancellation mid-batch
/// commits the queries already run. Returns total rows fetched.
pub async fn run_batch(
	conn: &mut PgConnection,
	rng: &mut StdRng,
	cancel: &CancellationToken,
	pause: SleepRange,
) -> LoadResult<u64> {
	let mut tx = conn.begin().await?;
	let mut total_rows = 0u64;
	for iteration in 1..=QUERIES_PER_COMMIT {
		let query = READ_QUERIES
			.choose(rng)
			.expect("read catalog is never empty");
		let started = Instant::now();
		let rows = sqlx::query(query.sql).fetch_all(&mut *tx).await?;
		total_rows += rows.len() as u64;
		tracing::trace!(
			query = query.name,
			rows = rows.len(),
			elapsed_ms = started.elapsed().as_millis() as u64,
			"read query executed"
		);
		if iteration == QUERIES_PER_COMMIT || !idle(cancel, draw_pause(rng, pause)).await {
			break;
		}
	}
	tx.commit().await?;
	Ok(total_rows)
}
