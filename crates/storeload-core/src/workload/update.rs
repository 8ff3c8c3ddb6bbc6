//! Update workload: bounded mutations of existing rows.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;
use sqlx::postgres::PgConnection;
use sqlx::Connection;

use crate::db::Reconnector;
use crate::error::LoadResult;
use crate::queries::{FAILING_STATEMENT, UPDATE_OPS};
use crate::workload::{draw_pause, idle, WorkerContext};

/// Result of one update iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
	/// Committed; carries the affected row count, which never exceeds the
	/// chosen operation's subquery LIMIT.
	Committed { rows: u64 },
	/// The deliberate-failure path ran and the transaction was discarded.
	RolledBack,
}

pub async fn run(ctx: WorkerContext) -> LoadResult<()> {
	let reconnector = Reconnector::new(ctx.settings.database.clone(), ctx.settings.retry.clone());
	let mut conn = reconnector.connect(&ctx.cancel).await?;
	let mut rng = StdRng::from_entropy();
	let mut updates = 0u64;

	while !ctx.cancel.is_cancelled() {
		let exercise_rollback = rng.gen_bool(ctx.settings.update_rollback_probability);
		match run_random_update(&mut conn, &mut rng, exercise_rollback).await {
			Ok((name, UpdateOutcome::Committed { rows })) => {
				updates += 1;
				tracing::debug!(
					worker = ctx.worker,
					operation = name,
					rows,
					update = updates,
					"update committed"
				);
				if !idle(&ctx.cancel, draw_pause(&mut rng, ctx.settings.update_sleep)).await {
					break;
				}
			}
			Ok((name, UpdateOutcome::RolledBack)) => {
				tracing::info!(
					worker = ctx.worker,
					operation = name,
					"simulated update rollback completed"
				);
				if !idle(&ctx.cancel, draw_pause(&mut rng, ctx.settings.update_sleep)).await {
					break;
				}
			}
			Err(error) => {
				tracing::warn!(
					worker = ctx.worker,
					error = %error,
					"update failed, rolled back, reconnecting"
				);
				if !idle(&ctx.cancel, ctx.settings.retry.base_delay).await {
					break;
				}
				conn = reconnector.replace(conn, &ctx.cancel).await?;
			}
		}
	}
	conn.close().await.ok();
	tracing::info!(worker = ctx.worker, updates, "update worker stopped");
	Ok(())
}

/// Execute one randomly chosen catalog UPDATE in its own transaction.
/// With `exercise_rollback` set, a statement guaranteed to fail runs
/// after the update and the whole transaction is discarded.
pub async fn run_random_update(
	conn: &mut PgConnection,
	rng: &mut StdRng,
	exercise_rollback: bool,
) -> LoadResult<(&'static str, UpdateOutcome)> {
	let op = UPDATE_OPS.choose(rng).expect("update catalog is never empty");
	let started = Instant::now();

	let mut tx = conn.begin().await?;
	let result = sqlx::query(op.sql).execute(&mut *tx).await?;
	let rows = result.rows_affected();
	debug_assert!(rows <= op.limit);

	if exercise_rollback {
		// Expected to fail; the transaction is aborted afterwards either way.
		let _ = sqlx::query(FAILING_STATEMENT).execute(&mut *tx).await;
		tx.rollback().await?;
		return Ok((op.name, UpdateOutcome::RolledBack));
	}

	tx.commit().await?;
	tracing::trace!(
		operation = op.name,
		rows,
		elapsed_ms = started.elapsed().as_millis() as u64,
		"update executed"
	);
	Ok((op.name, UpdateOutcome::Committed { rows }))
}
