//! Maintenance workload: temp-table churn, ANALYZE, and cleanup of aged
//! synthetic orders.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;
use sqlx::postgres::PgConnection;
use sqlx::Connection;

use crate::db::Reconnector;
use crate::error::LoadResult;
use crate::queries::{ANALYZE_TABLES, CLEANUP_AGED_ORDERS, FAILING_STATEMENT, MAINTENANCE_STATEMENTS};
use crate::workload::{draw_pause, idle, WorkerContext};

/// Chance a cycle also runs ANALYZE on one table.
const ANALYZE_PROBABILITY: f64 = 0.3;

/// Result of one maintenance cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
	Committed {
		/// Aged synthetic orders removed this cycle (bounded by the
		/// cleanup statement's LIMIT).
		deleted: u64,
		analyzed: bool,
	},
	RolledBack,
}

pub async fn run(ctx: WorkerContext) -> LoadResult<()> {
	let reconnector = Reconnector::new(ctx.settings.database.clone(), ctx.settings.retry.clone());
	let mut conn = reconnector.connect(&ctx.cancel).await?;
	let mut rng = StdRng::from_entropy();
	let mut cycles = 0u64;

	while !ctx.cancel.is_cancelled() {
		let exercise_rollback = rng.gen_bool(ctx.settings.maintenance_rollback_probability);
		match run_cycle(&mut conn, &mut rng, exercise_rollback).await {
			Ok(CycleOutcome::Committed { deleted, analyzed }) => {
				cycles += 1;
				tracing::info!(
					worker = ctx.worker,
					cycle = cycles,
					deleted,
					analyzed,
					"maintenance cycle committed"
				);
				if !idle(&ctx.cancel, draw_pause(&mut rng, ctx.settings.maintenance_sleep)).await {
					break;
				}
			}
			Ok(CycleOutcome::RolledBack) => {
				tracing::info!(worker = ctx.worker, "simulated maintenance rollback completed");
				if !idle(&ctx.cancel, draw_pause(&mut rng, ctx.settings.maintenance_sleep)).await {
					break;
				}
			}
			Err(error) => {
				tracing::warn!(
					worker = ctx.worker,
					error = %error,
					"maintenance cycle failed, rolled back, reconnecting"
				);
				if !idle(&ctx.cancel, ctx.settings.retry.base_delay).await {
					break;
				}
				conn = reconnector.replace(conn, &ctx.cancel).await?;
			}
		}
	}
	conn.close().await.ok();
	tracing::info!(worker = ctx.worker, cycles, "maintenance worker stopped");
	Ok(())
}

/// One maintenance cycle: two sampled temp-table statements, an optional
/// ANALYZE, and the bounded cleanup of aged synthetic orders, all in one
/// transaction.
///
/// ANALYZE runs outside the transaction; Postgres accepts it inside one
/// but gathers better statistics once the cleanup is visible.
pub async fn run_cycle(
	conn: &mut PgConnection,
	rng: &mut StdRng,
	exercise_rollback: bool,
) -> LoadResult<CycleOutcome> {
	let sampled: Vec<&str> = MAINTENANCE_STATEMENTS
		.choose_multiple(rng, 2)
		.copied()
		.collect();
	let analyze_table = rng
		.gen_bool(ANALYZE_PROBABILITY)
		.then(|| ANALYZE_TABLES.choose(rng).copied())
		.flatten();

	let mut tx = conn.begin().await?;
	for statement in sampled {
		sqlx::query(statement).execute(&mut *tx).await?;
	}
	let deleted = sqlx::query(CLEANUP_AGED_ORDERS)
		.execute(&mut *tx)
		.await?
		.rows_affected();

	if exercise_rollback {
		let _ = sqlx::query(FAILING_STATEMENT).execute(&mut *tx).await;
		tx.rollback().await?;
		return Ok(CycleOutcome::RolledBack);
	}
	tx.commit().await?;

	let analyzed = match analyze_table {
		Some(table) => {
			let statement = format!("ANALYZE {table}");
			sqlx::query(&statement).execute(&mut *conn).await?;
			tracing::debug!(table, "analyze executed");
			true
		}
		None => false,
	};

	Ok(CycleOutcome::Committed { deleted, analyzed })
}
