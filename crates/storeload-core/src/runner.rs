//! Orchestration: seeds reference data, then runs the workload mix until
//! cancelled.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use sqlx::Connection;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::db;
use crate::error::{LoadError, LoadResult};
use crate::seed::{self, SeedReport};
use crate::workload::{backfill, keeper, maintenance, read, update, write, WorkerContext};

/// Seed reference data over a dedicated connection.
pub async fn seed_once(settings: &Settings) -> LoadResult<SeedReport> {
	let mut conn = db::connect(&settings.database).await?;
	let mut rng = StdRng::from_entropy();
	let report = seed::seed_all(&mut conn, &settings.seed, &settings.retry, &mut rng).await?;
	conn.close().await.ok();
	Ok(report)
}

/// Seed synchronously, then spawn the configured workload mix and block
/// until every worker has observed cancellation and stopped.
///
/// Workers are independent: one worker exhausting its reconnect budget is
/// logged and ends that worker only, never the process.
pub async fn run_mix(settings: Settings, cancel: CancellationToken) -> LoadResult<()> {
	settings.validate()?;
	let report = seed_once(&settings).await?;
	tracing::info!(
		customers = report.customers,
		products = report.products,
		sellers = report.sellers,
		"seed phase complete, starting workers"
	);

	let settings = Arc::new(settings);
	let mut workers: JoinSet<LoadResult<()>> = JoinSet::new();
	for i in 0..settings.mix.readers {
		let ctx = WorkerContext::new(Arc::clone(&settings), cancel.clone(), i);
		workers.spawn(read::run(ctx));
	}
	for i in 0..settings.mix.writers {
		let ctx = WorkerContext::new(Arc::clone(&settings), cancel.clone(), i);
		workers.spawn(write::run(ctx));
	}
	for i in 0..settings.mix.updaters {
		let ctx = WorkerContext::new(Arc::clone(&settings), cancel.clone(), i);
		workers.spawn(update::run(ctx));
	}
	for i in 0..settings.mix.maintainers {
		let ctx = WorkerContext::new(Arc::clone(&settings), cancel.clone(), i);
		workers.spawn(maintenance::run(ctx));
	}
	tracing::info!(workers = settings.mix.total(), "all load workers started");

	drain(workers).await;
	tracing::info!("load run stopped");
	Ok(())
}

/// Run only the historical backfill until cancelled.
pub async fn run_backfill(settings: Settings, cancel: CancellationToken) -> LoadResult<()> {
	settings.validate()?;
	let ctx = WorkerContext::new(Arc::new(settings), cancel, 0);
	backfill::run(ctx).await
}

/// Hold the configured number of idle connections until cancelled.
pub async fn run_keepers(settings: Settings, cancel: CancellationToken) -> LoadResult<()> {
	settings.validate()?;
	if settings.keeper_connections == 0 {
		return Err(LoadError::Config(
			"keeper needs at least one connection slot".into(),
		));
	}
	let settings = Arc::new(settings);
	let mut slots: JoinSet<LoadResult<()>> = JoinSet::new();
	for i in 0..settings.keeper_connections {
		let ctx = WorkerContext::new(Arc::clone(&settings), cancel.clone(), i + 1);
		slots.spawn(keeper::run(ctx));
		tokio::time::sleep(keeper::SLOT_STAGGER).await;
	}
	tracing::info!(slots = settings.keeper_connections, "all keeper slots started");
	drain(slots).await;
	Ok(())
}

async fn drain(mut workers: JoinSet<LoadResult<()>>) {
	while let Some(joined) = workers.join_next().await {
		match joined {
			Ok(Ok(())) => {}
			Ok(Err(error)) => tracing::error!(error = %error, "worker stopped with error"),
			Err(join_error) => tracing::error!(error = %join_error, "worker panicked"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn default_mix_matches_the_documented_worker_counts() {
		let settings = Settings::default();
		assert_eq!(
			(
				settings.mix.readers,
				settings.mix.writers,
				settings.mix.updaters,
				settings.mix.maintainers,
			),
			(4, 3, 1, 1)
		);
	}

	#[tokio::test]
	async fn keepers_reject_zero_slots() {
		let settings = Settings::default().with_keeper_connections(0);
		let result = run_keepers(settings, CancellationToken::new()).await;
		assert!(matches!(result, Err(LoadError::Config(_))));
	}
}
