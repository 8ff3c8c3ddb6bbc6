//! The perpetual workload loops.
//!
//! Every workload follows the same contract: own one connection, run one
//! bounded unit of work per iteration inside an explicit transaction,
//! commit or roll back, sleep a randomized interval, and on any error
//! roll back, back off, and reconnect. Cancellation is observed between
//! iterations, and inside the read batch between individual queries.

pub mod backfill;
pub mod keeper;
pub mod maintenance;
pub mod read;
pub mod update;
pub mod write;

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::config::{Settings, SleepRange};

/// Everything a worker task needs, passed in explicitly instead of living
/// in globals.
#[derive(Debug, Clone)]
pub struct WorkerContext {
	pub settings: Arc<Settings>,
	pub cancel: CancellationToken,
	/// Index within the workload kind, for log lines only.
	pub worker: usize,
}

impl WorkerContext {
	pub fn new(settings: Arc<Settings>, cancel: CancellationToken, worker: usize) -> Self {
		Self {
			settings,
			cancel,
			worker,
		}
	}
}

/// Draw a sleep duration from the workload's configured range.
pub(crate) fn draw_pause(rng: &mut StdRng, range: SleepRange) -> Duration {
	Duration::from_millis(rng.gen_range(range.min_ms..=range.max_ms))
}

/// Sleep unless cancelled first. Returns false when the token fired, so
/// loops can exit without finishing the pause.
pub(crate) async fn idle(cancel: &CancellationToken, duration: Duration) -> bool {
	tokio::select! {
		_ = cancel.cancelled() => false,
		_ = tokio::time::sleep(duration) => true,
	}
}
