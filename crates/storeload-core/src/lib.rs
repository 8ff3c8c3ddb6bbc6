//! Synthetic OLTP load generation against the Olist retail sample schema.
//!
//! The crate drives a PostgreSQL database with several concurrent
//! workloads, each owning an exclusive connection:
//!
//! - **Seed**: idempotent batched inserts of customers, products, and
//!   sellers, conflict-ignored on primary key
//! - **Read**: randomly sampled analytical queries from a fixed catalog
//! - **Write**: batches of synthetic orders, items, and payments with an
//!   occasional simulated rollback
//! - **Update**: bounded row mutations (status promotion, price jitter)
//! - **Maintenance**: temp-table churn, `ANALYZE`, and cleanup of aged
//!   synthetic rows
//! - **Backfill**: day-by-day historical order insertion with a growing
//!   daily count
//! - **Keeper**: idle connections held open with periodic pings
//!
//! Synthetic rows are recognizable by their id prefixes (see [`synth`]),
//! so they can be distinguished from organic data and cleaned up. Every
//! workload treats failures uniformly: roll back, back off, reconnect
//! with a bounded budget, continue. Shutdown is cooperative through a
//! [`CancellationToken`](tokio_util::sync::CancellationToken) observed
//! between iterations.
//!
//! # Quick start
//!
//! ```no_run
//! use storeload_core::{runner, Settings};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> storeload_core::LoadResult<()> {
//! let settings = Settings::from_env()?;
//! let cancel = CancellationToken::new();
//! runner::run_mix(settings, cancel).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod queries;
pub mod runner;
pub mod seed;
pub mod synth;
pub mod workload;

pub use config::{DatabaseSettings, RetryPolicy, SeedSettings, Settings, SleepRange, WorkerMix};
pub use error::{LoadError, LoadResult};
pub use seed::SeedReport;
pub use workload::WorkerContext;
