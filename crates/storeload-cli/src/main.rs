//! storeload command-line front end.
//!
//! ## Usage
//!
//! ```bash
//! storeload seed
//! storeload run
//! storeload run --readers 8 --writers 5
//! storeload backfill
//! storeload keep --connections 20
//! ```
//!
//! Database coordinates come from `DATABASE_URL` (with a localhost
//! fallback); see `storeload_core::Settings` for all recognized
//! environment variables. Log verbosity follows `RUST_LOG`.

use clap::{Parser, Subcommand};
use colored::Colorize;
use storeload_core::{runner, Settings};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "storeload")]
#[command(about = "Synthetic OLTP load generator for the Olist retail schema", long_about = None)]
#[command(version)]
struct Cli {
	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Seed reference data, then run the full workload mix until ctrl-c
	Run {
		/// Number of read workers
		#[arg(long, value_name = "N")]
		readers: Option<usize>,

		/// Number of write workers
		#[arg(long, value_name = "N")]
		writers: Option<usize>,

		/// Number of update workers
		#[arg(long, value_name = "N")]
		updaters: Option<usize>,

		/// Number of maintenance workers
		#[arg(long, value_name = "N")]
		maintainers: Option<usize>,
	},

	/// Seed reference data (customers, products, sellers) and exit
	Seed,

	/// Backfill historical orders day by day until ctrl-c
	Backfill,

	/// Hold idle connections open until ctrl-c
	Keep {
		/// Number of connections to hold
		#[arg(long, value_name = "N")]
		connections: Option<usize>,
	},
}

fn init_tracing() {
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new("storeload_core=info,storeload=info"));
	tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Cancel the token on the first ctrl-c so workers wind down between
/// iterations instead of being killed mid-transaction.
fn spawn_ctrl_c_handler(cancel: CancellationToken) {
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			eprintln!("{}", "shutdown requested, stopping workers...".yellow());
			cancel.cancel();
		}
	});
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	init_tracing();
	let cli = Cli::parse();
	let mut settings = Settings::from_env()?;
	let cancel = CancellationToken::new();
	spawn_ctrl_c_handler(cancel.clone());

	match cli.command {
		Commands::Run {
			readers,
			writers,
			updaters,
			maintainers,
		} => {
			if let Some(n) = readers {
				settings.mix.readers = n;
			}
			if let Some(n) = writers {
				settings.mix.writers = n;
			}
			if let Some(n) = updaters {
				settings.mix.updaters = n;
			}
			if let Some(n) = maintainers {
				settings.mix.maintainers = n;
			}
			runner::run_mix(settings, cancel).await?;
		}
		Commands::Seed => {
			let report = runner::seed_once(&settings).await?;
			println!(
				"{} {} customers, {} products, {} sellers inserted",
				"seeded:".green(),
				report.customers,
				report.products,
				report.sellers
			);
		}
		Commands::Backfill => {
			runner::run_backfill(settings, cancel).await?;
		}
		Commands::Keep { connections } => {
			if let Some(n) = connections {
				settings.keeper_connections = n;
			}
			runner::run_keepers(settings, cancel).await?;
		}
	}
	Ok(())
}
