//! Write workload: batches of synthetic orders, items, and payments.

use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use sqlx::postgres::PgConnection;
use sqlx::{Connection, Postgres, Transaction};

use crate::config::SeedSettings;
use crate::db::Reconnector;
use crate::error::LoadResult;
use crate::synth::{self, OrderDraw};
use crate::workload::{draw_pause, idle, WorkerContext};

/// Orders inserted per transaction.
const ORDERS_PER_BATCH: usize = 3;

/// What happened to one write iteration's transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
	/// Committed, with the number of statements that ran.
	Committed { statements: u64 },
	/// Discarded by the simulated-rollback path.
	RolledBack,
}

pub async fn run(ctx: WorkerContext) -> LoadResult<()> {
	let reconnector = Reconnector::new(ctx.settings.database.clone(), ctx.settings.retry.clone());
	let mut conn = reconnector.connect(&ctx.cancel).await?;
	let mut rng = StdRng::from_entropy();
	let mut batches = 0u64;

	while !ctx.cancel.is_cancelled() {
		let simulate_rollback = rng.gen_bool(ctx.settings.write_rollback_probability);
		match insert_order_batch(&mut conn, &mut rng, &ctx.settings.seed, simulate_rollback).await {
			Ok(BatchOutcome::Committed { statements }) => {
				batches += 1;
				tracing::debug!(
					worker = ctx.worker,
					batch = batches,
					statements,
					"write batch committed"
				);
				if !idle(&ctx.cancel, draw_pause(&mut rng, ctx.settings.write_sleep)).await {
					break;
				}
			}
			Ok(BatchOutcome::RolledBack) => {
				tracing::info!(worker = ctx.worker, "simulated write rollback, batch discarded");
				if !idle(&ctx.cancel, draw_pause(&mut rng, ctx.settings.write_sleep)).await {
					break;
				}
			}
			Err(error) => {
				tracing::warn!(
					worker = ctx.worker,
					error = %error,
					"write batch failed, rolled back, reconnecting"
				);
				if !idle(&ctx.cancel, ctx.settings.retry.base_delay).await {
					break;
				}
				conn = reconnector.replace(conn, &ctx.cancel).await?;
			}
		}
	}
	conn.close().await.ok();
	tracing::info!(worker = ctx.worker, batches, "write worker stopped");
	Ok(())
}

/// Insert a batch of orders with their lines and payments in one
/// transaction. When `simulate_rollback` is set the batch is rolled back
/// instead of committed, exercising the abort path with real statements.
pub async fn insert_order_batch(
	conn: &mut PgConnection,
	rng: &mut StdRng,
	seed: &SeedSettings,
	simulate_rollback: bool,
) -> LoadResult<BatchOutcome> {
	let draws: Vec<OrderDraw> = (0..ORDERS_PER_BATCH)
		.map(|_| synth::order_draw(rng, seed))
		.collect();

	let mut tx = conn.begin().await?;
	let mut statements = 0u64;
	for draw in &draws {
		statements += insert_order(&mut tx, draw).await?;
	}

	if simulate_rollback {
		tx.rollback().await?;
		return Ok(BatchOutcome::RolledBack);
	}
	tx.commit().await?;
	Ok(BatchOutcome::Committed { statements })
}

async fn insert_order(tx: &mut Transaction<'_, Postgres>, draw: &OrderDraw) -> LoadResult<u64> {
	let mut statements = 1u64;
	sqlx::query(
		"INSERT INTO orders (order_id, customer_id, order_status, \
		 order_purchase_timestamp, order_approved_at, order_estimated_delivery_date) \
		 VALUES ($1, $2, $3, NOW(), NOW(), NOW() + INTERVAL '10 days') \
		 ON CONFLICT (order_id) DO NOTHING",
	)
	.bind(&draw.order_id)
	.bind(&draw.customer_id)
	.bind(draw.status)
	.execute(&mut **tx)
	.await?;

	for item in &draw.items {
		sqlx::query(
			"INSERT INTO order_items (order_id, order_item_id, product_id, seller_id, \
			 shipping_limit_date, price, freight_value) \
			 VALUES ($1, $2, $3, $4, NOW() + INTERVAL '5 days', $5, $6) \
			 ON CONFLICT (order_id, order_item_id) DO NOTHING",
		)
		.bind(&draw.order_id)
		.bind(item.line)
		.bind(&item.product_id)
		.bind(&item.seller_id)
		.bind(item.price)
		.bind(item.freight)
		.execute(&mut **tx)
		.await?;
		statements += 1;
	}

	if let Some(payment) = &draw.payment {
		sqlx::query(
			"INSERT INTO order_payments (order_id, payment_sequential, payment_type, \
			 payment_installments, payment_value) \
			 VALUES ($1, $2, $3, $4, $5) \
			 ON CONFLICT DO NOTHING",
		)
		.bind(&draw.order_id)
		.bind(payment.sequential)
		.bind(payment.payment_type)
		.bind(payment.installments)
		.bind(payment.value)
		.execute(&mut **tx)
		.await?;
		statements += 1;
	}
	Ok(statements)
}
