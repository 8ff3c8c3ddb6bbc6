//! Historical order backfill.
//!
//! Fills the orders table day by day with monotonically growing daily
//! counts, starting where the data (organic or synthetic) currently ends.
//! Useful for demo dashboards that want a plausible growth curve rather
//! than a flat line. Backfilled ids carry their own recognizable prefix.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use sqlx::postgres::PgConnection;
use sqlx::{Connection, Postgres, Row, Transaction};

use crate::db::Reconnector;
use crate::error::{LoadError, LoadResult};
use crate::synth::{self, PAYMENT_TYPES};
use crate::workload::{idle, WorkerContext};

/// Start date when the orders table is completely empty.
const FALLBACK_START: NaiveDate = match NaiveDate::from_ymd_opt(2018, 7, 17) {
	Some(d) => d,
	None => panic!("fallback date is valid"),
};

/// Orders on the first backfilled day fall in this range.
const BASE_COUNT_MAX: i64 = 10;
/// First day's ceiling for the daily increment; doubles per day.
const INITIAL_INCREMENT_CEILING: i64 = 25;
/// The increment ceiling stops doubling here.
const MAX_INCREMENT_CEILING: i64 = 400;

/// Pause between backfilled days, so dashboards can watch the curve grow.
const DAY_PAUSE: std::time::Duration = std::time::Duration::from_secs(4);
/// Pause when the backfill has caught up with the current date.
const CAUGHT_UP_PAUSE: std::time::Duration = std::time::Duration::from_secs(5);

/// What to insert for the next day, or `None` when caught up to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayPlan {
	pub day: NaiveDate,
	pub orders: i64,
	pub next_ceiling: i64,
}

/// Decide the next day's order count from where the synthetic series
/// currently ends. The count grows by a random increment whose ceiling
/// doubles per day until capped, producing the monotonic curve.
pub fn plan_next_day(
	start: NaiveDate,
	last_synthetic: Option<(NaiveDate, i64)>,
	today: NaiveDate,
	ceiling: i64,
	rng: &mut StdRng,
) -> Option<DayPlan> {
	let (last_day, last_count) = last_synthetic.unwrap_or((start - chrono::Days::new(1), 0));
	let day = last_day + chrono::Days::new(1);
	if day > today {
		return None;
	}
	let (orders, next_ceiling) = if last_count == 0 && last_day < start {
		(rng.gen_range(0..=BASE_COUNT_MAX), ceiling)
	} else {
		let increment = rng.gen_range(1..=ceiling.max(1));
		let next = if ceiling < MAX_INCREMENT_CEILING {
			(ceiling * 2).min(MAX_INCREMENT_CEILING)
		} else {
			ceiling
		};
		(last_count + increment, next)
	};
	Some(DayPlan {
		day,
		orders,
		next_ceiling,
	})
}

pub async fn run(ctx: WorkerContext) -> LoadResult<()> {
	let reconnector = Reconnector::new(ctx.settings.database.clone(), ctx.settings.retry.clone());
	let mut conn = reconnector.connect(&ctx.cancel).await?;
	let mut rng = StdRng::from_entropy();
	let mut ceiling = INITIAL_INCREMENT_CEILING;

	tracing::info!("starting day-by-day backfill with monotonically increasing daily counts");
	while !ctx.cancel.is_cancelled() {
		match backfill_one_day(&mut conn, &mut rng, ceiling).await {
			Ok(Some(plan)) => {
				ceiling = plan.next_ceiling;
				tracing::info!(
					day = %plan.day,
					orders = plan.orders,
					"backfilled one day"
				);
				if !idle(&ctx.cancel, DAY_PAUSE).await {
					break;
				}
			}
			Ok(None) => {
				tracing::debug!("backfill caught up with today, waiting");
				if !idle(&ctx.cancel, CAUGHT_UP_PAUSE).await {
					break;
				}
			}
			Err(error) => {
				tracing::warn!(error = %error, "backfill day failed, rolled back, reconnecting");
				if !idle(&ctx.cancel, ctx.settings.retry.base_delay).await {
					break;
				}
				conn = reconnector.replace(conn, &ctx.cancel).await?;
			}
		}
	}
	conn.close().await.ok();
	Ok(())
}

/// Plan and insert the next missing day in one transaction. Returns the
/// executed plan, or `None` when the series has reached today.
pub async fn backfill_one_day(
	conn: &mut PgConnection,
	rng: &mut StdRng,
	ceiling: i64,
) -> LoadResult<Option<DayPlan>> {
	let start = dynamic_start_date(conn).await?;
	let last = last_synthetic_day(conn, start).await?;
	let today = Utc::now().date_naive();
	let Some(plan) = plan_next_day(start, last, today, ceiling, rng) else {
		return Ok(None);
	};

	let mut tx = conn.begin().await?;
	for _ in 0..plan.orders {
		let purchase = random_time_within_day(plan.day, rng);
		insert_backfill_order(&mut tx, rng, purchase).await?;
	}
	tx.commit().await?;
	Ok(Some(plan))
}

/// Latest order date across all rows, organic and synthetic; the fixed
/// fallback applies to an empty table.
async fn dynamic_start_date(conn: &mut PgConnection) -> LoadResult<NaiveDate> {
	let row = sqlx::query("SELECT MAX(DATE(order_purchase_timestamp)) FROM orders")
		.fetch_one(&mut *conn)
		.await?;
	let date: Option<NaiveDate> = row.try_get(0)?;
	Ok(date.unwrap_or(FALLBACK_START))
}

/// Latest backfilled day at or after `start`, with its order count.
async fn last_synthetic_day(
	conn: &mut PgConnection,
	start: NaiveDate,
) -> LoadResult<Option<(NaiveDate, i64)>> {
	let row = sqlx::query(
		"SELECT DATE(order_purchase_timestamp) AS day, COUNT(*) AS orders \
		 FROM orders \
		 WHERE order_id LIKE $1 \
		 AND order_purchase_timestamp >= $2 \
		 GROUP BY day \
		 ORDER BY day DESC \
		 LIMIT 1",
	)
	.bind(format!("{}%", synth::BACKFILL_ORDER_PREFIX))
	.bind(start.and_time(NaiveTime::MIN))
	.fetch_optional(&mut *conn)
	.await?;
	match row {
		Some(row) => {
			let day: NaiveDate = row.try_get("day")?;
			let orders: i64 = row.try_get("orders")?;
			Ok(Some((day, orders)))
		}
		None => Ok(None),
	}
}

fn random_time_within_day(day: NaiveDate, rng: &mut StdRng) -> NaiveDateTime {
	let second = rng.gen_range(0..86_400);
	day.and_time(NaiveTime::from_num_seconds_from_midnight_opt(second, 0).unwrap_or(NaiveTime::MIN))
}

async fn pick_reference_id(
	tx: &mut Transaction<'_, Postgres>,
	sql: &'static str,
	entity: &'static str,
) -> LoadResult<String> {
	let row = sqlx::query(sql).fetch_optional(&mut **tx).await?;
	match row {
		Some(row) => Ok(row.try_get(0)?),
		None => Err(LoadError::EmptyReference { entity }),
	}
}

/// Insert one backfilled order with a single line and payment.
async fn insert_backfill_order(
	tx: &mut Transaction<'_, Postgres>,
	rng: &mut StdRng,
	purchase: NaiveDateTime,
) -> LoadResult<()> {
	let customer_id = pick_reference_id(
		tx,
		"SELECT customer_id FROM customers ORDER BY RANDOM() LIMIT 1",
		"customers",
	)
	.await?;
	let seller_id = pick_reference_id(
		tx,
		"SELECT seller_id FROM sellers ORDER BY RANDOM() LIMIT 1",
		"sellers",
	)
	.await?;
	let product_id = pick_reference_id(
		tx,
		"SELECT product_id FROM products ORDER BY RANDOM() LIMIT 1",
		"products",
	)
	.await?;

	let order_id = synth::backfill_order_id(rng);
	let estimated_delivery = purchase + chrono::Days::new(rng.gen_range(10..=45));
	let shipping_limit = purchase + chrono::Days::new(5);

	sqlx::query(
		"INSERT INTO orders (order_id, customer_id, order_status, \
		 order_purchase_timestamp, order_estimated_delivery_date) \
		 VALUES ($1, $2, 'approved', $3, $4)",
	)
	.bind(&order_id)
	.bind(&customer_id)
	.bind(purchase)
	.bind(estimated_delivery)
	.execute(&mut **tx)
	.await?;

	let price = (rng.gen_range(25.0..=450.0_f64) * 100.0).round() / 100.0;
	let freight = (rng.gen_range(5.0..=35.0_f64) * 100.0).round() / 100.0;
	sqlx::query(
		"INSERT INTO order_items (order_id, order_item_id, product_id, seller_id, \
		 shipping_limit_date, price, freight_value) \
		 VALUES ($1, 1, $2, $3, $4, $5, $6)",
	)
	.bind(&order_id)
	.bind(&product_id)
	.bind(&seller_id)
	.bind(shipping_limit)
	.bind(price)
	.bind(freight)
	.execute(&mut **tx)
	.await?;

	let payment_type = PAYMENT_TYPES[rng.gen_range(0..PAYMENT_TYPES.len())];
	let value = (rng.gen_range(30.0..=500.0_f64) * 100.0).round() / 100.0;
	sqlx::query(
		"INSERT INTO order_payments (order_id, payment_sequential, payment_type, \
		 payment_installments, payment_value) \
		 VALUES ($1, 1, $2, $3, $4)",
	)
	.bind(&order_id)
	.bind(payment_type)
	.bind(rng.gen_range(1..=12_i32))
	.bind(value)
	.execute(&mut **tx)
	.await?;
	Ok(())
}
