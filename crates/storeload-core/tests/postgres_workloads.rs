//! End-to-end workload checks against a disposable PostgreSQL container.
//!
//! These tests need a Docker daemon, so they are ignored by default:
//!
//! ```bash
//! cargo test -p storeload-core --test postgres_workloads -- --ignored
//! ```

use rand::rngs::StdRng;
use rand::SeedableRng;
use sqlx::postgres::PgConnection;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};
use tokio_util::sync::CancellationToken;

use storeload_core::config::SleepRange;
use storeload_core::workload::maintenance::{self, CycleOutcome};
use storeload_core::workload::read;
use storeload_core::workload::write::{self, BatchOutcome};
use storeload_core::{db, queries, seed, synth, Settings};

type PgContainer = ContainerAsync<GenericImage>;

/// The Olist tables the generator touches, in dependency order.
const SCHEMA_DDL: &[&str] = &[
	"CREATE SCHEMA IF NOT EXISTS olist",
	"CREATE TABLE olist.customers (
		customer_id TEXT PRIMARY KEY,
		customer_unique_id TEXT,
		customer_zip_code_prefix INTEGER,
		customer_city TEXT,
		customer_state TEXT
	)",
	"CREATE TABLE olist.products (
		product_id TEXT PRIMARY KEY,
		product_category_name TEXT,
		product_name_lenght INTEGER,
		product_description_lenght INTEGER,
		product_photos_qty INTEGER,
		product_weight_g INTEGER,
		product_length_cm INTEGER,
		product_height_cm INTEGER,
		product_width_cm INTEGER
	)",
	"CREATE TABLE olist.sellers (
		seller_id TEXT PRIMARY KEY,
		seller_zip_code_prefix INTEGER,
		seller_city TEXT,
		seller_state TEXT
	)",
	"CREATE TABLE olist.orders (
		order_id TEXT PRIMARY KEY,
		customer_id TEXT,
		order_status TEXT,
		order_purchase_timestamp TIMESTAMP,
		order_approved_at TIMESTAMP,
		order_delivered_carrier_date TIMESTAMP,
		order_delivered_customer_date TIMESTAMP,
		order_estimated_delivery_date TIMESTAMP
	)",
	"CREATE TABLE olist.order_items (
		order_id TEXT,
		order_item_id INTEGER,
		product_id TEXT,
		seller_id TEXT,
		shipping_limit_date TIMESTAMP,
		price DOUBLE PRECISION,
		freight_value DOUBLE PRECISION,
		PRIMARY KEY (order_id, order_item_id)
	)",
	"CREATE TABLE olist.order_payments (
		order_id TEXT,
		payment_sequential INTEGER,
		payment_type TEXT,
		payment_installments INTEGER,
		payment_value DOUBLE PRECISION
	)",
];

async fn start_postgres() -> (PgContainer, Settings) {
	let image = GenericImage::new("postgres", "16-alpine")
		.with_exposed_port(5432.tcp())
		.with_wait_for(WaitFor::message_on_stderr(
			"database system is ready to accept connections",
		))
		.with_startup_timeout(std::time::Duration::from_secs(120))
		.with_env_var("POSTGRES_HOST_AUTH_METHOD", "trust");

	let container = image
		.start()
		.await
		.expect("failed to start PostgreSQL container");
	tokio::time::sleep(std::time::Duration::from_millis(500)).await;
	let port = container
		.get_host_port_ipv4(5432)
		.await
		.expect("failed to resolve mapped PostgreSQL port");

	let url = format!("postgres://postgres@localhost:{port}/postgres?sslmode=disable");
	let settings = Settings::default().with_database_url(url);

	let mut conn = connect_with_retry(&settings).await;
	for ddl in SCHEMA_DDL {
		sqlx::query(ddl)
			.execute(&mut conn)
			.await
			.expect("schema DDL failed");
	}
	(container, settings)
}

async fn connect_with_retry(settings: &Settings) -> PgConnection {
	let mut attempt = 0u32;
	loop {
		match db::connect(&settings.database).await {
			Ok(conn) => return conn,
			Err(_) if attempt < 7 => {
				attempt += 1;
				let delay = std::time::Duration::from_millis(200 * 2u64.pow(attempt));
				tokio::time::sleep(delay).await;
			}
			Err(e) => panic!("PostgreSQL never became reachable: {e}"),
		}
	}
}

async fn count(conn: &mut PgConnection, sql: &str) -> i64 {
	sqlx::query_scalar(sql)
		.fetch_one(conn)
		.await
		.expect("count query failed")
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
async fn seeding_twice_leaves_row_counts_unchanged() {
	let (_container, settings) = start_postgres().await;
	let mut conn = connect_with_retry(&settings).await;
	let mut rng = StdRng::seed_from_u64(1);

	let first = seed::seed_all(&mut conn, &settings.seed, &settings.retry, &mut rng)
		.await
		.unwrap();
	assert_eq!(first.customers, 500);
	assert_eq!(first.products, 200);
	assert_eq!(first.sellers, 100);

	let second = seed::seed_all(&mut conn, &settings.seed, &settings.retry, &mut rng)
		.await
		.unwrap();
	assert_eq!(second.customers, 0, "conflict-ignore must skip existing rows");
	assert_eq!(second.products, 0);
	assert_eq!(second.sellers, 0);

	let customers = seed::synthetic_count(&mut conn, "customers", "customer_id", "load_cust_")
		.await
		.unwrap();
	assert_eq!(customers, 500);
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
async fn write_batches_stay_within_documented_bounds() {
	let (_container, settings) = start_postgres().await;
	let mut conn = connect_with_retry(&settings).await;
	let mut rng = StdRng::seed_from_u64(2);
	seed::seed_all(&mut conn, &settings.seed, &settings.retry, &mut rng)
		.await
		.unwrap();

	for _ in 0..20 {
		let outcome = write::insert_order_batch(&mut conn, &mut rng, &settings.seed, false)
			.await
			.unwrap();
		assert!(matches!(outcome, BatchOutcome::Committed { .. }));
	}

	let max_items: Option<i64> = sqlx::query_scalar(
		"SELECT MAX(line_count) FROM (
			SELECT COUNT(*) AS line_count FROM order_items GROUP BY order_id
		) per_order",
	)
	.fetch_one(&mut conn)
	.await
	.unwrap();
	assert!(max_items.unwrap_or(0) <= 4);

	let out_of_range_installments = count(
		&mut conn,
		"SELECT COUNT(*) FROM order_payments WHERE payment_installments NOT BETWEEN 1 AND 12",
	)
	.await;
	assert_eq!(out_of_range_installments, 0);
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
async fn simulated_write_rollback_discards_the_batch() {
	let (_container, settings) = start_postgres().await;
	let mut conn = connect_with_retry(&settings).await;
	let mut rng = StdRng::seed_from_u64(3);
	seed::seed_all(&mut conn, &settings.seed, &settings.retry, &mut rng)
		.await
		.unwrap();

	let before = count(&mut conn, "SELECT COUNT(*) FROM orders").await;
	let outcome = write::insert_order_batch(&mut conn, &mut rng, &settings.seed, true)
		.await
		.unwrap();
	assert_eq!(outcome, BatchOutcome::RolledBack);
	let after = count(&mut conn, "SELECT COUNT(*) FROM orders").await;
	assert_eq!(before, after);
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
async fn every_update_op_respects_its_subquery_limit() {
	let (_container, settings) = start_postgres().await;
	let mut conn = connect_with_retry(&settings).await;
	let mut rng = StdRng::seed_from_u64(4);
	seed::seed_all(&mut conn, &settings.seed, &settings.retry, &mut rng)
		.await
		.unwrap();
	for _ in 0..30 {
		write::insert_order_batch(&mut conn, &mut rng, &settings.seed, false)
			.await
			.unwrap();
	}

	for op in queries::UPDATE_OPS {
		let affected = sqlx::query(op.sql)
			.execute(&mut conn)
			.await
			.unwrap()
			.rows_affected();
		assert!(
			affected <= op.limit,
			"{} affected {affected} rows, limit {}",
			op.name,
			op.limit
		);
	}
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
async fn read_catalog_runs_cleanly_against_seeded_data() {
	let (_container, settings) = start_postgres().await;
	let mut conn = connect_with_retry(&settings).await;
	let mut rng = StdRng::seed_from_u64(5);
	seed::seed_all(&mut conn, &settings.seed, &settings.retry, &mut rng)
		.await
		.unwrap();

	for query in queries::READ_QUERIES {
		sqlx::query(query.sql)
			.fetch_all(&mut conn)
			.await
			.unwrap_or_else(|e| panic!("{} failed: {e}", query.name));
	}
	// And the batched form the workload actually uses.
	read::run_batch(&mut conn, &mut rng, &CancellationToken::new(), SleepRange::new(0, 1))
		.await
		.unwrap();
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
async fn read_batch_pauses_between_queries() {
	let (_container, settings) = start_postgres().await;
	let mut conn = connect_with_retry(&settings).await;
	let mut rng = StdRng::seed_from_u64(9);

	let started = std::time::Instant::now();
	read::run_batch(&mut conn, &mut rng, &CancellationToken::new(), SleepRange::new(30, 30))
		.await
		.unwrap();
	// Five queries, four inter-query pauses of 30 ms each.
	assert!(started.elapsed() >= std::time::Duration::from_millis(120));
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
async fn a_killed_connection_is_replaced_and_work_resumes() {
	let (_container, settings) = start_postgres().await;
	let mut conn = connect_with_retry(&settings).await;
	let mut rng = StdRng::seed_from_u64(10);

	// Sever the server side of this session, then confirm the old
	// connection is unusable.
	let _ = sqlx::query("SELECT pg_terminate_backend(pg_backend_pid())")
		.execute(&mut conn)
		.await;
	assert!(sqlx::query("SELECT 1").execute(&mut conn).await.is_err());

	let reconnector = db::Reconnector::new(settings.database.clone(), settings.retry.clone());
	let cancel = CancellationToken::new();
	let mut conn = reconnector.replace(conn, &cancel).await.unwrap();
	read::run_batch(&mut conn, &mut rng, &cancel, SleepRange::new(0, 1))
		.await
		.unwrap();
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
async fn maintenance_deletes_only_aged_prefixed_orders() {
	let (_container, settings) = start_postgres().await;
	let mut conn = connect_with_retry(&settings).await;
	let mut rng = StdRng::seed_from_u64(6);
	seed::seed_all(&mut conn, &settings.seed, &settings.retry, &mut rng)
		.await
		.unwrap();

	sqlx::query(
		"INSERT INTO orders (order_id, customer_id, order_status, order_purchase_timestamp)
		 VALUES ($1, $2, 'created', NOW() - INTERVAL '2 hours')",
	)
	.bind(format!("{}stale_0001", synth::ORDER_PREFIX))
	.bind(synth::customer_id(0))
	.execute(&mut conn)
	.await
	.unwrap();
	sqlx::query(
		"INSERT INTO orders (order_id, customer_id, order_status, order_purchase_timestamp)
		 VALUES ('organic_0001', $1, 'created', NOW() - INTERVAL '2 hours')",
	)
	.bind(synth::customer_id(1))
	.execute(&mut conn)
	.await
	.unwrap();

	let mut deleted_total = 0u64;
	for _ in 0..10 {
		// Temp-table churn can fail by design; the cycle rolls back and
		// the next attempt proceeds.
		if let Ok(CycleOutcome::Committed { deleted, .. }) =
			maintenance::run_cycle(&mut conn, &mut rng, false).await
		{
			deleted_total += deleted;
		}
		if deleted_total > 0 {
			break;
		}
	}
	assert!(deleted_total >= 1, "aged synthetic order was never cleaned");

	let synthetic_left = count(
		&mut conn,
		"SELECT COUNT(*) FROM orders WHERE order_id = 'load_order_stale_0001'",
	)
	.await;
	assert_eq!(synthetic_left, 0);
	let organic_left = count(
		&mut conn,
		"SELECT COUNT(*) FROM orders WHERE order_id = 'organic_0001'",
	)
	.await;
	assert_eq!(organic_left, 1, "non-prefixed rows must never be cleaned");
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
async fn backfill_inserts_growing_days() {
	use storeload_core::workload::backfill;

	let (_container, settings) = start_postgres().await;
	let mut conn = connect_with_retry(&settings).await;
	let mut rng = StdRng::seed_from_u64(7);
	seed::seed_all(&mut conn, &settings.seed, &settings.retry, &mut rng)
		.await
		.unwrap();

	let mut ceiling = 25;
	let mut counts = Vec::new();
	for _ in 0..3 {
		match backfill::backfill_one_day(&mut conn, &mut rng, ceiling).await.unwrap() {
			Some(plan) => {
				counts.push(plan.orders);
				ceiling = plan.next_ceiling;
			}
			None => break,
		}
	}
	// Once a day lands orders, every following day must land more. A
	// zero-order first day restarts the series, as in a fresh database.
	for pair in counts.windows(2) {
		if pair[0] > 0 {
			assert!(pair[1] > pair[0], "daily counts must grow: {counts:?}");
		}
	}

	let backfilled = count(
		&mut conn,
		"SELECT COUNT(*) FROM orders WHERE order_id LIKE 'bb3b61a129a%'",
	)
	.await;
	assert_eq!(backfilled, counts.iter().sum::<i64>());
}
