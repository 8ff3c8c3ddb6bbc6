//! Reference-data seeding.
//!
//! Populates customers, products, and sellers in batches, committing per
//! batch and skipping rows whose primary key already exists. Running the
//! seeder twice therefore leaves synthetic row counts unchanged.

use rand::rngs::StdRng;
use sqlx::postgres::PgConnection;
use sqlx::{Connection, Postgres, QueryBuilder};

use crate::config::{RetryPolicy, SeedSettings};
use crate::error::{LoadError, LoadResult};
use crate::synth;

/// Rows actually inserted per entity (conflicts excluded).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
	pub customers: u64,
	pub products: u64,
	pub sellers: u64,
}

/// Seed all three reference tables, in the order the workloads depend on
/// them.
pub async fn seed_all(
	conn: &mut PgConnection,
	settings: &SeedSettings,
	retry: &RetryPolicy,
	rng: &mut StdRng,
) -> LoadResult<SeedReport> {
	let customers = seed_customers(conn, settings, retry, rng).await?;
	let products = seed_products(conn, settings, retry, rng).await?;
	let sellers = seed_sellers(conn, settings, retry, rng).await?;
	let report = SeedReport {
		customers,
		products,
		sellers,
	};
	tracing::info!(
		customers = report.customers,
		products = report.products,
		sellers = report.sellers,
		"reference seeding finished"
	);
	Ok(report)
}

pub async fn seed_customers(
	conn: &mut PgConnection,
	settings: &SeedSettings,
	retry: &RetryPolicy,
	rng: &mut StdRng,
) -> LoadResult<u64> {
	let rows: Vec<synth::CustomerRow> = (0..settings.customers)
		.map(|i| synth::customer_row(i, rng))
		.collect();
	let mut inserted = 0u64;
	for batch in rows.chunks(settings.customer_batch.max(1)) {
		inserted += commit_batch(conn, retry, "customers", || {
			let mut builder = QueryBuilder::new(
				"INSERT INTO customers (customer_id, customer_unique_id, \
				 customer_zip_code_prefix, customer_city, customer_state) ",
			);
			builder.push_values(batch, |mut b, row| {
				b.push_bind(&row.id)
					.push_bind(&row.unique_id)
					.push_bind(row.zip_prefix)
					.push_bind(row.city)
					.push_bind(row.state);
			});
			builder.push(" ON CONFLICT (customer_id) DO NOTHING");
			builder
		})
		.await?;
	}
	Ok(inserted)
}

pub async fn seed_products(
	conn: &mut PgConnection,
	settings: &SeedSettings,
	retry: &RetryPolicy,
	rng: &mut StdRng,
) -> LoadResult<u64> {
	let rows: Vec<synth::ProductRow> = (0..settings.products)
		.map(|i| synth::product_row(i, rng))
		.collect();
	let mut inserted = 0u64;
	for batch in rows.chunks(settings.product_batch.max(1)) {
		inserted += commit_batch(conn, retry, "products", || {
			// The misspelled column names are how the Olist dataset ships.
			let mut builder = QueryBuilder::new(
				"INSERT INTO products (product_id, product_category_name, \
				 product_name_lenght, product_description_lenght, product_photos_qty, \
				 product_weight_g, product_length_cm, product_height_cm, product_width_cm) ",
			);
			builder.push_values(batch, |mut b, row| {
				b.push_bind(&row.id)
					.push_bind(row.category)
					.push_bind(row.name_length)
					.push_bind(row.description_length)
					.push_bind(row.photos)
					.push_bind(row.weight_g)
					.push_bind(row.length_cm)
					.push_bind(row.height_cm)
					.push_bind(row.width_cm);
			});
			builder.push(" ON CONFLICT (product_id) DO NOTHING");
			builder
		})
		.await?;
	}
	Ok(inserted)
}

pub async fn seed_sellers(
	conn: &mut PgConnection,
	settings: &SeedSettings,
	retry: &RetryPolicy,
	rng: &mut StdRng,
) -> LoadResult<u64> {
	let rows: Vec<synth::SellerRow> = (0..settings.sellers)
		.map(|i| synth::seller_row(i, rng))
		.collect();
	let mut inserted = 0u64;
	for batch in rows.chunks(settings.seller_batch.max(1)) {
		inserted += commit_batch(conn, retry, "sellers", || {
			let mut builder = QueryBuilder::new(
				"INSERT INTO sellers (seller_id, seller_zip_code_prefix, \
				 seller_city, seller_state) ",
			);
			builder.push_values(batch, |mut b, row| {
				b.push_bind(&row.id)
					.push_bind(row.zip_prefix)
					.push_bind(row.city)
					.push_bind(row.state);
			});
			builder.push(" ON CONFLICT (seller_id) DO NOTHING");
			builder
		})
		.await?;
	}
	Ok(inserted)
}

/// Run one batch insert inside its own transaction, retrying a failed
/// batch after a backoff until the attempt budget runs out. The builder
/// is recreated per attempt because executing consumes its bind state.
async fn commit_batch<'a, F>(
	conn: &mut PgConnection,
	retry: &RetryPolicy,
	entity: &'static str,
	make: F,
) -> LoadResult<u64>
where
	F: Fn() -> QueryBuilder<'a, Postgres>,
{
	let mut attempt = 0u32;
	loop {
		attempt += 1;
		let mut builder = make();

		let outcome: Result<u64, sqlx::Error> = async {
			let mut tx = conn.begin().await?;
			let result = builder.build().execute(&mut *tx).await?;
			tx.commit().await?;
			Ok(result.rows_affected())
		}
		.await;

		match outcome {
			Ok(rows) => {
				tracing::info!(entity, rows, "committed seed batch");
				return Ok(rows);
			}
			Err(source) if attempt < retry.max_attempts => {
				let delay = retry.delay_for(attempt);
				tracing::warn!(
					entity,
					error = %source,
					attempt,
					"seed batch failed, rolled back, retrying"
				);
				tokio::time::sleep(delay).await;
			}
			Err(source) => {
				return Err(LoadError::RetriesExhausted {
					attempts: attempt,
					source,
				});
			}
		}
	}
}

/// Count rows whose primary key carries the given synthetic prefix.
pub async fn synthetic_count(
	conn: &mut PgConnection,
	table: &'static str,
	id_column: &'static str,
	prefix: &str,
) -> LoadResult<i64> {
	let sql = format!("SELECT COUNT(*) FROM {table} WHERE {id_column} LIKE $1");
	let count: i64 = sqlx::query_scalar(&sql)
		.bind(format!("{prefix}%"))
		.fetch_one(conn)
		.await?;
	Ok(count)
}
