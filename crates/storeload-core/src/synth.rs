//! Synthetic row values.
//!
//! Every generated primary key carries a recognizable prefix so synthetic
//! rows can be told apart from the organic sample data and cleaned up by
//! the maintenance workload.

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;

/// Prefix for seeded customer ids (`load_cust_00042`).
pub const CUSTOMER_PREFIX: &str = "load_cust_";
/// Prefix for seeded product ids.
pub const PRODUCT_PREFIX: &str = "load_prod_";
/// Prefix for seeded seller ids.
pub const SELLER_PREFIX: &str = "load_seller_";
/// Prefix for orders created by the write workload.
pub const ORDER_PREFIX: &str = "load_order_";
/// Prefix for orders created by the historical backfill.
pub const BACKFILL_ORDER_PREFIX: &str = "bb3b61a129a";

pub const CITIES: &[&str] = &[
	"Sao Paulo",
	"Rio de Janeiro",
	"Belo Horizonte",
	"Porto Alegre",
	"Salvador",
	"Brasilia",
	"Fortaleza",
	"Recife",
	"Curitiba",
	"Manaus",
];

pub const STATES: &[&str] = &["SP", "RJ", "MG", "RS", "BA", "DF", "CE", "PE", "PR", "AM"];

pub const PRODUCT_CATEGORIES: &[&str] = &[
	"electronics",
	"home",
	"books",
	"sports",
	"fashion",
	"beauty",
	"toys",
	"garden",
	"tools",
	"health",
	"automotive",
	"baby",
];

pub const PAYMENT_TYPES: &[&str] = &["credit_card", "boleto", "voucher", "debit_card"];

/// Statuses new synthetic orders start in.
pub const ORDER_STATUSES: &[&str] = &["processing", "approved", "shipped", "created"];

pub fn customer_id(index: usize) -> String {
	format!("{CUSTOMER_PREFIX}{index:05}")
}

pub fn product_id(index: usize) -> String {
	format!("{PRODUCT_PREFIX}{index:05}")
}

pub fn seller_id(index: usize) -> String {
	format!("{SELLER_PREFIX}{index:05}")
}

/// Order id in the shape the write workload uses:
/// `load_order_{unix-seconds}_{rand4}`.
pub fn order_id(rng: &mut impl Rng) -> String {
	let suffix: u16 = rng.gen_range(1000..=9999);
	format!("{ORDER_PREFIX}{}_{suffix}", Utc::now().timestamp())
}

/// Order id in the shape the backfill uses, recognizable by its fixed
/// prefix and padded with a hash-looking tail.
pub fn backfill_order_id(rng: &mut impl Rng) -> String {
	let suffix: u16 = rng.gen_range(1000..=9999);
	format!(
		"{BACKFILL_ORDER_PREFIX}{}_{suffix}b10bb81a4770f3b1",
		Utc::now().timestamp()
	)
}

/// One seeded customer row.
#[derive(Debug, Clone)]
pub struct CustomerRow {
	pub id: String,
	pub unique_id: String,
	pub zip_prefix: i32,
	pub city: &'static str,
	pub state: &'static str,
}

pub fn customer_row(index: usize, rng: &mut impl Rng) -> CustomerRow {
	CustomerRow {
		id: customer_id(index),
		unique_id: format!("unique_{index:05}"),
		zip_prefix: rng.gen_range(1000..=99999),
		city: CITIES.choose(rng).copied().unwrap_or("Sao Paulo"),
		state: STATES.choose(rng).copied().unwrap_or("SP"),
	}
}

/// One seeded product row.
#[derive(Debug, Clone)]
pub struct ProductRow {
	pub id: String,
	pub category: &'static str,
	pub name_length: i32,
	pub description_length: i32,
	pub photos: i32,
	pub weight_g: i32,
	pub length_cm: i32,
	pub height_cm: i32,
	pub width_cm: i32,
}

pub fn product_row(index: usize, rng: &mut impl Rng) -> ProductRow {
	ProductRow {
		id: product_id(index),
		category: PRODUCT_CATEGORIES.choose(rng).copied().unwrap_or("home"),
		name_length: rng.gen_range(10..=100),
		description_length: rng.gen_range(50..=500),
		photos: rng.gen_range(1..=5),
		weight_g: rng.gen_range(100..=5000),
		length_cm: rng.gen_range(10..=50),
		height_cm: rng.gen_range(5..=30),
		width_cm: rng.gen_range(5..=30),
	}
}

/// One seeded seller row. Sellers only draw from the first five cities.
#[derive(Debug, Clone)]
pub struct SellerRow {
	pub id: String,
	pub zip_prefix: i32,
	pub city: &'static str,
	pub state: &'static str,
}

pub fn seller_row(index: usize, rng: &mut impl Rng) -> SellerRow {
	SellerRow {
		id: seller_id(index),
		zip_prefix: rng.gen_range(1000..=99999),
		city: CITIES[..5].choose(rng).copied().unwrap_or("Sao Paulo"),
		state: STATES[..5].choose(rng).copied().unwrap_or("SP"),
	}
}

/// Fields for one synthetic order plus its lines and payment, drawn by the
/// write workload. Item and payment presence mirror the observed shape of
/// the organic data: most orders have lines, nearly all have a payment.
#[derive(Debug, Clone)]
pub struct OrderDraw {
	pub order_id: String,
	pub customer_id: String,
	pub status: &'static str,
	pub items: Vec<ItemDraw>,
	pub payment: Option<PaymentDraw>,
}

#[derive(Debug, Clone)]
pub struct ItemDraw {
	pub line: i32,
	pub product_id: String,
	pub seller_id: String,
	pub price: f64,
	pub freight: f64,
}

#[derive(Debug, Clone)]
pub struct PaymentDraw {
	pub sequential: i32,
	pub payment_type: &'static str,
	pub installments: i32,
	pub value: f64,
}

/// Round to cents, the way prices are stored.
fn cents(value: f64) -> f64 {
	(value * 100.0).round() / 100.0
}

pub fn order_draw(rng: &mut impl Rng, seed: &crate::config::SeedSettings) -> OrderDraw {
	let items = if rng.gen_bool(0.8) {
		let count = rng.gen_range(0..=4);
		(1..=count)
			.map(|line| ItemDraw {
				line,
				product_id: product_id(rng.gen_range(0..seed.products)),
				seller_id: seller_id(rng.gen_range(0..seed.sellers)),
				price: cents(rng.gen_range(10.0..=500.0)),
				freight: cents(rng.gen_range(5.0..=50.0)),
			})
			.collect()
	} else {
		Vec::new()
	};
	let payment = rng.gen_bool(0.9).then(|| PaymentDraw {
		sequential: rng.gen_range(1..=3),
		payment_type: PAYMENT_TYPES.choose(rng).copied().unwrap_or("credit_card"),
		installments: rng.gen_range(1..=12),
		value: cents(rng.gen_range(20.0..=600.0)),
	});
	OrderDraw {
		order_id: order_id(rng),
		customer_id: customer_id(rng.gen_range(0..seed.customers)),
		status: ORDER_STATUSES.choose(rng).copied().unwrap_or("created"),
		items,
		payment,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::SeedSettings;
	use rand::rngs::StdRng;
	use rand::SeedableRng;
	use rstest::rstest;

	#[rstest]
	fn ids_are_zero_padded_and_prefixed() {
		assert_eq!(customer_id(7), "load_cust_00007");
		assert_eq!(product_id(42), "load_prod_00042");
		assert_eq!(seller_id(99), "load_seller_00099");
	}

	#[rstest]
	fn order_ids_carry_their_prefixes() {
		let mut rng = StdRng::seed_from_u64(7);
		assert!(order_id(&mut rng).starts_with(ORDER_PREFIX));
		assert!(backfill_order_id(&mut rng).starts_with(BACKFILL_ORDER_PREFIX));
	}

	#[rstest]
	fn order_draw_stays_within_documented_bounds() {
		let mut rng = StdRng::seed_from_u64(42);
		let seed = SeedSettings::default();
		for _ in 0..500 {
			let draw = order_draw(&mut rng, &seed);
			assert!(draw.items.len() <= 4);
			for (i, item) in draw.items.iter().enumerate() {
				assert_eq!(item.line as usize, i + 1);
				assert!((10.0..=500.0).contains(&item.price));
				assert!((5.0..=50.0).contains(&item.freight));
			}
			if let Some(payment) = &draw.payment {
				assert!((1..=12).contains(&payment.installments));
				assert!((1..=3).contains(&payment.sequential));
			}
			assert!(draw.customer_id.starts_with(CUSTOMER_PREFIX));
		}
	}

	#[rstest]
	fn draw_references_only_seeded_rows() {
		let mut rng = StdRng::seed_from_u64(3);
		let seed = SeedSettings::default();
		for _ in 0..200 {
			let draw = order_draw(&mut rng, &seed);
			let customer_index: usize = draw.customer_id[CUSTOMER_PREFIX.len()..].parse().unwrap();
			assert!(customer_index < seed.customers);
			for item in &draw.items {
				let product_index: usize = item.product_id[PRODUCT_PREFIX.len()..].parse().unwrap();
				let seller_index: usize = item.seller_id[SELLER_PREFIX.len()..].parse().unwrap();
				assert!(product_index < seed.products);
				assert!(seller_index < seed.sellers);
			}
		}
	}

	#[rstest]
	fn prices_are_rounded_to_cents() {
		let mut rng = StdRng::seed_from_u64(11);
		let seed = SeedSettings::default();
		for _ in 0..100 {
			let draw = order_draw(&mut rng, &seed);
			for item in &draw.items {
				assert!((item.price * 100.0 - (item.price * 100.0).round()).abs() < 1e-9);
			}
		}
	}
}
