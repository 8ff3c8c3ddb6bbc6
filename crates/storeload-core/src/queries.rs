//! Fixed SQL catalogs the workloads sample from.
//!
//! The read catalog spans simple counts, group-bys, joins, subqueries,
//! window functions, and date filters so a dashboard sees a varied query
//! mix. Update operations are each scoped by a nested `SELECT .. LIMIT`
//! so no single iteration touches an unbounded row set.

/// A named read-only query.
#[derive(Debug, Clone, Copy)]
pub struct ReadQuery {
	pub name: &'static str,
	pub sql: &'static str,
}

pub const READ_QUERIES: &[ReadQuery] = &[
	ReadQuery {
		name: "count_customers",
		sql: "SELECT COUNT(*) FROM customers",
	},
	ReadQuery {
		name: "count_products",
		sql: "SELECT COUNT(*) FROM products",
	},
	ReadQuery {
		name: "count_orders",
		sql: "SELECT COUNT(*) FROM orders",
	},
	ReadQuery {
		name: "count_sellers",
		sql: "SELECT COUNT(*) FROM sellers",
	},
	ReadQuery {
		name: "avg_item_price",
		sql: "SELECT AVG(price) FROM order_items",
	},
	ReadQuery {
		name: "total_payments",
		sql: "SELECT SUM(payment_value) FROM order_payments",
	},
	ReadQuery {
		name: "customers_by_state",
		sql: "SELECT customer_state, COUNT(*) FROM customers GROUP BY customer_state",
	},
	ReadQuery {
		name: "products_by_category",
		sql: "SELECT product_category_name, COUNT(*) FROM products GROUP BY product_category_name",
	},
	ReadQuery {
		name: "orders_by_status",
		sql: "SELECT order_status, COUNT(*) FROM orders GROUP BY order_status",
	},
	ReadQuery {
		name: "sellers_by_state",
		sql: "SELECT seller_state, COUNT(*) FROM sellers GROUP BY seller_state",
	},
	ReadQuery {
		name: "payments_by_type",
		sql: "SELECT payment_type, COUNT(*) FROM order_payments GROUP BY payment_type",
	},
	ReadQuery {
		name: "orders_per_customer_state",
		sql: "\
SELECT c.customer_state, COUNT(DISTINCT o.order_id) AS order_count
FROM customers c
LEFT JOIN orders o ON c.customer_id = o.customer_id
GROUP BY c.customer_state
ORDER BY order_count DESC",
	},
	ReadQuery {
		name: "avg_price_per_category",
		sql: "\
SELECT p.product_category_name, AVG(oi.price) AS avg_price
FROM products p
JOIN order_items oi ON p.product_id = oi.product_id
GROUP BY p.product_category_name
ORDER BY avg_price DESC",
	},
	ReadQuery {
		name: "orders_per_seller_state",
		sql: "\
SELECT s.seller_state, COUNT(DISTINCT oi.order_id) AS orders_count
FROM sellers s
JOIN order_items oi ON s.seller_id = oi.seller_id
GROUP BY s.seller_state
ORDER BY orders_count DESC",
	},
	ReadQuery {
		name: "orders_by_hour",
		sql: "\
SELECT EXTRACT(HOUR FROM order_purchase_timestamp) AS hour, COUNT(*) AS orders
FROM orders
GROUP BY hour
ORDER BY hour",
	},
	ReadQuery {
		name: "avg_payment_by_type",
		sql: "\
SELECT payment_type, AVG(payment_value) AS avg_payment
FROM order_payments
GROUP BY payment_type
ORDER BY avg_payment DESC",
	},
	ReadQuery {
		name: "active_customer_states",
		sql: "\
SELECT customer_state, avg_orders
FROM (
    SELECT c.customer_state, COUNT(o.order_id) AS avg_orders
    FROM customers c
    LEFT JOIN orders o ON c.customer_id = o.customer_id
    GROUP BY c.customer_state
) sub
WHERE avg_orders > 0
ORDER BY avg_orders DESC",
	},
	ReadQuery {
		name: "top_prices_per_category",
		sql: "\
SELECT product_category_name, price_rank
FROM (
    SELECT p.product_category_name, oi.price,
           RANK() OVER (PARTITION BY p.product_category_name ORDER BY oi.price DESC) AS price_rank
    FROM products p
    JOIN order_items oi ON p.product_id = oi.product_id
) ranked
WHERE price_rank <= 3",
	},
	ReadQuery {
		name: "daily_orders_last_month",
		sql: "\
SELECT DATE(order_purchase_timestamp) AS order_date, COUNT(*) AS daily_orders
FROM orders
WHERE order_purchase_timestamp > NOW() - INTERVAL '30 days'
GROUP BY order_date
ORDER BY order_date DESC",
	},
];

/// A named UPDATE with the row bound enforced by its nested subquery.
#[derive(Debug, Clone, Copy)]
pub struct UpdateOp {
	pub name: &'static str,
	pub sql: &'static str,
	/// The `LIMIT` in the scoping subquery; affected rows never exceed it.
	pub limit: u64,
}

pub const UPDATE_OPS: &[UpdateOp] = &[
	UpdateOp {
		name: "promote_shipped_to_delivered",
		limit: 5,
		sql: "\
UPDATE orders
SET order_status = 'delivered',
    order_delivered_customer_date = NOW()
WHERE order_status = 'shipped'
AND order_purchase_timestamp < NOW() - INTERVAL '2 days'
AND order_id IN (
    SELECT order_id FROM orders
    WHERE order_status = 'shipped'
    AND order_purchase_timestamp < NOW() - INTERVAL '2 days'
    ORDER BY order_purchase_timestamp
    LIMIT 5
)",
	},
	UpdateOp {
		name: "jitter_product_weight",
		limit: 3,
		sql: "\
UPDATE products
SET product_weight_g = product_weight_g + (random() * 10),
    product_photos_qty = GREATEST(1, product_photos_qty - 1)
WHERE product_id IN (
    SELECT product_id FROM products
    WHERE product_id LIKE 'load_prod_%'
    ORDER BY random()
    LIMIT 3
)",
	},
	UpdateOp {
		name: "jitter_recent_item_prices",
		limit: 10,
		sql: "\
UPDATE order_items
SET price = price * (0.9 + random() * 0.2)
WHERE ctid IN (
    SELECT oi.ctid FROM order_items oi
    JOIN orders o ON o.order_id = oi.order_id
    WHERE o.order_purchase_timestamp > NOW() - INTERVAL '1 hour'
    ORDER BY o.order_purchase_timestamp
    LIMIT 10
)",
	},
	UpdateOp {
		name: "fix_customer_city_casing",
		limit: 8,
		sql: "\
UPDATE customers
SET customer_city =
    CASE
        WHEN customer_city = 'Sao Paulo' THEN 'São Paulo'
        WHEN customer_city = 'Rio de Janeiro' THEN 'Rio'
        ELSE customer_city
    END
WHERE customer_id IN (
    SELECT customer_id FROM customers
    WHERE customer_id LIKE 'load_cust_%'
    ORDER BY random()
    LIMIT 8
)",
	},
	UpdateOp {
		name: "bump_credit_card_installments",
		limit: 6,
		sql: "\
UPDATE order_payments
SET payment_installments = payment_installments + 1,
    payment_value = payment_value * 1.1
WHERE ctid IN (
    SELECT ctid FROM order_payments
    WHERE payment_type = 'credit_card'
    ORDER BY random()
    LIMIT 6
)",
	},
];

/// Temp-table churn the maintenance workload samples two of per cycle.
pub const MAINTENANCE_STATEMENTS: &[&str] = &[
	"CREATE TEMP TABLE IF NOT EXISTS temp_session_data AS SELECT * FROM orders WHERE order_purchase_timestamp > NOW() - INTERVAL '1 day'",
	"CREATE TEMP TABLE IF NOT EXISTS temp_products AS SELECT * FROM products WHERE product_category_name IN ('electronics', 'books')",
	"DROP TABLE IF EXISTS temp_old_data",
	"CREATE TEMP TABLE temp_old_data AS SELECT * FROM orders WHERE order_purchase_timestamp < NOW() - INTERVAL '30 days'",
];

/// Tables eligible for the occasional `ANALYZE`.
pub const ANALYZE_TABLES: &[&str] = &["orders", "customers", "products", "order_items", "sellers"];

/// Bound on aged synthetic orders removed per maintenance cycle.
pub const CLEANUP_LIMIT: u64 = 15;

/// Delete a bounded batch of synthetic orders older than one hour. Only
/// rows carrying the generator's order prefix are eligible.
pub const CLEANUP_AGED_ORDERS: &str = "\
DELETE FROM orders
WHERE order_id LIKE 'load_order_%'
AND order_purchase_timestamp < NOW() - INTERVAL '1 hour'
AND order_id IN (
    SELECT order_id FROM orders
    WHERE order_id LIKE 'load_order_%'
    AND order_purchase_timestamp < NOW() - INTERVAL '1 hour'
    ORDER BY order_purchase_timestamp
    LIMIT 15
)";

/// Statement guaranteed to fail, used to exercise rollback handling.
pub const FAILING_STATEMENT: &str = "UPDATE storeload_no_such_table SET value = 1";
