//! Per-entity transformation rules.
//!
//! One pure function per entity kind, each turning catalog [`RawRow`]s into
//! load-ready records. Nothing downstream of these functions sees catalog
//! column names again.
//!
//! All kinds share one failure policy, per record: a row missing a required
//! column, a non-numeric value where a number is required, or an invalid
//! order item is logged and skipped; the rest of the batch continues. This
//! matches the loader's per-record isolation. Malformed nested structured
//! text is not even a per-record failure — [`repair`] degrades it to an
//! empty object and field extraction falls back to defaults.

use serde_json::Value;
use std::collections::BTreeSet;
use tracing::warn;

use crate::models::{
    BillingRecord, InventoryRecord, Order, OrderProduct, Product, RawRow, Report, SqlValue,
};
use crate::repair::repair;

/// Look up a required pass-through column, warning once per missing row.
fn required<'a>(row: &'a RawRow, column: &str, entity: &str) -> Option<&'a str> {
    match row.get(column) {
        Some(value) => Some(value.as_str()),
        None => {
            warn!(entity, column, ?row, "row is missing a required column, skipping record");
            None
        }
    }
}

/// Extract a scalar from a repaired object, preserving the repair's typing.
/// Missing or non-scalar values fall back to `default`.
fn scalar_field(obj: &Value, key: &str, default: SqlValue) -> SqlValue {
    match obj.get(key) {
        Some(Value::String(s)) => SqlValue::Text(s.clone()),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Int(i)
            } else {
                SqlValue::Float(n.as_f64().unwrap_or_default())
            }
        }
        _ => default,
    }
}

/// Parse a numeric column, warning and yielding `None` on bad input.
fn numeric(row: &RawRow, column: &str, entity: &str) -> Option<f64> {
    let raw = required(row, column, entity)?;
    match raw.trim().parse::<f64>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(entity, column, value = raw, ?row, "non-numeric value, skipping record");
            None
        }
    }
}

/// Reports: repair the `data` column and lift out the sales totals.
pub fn transform_reports(rows: &[RawRow]) -> Vec<Report> {
    rows.iter()
        .filter_map(|row| {
            let tenant_id = required(row, "tenant_id", "reports")?;
            let report_id = required(row, "report_id", "reports")?;
            let data = repair(row.get("data").map(String::as_str).unwrap_or_default());
            Some(Report {
                tenant_id: tenant_id.to_string(),
                report_id: report_id.to_string(),
                total_sales: scalar_field(&data, "total_sales", SqlValue::Int(0)),
                total_items: scalar_field(&data, "total_items", SqlValue::Int(0)),
            })
        })
        .collect()
}

/// Billing: repair `payment_details`, pass the identifiers through.
pub fn transform_billing(rows: &[RawRow]) -> Vec<BillingRecord> {
    rows.iter()
        .filter_map(|row| {
            let invoice_id = required(row, "invoice_id", "billing")?;
            let tenant_id = required(row, "tenant_id", "billing")?;
            let order_id = required(row, "order_id", "billing")?;
            let status = required(row, "status", "billing")?;
            let payment = repair(
                row.get("payment_details")
                    .map(String::as_str)
                    .unwrap_or_default(),
            );
            Some(BillingRecord {
                invoice_id: invoice_id.to_string(),
                tenant_id: tenant_id.to_string(),
                order_id: order_id.to_string(),
                method: payment
                    .get("method")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                amount: scalar_field(&payment, "amount", SqlValue::Int(0)),
                status: status.to_string(),
            })
        })
        .collect()
}

/// Inventory: coerce `stock_available`, pass `last_update` through as text.
pub fn transform_inventory(rows: &[RawRow]) -> Vec<InventoryRecord> {
    rows.iter()
        .filter_map(|row| {
            let product_id = required(row, "product_id", "inventory")?;
            let tenant_id = required(row, "tenant_id", "inventory")?;
            let last_update = required(row, "last_update", "inventory")?;
            let stock_available = numeric(row, "stock_available", "inventory")?;
            Some(InventoryRecord {
                product_id: product_id.to_string(),
                tenant_id: tenant_id.to_string(),
                stock_available,
                last_update: last_update.to_string(),
            })
        })
        .collect()
}

/// Products: same numeric policy for `price`.
pub fn transform_products(rows: &[RawRow]) -> Vec<Product> {
    rows.iter()
        .filter_map(|row| {
            let product_id = required(row, "product_id", "products")?;
            let tenant_id = required(row, "tenant_id", "products")?;
            let name = required(row, "name", "products")?;
            let description = required(row, "description", "products")?;
            let price = numeric(row, "price", "products")?;
            Some(Product {
                product_id: product_id.to_string(),
                tenant_id: tenant_id.to_string(),
                name: name.to_string(),
                price,
                description: description.to_string(),
            })
        })
        .collect()
}

/// Orders produce two outputs: the order headers, and a deduplicated set of
/// (order_id, product_id) pairs derived from each order's `items` column.
///
/// An order whose `items` does not repair to a list still emits its header;
/// it contributes no pairs. Items without a usable `product_id` or without a
/// `price` are skipped with a warning.
pub fn transform_orders(rows: &[RawRow]) -> (Vec<Order>, Vec<OrderProduct>) {
    let mut orders = Vec::new();
    let mut pairs = BTreeSet::new();

    for row in rows {
        let (Some(order_id), Some(tenant_id), Some(user_id), Some(status)) = (
            required(row, "order_id", "orders"),
            required(row, "tenant_id", "orders"),
            required(row, "user_id", "orders"),
            required(row, "status", "orders"),
        ) else {
            continue;
        };

        orders.push(Order {
            order_id: order_id.to_string(),
            tenant_id: tenant_id.to_string(),
            user_id: user_id.to_string(),
            status: status.to_string(),
        });

        let raw_items = row.get("items").map(String::as_str).unwrap_or_default();
        let items = repair(raw_items);
        let Value::Array(items) = items else {
            warn!(order_id, items = raw_items, "unexpected shape for order items, skipping them");
            continue;
        };

        for item in &items {
            let product_id = item.get("product_id").and_then(truthy_string);
            let has_price = item.get("price").is_some();
            match product_id {
                Some(product_id) if has_price => {
                    pairs.insert((order_id.to_string(), product_id));
                }
                _ => {
                    warn!(order_id, ?item, "invalid product entry in order items");
                }
            }
        }
    }

    let order_products = pairs
        .into_iter()
        .map(|(order_id, product_id)| OrderProduct {
            order_id,
            product_id,
        })
        .collect();

    (orders, order_products)
}

/// A usable identifier: present and not falsy (null, empty string, zero).
fn truthy_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}
