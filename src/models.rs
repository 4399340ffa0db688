//! Core data types that flow through the relay pipeline.
//!
//! `RawRow`s exist only between the fetch and transform stages; everything
//! downstream is a load-ready record independent of catalog column naming.

use std::collections::HashMap;

/// One catalog result row, exactly as parsed from the delimited result
/// object: column name → string value, no type coercion.
pub type RawRow = HashMap<String, String>;

/// A scalar headed for a parameterized insert.
///
/// Values extracted from repaired key=value text keep their string typing
/// (`"50"` stays `"50"`); the relational store coerces at the load boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Int(i64),
    Float(f64),
}

impl std::fmt::Display for SqlValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{}", s),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
        }
    }
}

/// A load-ready record flattened to (column, value) pairs. Column order is
/// the insert order; names become the insert's column list.
pub type LoadRow = Vec<(&'static str, SqlValue)>;

/// Conversion from a typed record into the loader's row shape.
pub trait IntoRow {
    fn into_row(self) -> LoadRow;
}

/// Per-tenant sales report summary.
#[derive(Debug, Clone)]
pub struct Report {
    pub tenant_id: String,
    pub report_id: String,
    pub total_sales: SqlValue,
    pub total_items: SqlValue,
}

impl IntoRow for Report {
    fn into_row(self) -> LoadRow {
        vec![
            ("tenant_id", SqlValue::Text(self.tenant_id)),
            ("report_id", SqlValue::Text(self.report_id)),
            ("total_sales", self.total_sales),
            ("total_items", self.total_items),
        ]
    }
}

/// One invoice with payment details lifted out of the repaired
/// `payment_details` column.
#[derive(Debug, Clone)]
pub struct BillingRecord {
    pub invoice_id: String,
    pub tenant_id: String,
    pub order_id: String,
    pub method: String,
    pub amount: SqlValue,
    pub status: String,
}

impl IntoRow for BillingRecord {
    fn into_row(self) -> LoadRow {
        vec![
            ("invoice_id", SqlValue::Text(self.invoice_id)),
            ("tenant_id", SqlValue::Text(self.tenant_id)),
            ("order_id", SqlValue::Text(self.order_id)),
            ("method", SqlValue::Text(self.method)),
            ("amount", self.amount),
            ("status", SqlValue::Text(self.status)),
        ]
    }
}

/// Current stock level for one product.
#[derive(Debug, Clone)]
pub struct InventoryRecord {
    pub product_id: String,
    pub tenant_id: String,
    pub stock_available: f64,
    pub last_update: String,
}

impl IntoRow for InventoryRecord {
    fn into_row(self) -> LoadRow {
        vec![
            ("product_id", SqlValue::Text(self.product_id)),
            ("tenant_id", SqlValue::Text(self.tenant_id)),
            ("stock_available", SqlValue::Float(self.stock_available)),
            ("last_update", SqlValue::Text(self.last_update)),
        ]
    }
}

/// Catalog product listing entry.
#[derive(Debug, Clone)]
pub struct Product {
    pub product_id: String,
    pub tenant_id: String,
    pub name: String,
    pub price: f64,
    pub description: String,
}

impl IntoRow for Product {
    fn into_row(self) -> LoadRow {
        vec![
            ("product_id", SqlValue::Text(self.product_id)),
            ("tenant_id", SqlValue::Text(self.tenant_id)),
            ("name", SqlValue::Text(self.name)),
            ("price", SqlValue::Float(self.price)),
            ("description", SqlValue::Text(self.description)),
        ]
    }
}

/// Order header, passed through from the catalog row.
#[derive(Debug, Clone)]
pub struct Order {
    pub order_id: String,
    pub tenant_id: String,
    pub user_id: String,
    pub status: String,
}

impl IntoRow for Order {
    fn into_row(self) -> LoadRow {
        vec![
            ("order_id", SqlValue::Text(self.order_id)),
            ("tenant_id", SqlValue::Text(self.tenant_id)),
            ("user_id", SqlValue::Text(self.user_id)),
            ("status", SqlValue::Text(self.status)),
        ]
    }
}

/// Derived order↔product junction. The transform guarantees each
/// (order_id, product_id) pair appears at most once.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct OrderProduct {
    pub order_id: String,
    pub product_id: String,
}

impl IntoRow for OrderProduct {
    fn into_row(self) -> LoadRow {
        vec![
            ("order_id", SqlValue::Text(self.order_id)),
            ("product_id", SqlValue::Text(self.product_id)),
        ]
    }
}
