//! Wide-column store (DynamoDB) client for the staging side.
//!
//! Supports exactly what staging needs: a paged `Scan` over one table, with
//! the attribute-typed wire values converted into plain JSON rows.

use anyhow::{bail, Context, Result};
use serde_json::{json, Map, Number, Value};

use crate::aws::{sign_request, AwsCredentials};

const JSON_PROTOCOL: &str = "application/x-amz-json-1.0";

/// One page of a table scan.
pub struct ScanPage {
    /// Items converted to plain JSON objects.
    pub items: Vec<Value>,
    /// Pagination cursor, kept in wire form for the next request.
    pub last_evaluated_key: Option<Value>,
}

pub struct DynamoClient {
    client: reqwest::Client,
    region: String,
    creds: AwsCredentials,
}

impl DynamoClient {
    pub fn new(region: impl Into<String>, creds: AwsCredentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            region: region.into(),
            creds,
        }
    }

    /// Scan one page of `table`, resuming from `exclusive_start_key` if set.
    pub async fn scan(
        &self,
        table: &str,
        exclusive_start_key: Option<&Value>,
        limit: Option<u32>,
    ) -> Result<ScanPage> {
        let mut body = json!({ "TableName": table });
        if let Some(key) = exclusive_start_key {
            body["ExclusiveStartKey"] = key.clone();
        }
        if let Some(limit) = limit {
            body["Limit"] = json!(limit);
        }

        let host = format!("dynamodb.{}.amazonaws.com", self.region);
        let url = format!("https://{}/", host);
        let payload = serde_json::to_vec(&body)?;

        let headers = sign_request(
            &self.creds,
            &self.region,
            "dynamodb",
            "POST",
            &host,
            "/",
            "",
            &[
                ("content-type", JSON_PROTOCOL),
                ("x-amz-target", "DynamoDB_20120810.Scan"),
            ],
            &payload,
        );

        let mut req = self.client.post(&url).body(payload);
        for (name, value) in &headers {
            req = req.header(name, value);
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("Scan request failed for table {}", table))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!(
                "DynamoDB Scan failed (HTTP {}) for table '{}': {}",
                status,
                table,
                body.chars().take(500).collect::<String>()
            );
        }

        let decoded: Value = resp.json().await.context("Scan returned malformed JSON")?;

        let items = decoded["Items"]
            .as_array()
            .map(|items| items.iter().map(plain_item).collect())
            .unwrap_or_default();

        let last_evaluated_key = match &decoded["LastEvaluatedKey"] {
            Value::Null => None,
            key => Some(key.clone()),
        };

        Ok(ScanPage {
            items,
            last_evaluated_key,
        })
    }
}

/// Convert one attribute-typed item into a plain JSON object.
pub fn plain_item(item: &Value) -> Value {
    match item.as_object() {
        Some(attrs) => Value::Object(
            attrs
                .iter()
                .map(|(name, attr)| (name.clone(), plain_value(attr)))
                .collect(),
        ),
        None => Value::Object(Map::new()),
    }
}

/// Convert one attribute-typed value (`{"S": ...}`, `{"N": ...}`, ...) into
/// its plain JSON form. Numbers that don't parse stay strings; unknown
/// attribute types become null.
pub fn plain_value(attr: &Value) -> Value {
    let Some(obj) = attr.as_object() else {
        return Value::Null;
    };
    let Some((kind, inner)) = obj.iter().next() else {
        return Value::Null;
    };

    match (kind.as_str(), inner) {
        ("S", Value::String(s)) => Value::String(s.clone()),
        ("N", Value::String(n)) => parse_number(n),
        ("BOOL", Value::Bool(b)) => Value::Bool(*b),
        ("NULL", _) => Value::Null,
        ("L", Value::Array(items)) => Value::Array(items.iter().map(plain_value).collect()),
        ("M", Value::Object(attrs)) => Value::Object(
            attrs
                .iter()
                .map(|(name, attr)| (name.clone(), plain_value(attr)))
                .collect(),
        ),
        ("SS", Value::Array(items)) => Value::Array(items.clone()),
        ("NS", Value::Array(items)) => Value::Array(
            items
                .iter()
                .map(|n| match n {
                    Value::String(n) => parse_number(n),
                    other => other.clone(),
                })
                .collect(),
        ),
        // Binary values stay in their transport encoding.
        ("B", Value::String(b)) => Value::String(b.clone()),
        ("BS", Value::Array(items)) => Value::Array(items.clone()),
        _ => Value::Null,
    }
}

fn parse_number(raw: &str) -> Value {
    match raw.parse::<Number>() {
        Ok(n) => Value::Number(n),
        Err(_) => Value::String(raw.to_string()),
    }
}
