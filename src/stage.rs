//! Scan-and-stage: one parameterized procedure replacing a per-table zoo.
//!
//! Scans a configured wide-column table end-to-end by page, converts each
//! page's items to plain JSON rows, and uploads every page as a
//! newline-delimited JSON object under the configured bucket and prefix.
//! The staged objects are what the catalog registers as queryable tables;
//! the query side of this crate never invokes staging and only assumes the
//! data eventually becomes queryable.
//!
//! A failed page upload is logged and staging continues; a scan failure
//! aborts the run for that source.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::{Config, StageSourceConfig};
use crate::dynamo::DynamoClient;
use crate::traits::ObjectStore;

/// Stage one configured source, or every source (`"all"`).
pub async fn run_stage(
    config: &Config,
    dynamo: &DynamoClient,
    store: &dyn ObjectStore,
    source: &str,
) -> Result<()> {
    if config.stage.is_empty() {
        bail!("no [stage.<name>] sources configured");
    }

    if source == "all" {
        for (name, source_config) in &config.stage {
            if let Err(e) = stage_source(dynamo, store, name, source_config).await {
                error!(source = name.as_str(), error = %e, "staging failed");
            }
        }
        return Ok(());
    }

    match config.stage.get(source) {
        Some(source_config) => stage_source(dynamo, store, source, source_config).await,
        None => bail!(
            "Unknown stage source: '{}'. Available: {}",
            source,
            config
                .stage
                .keys()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

async fn stage_source(
    dynamo: &DynamoClient,
    store: &dyn ObjectStore,
    name: &str,
    config: &StageSourceConfig,
) -> Result<()> {
    info!(source = name, table = %config.table, "staging scan started");

    let mut start_key: Option<Value> = None;
    let mut page_index = 0usize;
    let mut uploaded = 0usize;

    loop {
        let page = dynamo
            .scan(&config.table, start_key.as_ref(), config.page_size)
            .await
            .with_context(|| format!("scan failed for table {}", config.table))?;

        if page.items.is_empty() {
            warn!(source = name, page_index, "page contained no items");
        } else {
            let key = page_key(&config.prefix, page_index);
            let body = ndjson(&page.items)?;
            match store.put_object(&config.bucket, &key, body).await {
                Ok(()) => {
                    uploaded += 1;
                    info!(source = name, key, rows = page.items.len(), "page uploaded");
                }
                Err(e) => {
                    error!(source = name, key, error = %e, "page upload failed");
                }
            }
            page_index += 1;
        }

        match page.last_evaluated_key {
            Some(key) => start_key = Some(key),
            None => break,
        }
    }

    info!(source = name, pages = page_index, uploaded, "staging scan finished");
    Ok(())
}

/// Object key for one staged page.
fn page_key(prefix: &str, index: usize) -> String {
    format!("{prefix}/{prefix}_page_{index}.json")
}

/// Serialize items as newline-delimited JSON.
fn ndjson(items: &[Value]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for item in items {
        serde_json::to_writer(&mut out, item)?;
        out.push(b'\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn page_keys_follow_the_prefix_convention() {
        assert_eq!(page_key("reportes", 0), "reportes/reportes_page_0.json");
        assert_eq!(page_key("inventory", 7), "inventory/inventory_page_7.json");
    }

    #[test]
    fn ndjson_is_one_object_per_line() {
        let items = vec![json!({"a": 1}), json!({"b": "two"})];
        let body = ndjson(&items).unwrap();
        let text = String::from_utf8(body).unwrap();
        assert_eq!(text, "{\"a\":1}\n{\"b\":\"two\"}\n");
    }

    #[test]
    fn ndjson_of_nothing_is_empty() {
        assert!(ndjson(&[]).unwrap().is_empty());
    }
}
