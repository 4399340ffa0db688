use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub aws: AwsConfig,
    pub athena: AthenaConfig,
    pub mysql: MysqlConfig,
    #[serde(default)]
    pub catalog_tables: CatalogTables,
    #[serde(default)]
    pub stage: BTreeMap<String, StageSourceConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AwsConfig {
    pub region: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AthenaConfig {
    /// Logical catalog database the queries run against.
    pub database: String,
    /// Bucket where the engine persists query results as `{id}.csv`.
    pub results_bucket: String,
    #[serde(default = "default_poll_max_attempts")]
    pub poll_max_attempts: u32,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_poll_max_attempts() -> u32 {
    10
}
fn default_poll_interval_secs() -> u64 {
    5
}

impl AthenaConfig {
    /// Result location handed to the engine at submission time.
    pub fn output_location(&self) -> String {
        format!("s3://{}/", self.results_bucket)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MysqlConfig {
    pub host: String,
    #[serde(default = "default_mysql_port")]
    pub port: u16,
    pub user: String,
    pub database: String,
}

fn default_mysql_port() -> u16 {
    3306
}

/// Source table names registered in the catalog, one per entity kind.
#[derive(Debug, Deserialize, Clone)]
pub struct CatalogTables {
    #[serde(default = "default_reports_table")]
    pub reports: String,
    #[serde(default = "default_billing_table")]
    pub billing: String,
    #[serde(default = "default_inventory_table")]
    pub inventory: String,
    #[serde(default = "default_orders_table")]
    pub orders: String,
    #[serde(default = "default_products_table")]
    pub products: String,
}

impl Default for CatalogTables {
    fn default() -> Self {
        Self {
            reports: default_reports_table(),
            billing: default_billing_table(),
            inventory: default_inventory_table(),
            orders: default_orders_table(),
            products: default_products_table(),
        }
    }
}

fn default_reports_table() -> String {
    "api-reportes-dev".to_string()
}
fn default_billing_table() -> String {
    "billingservice-dev".to_string()
}
fn default_inventory_table() -> String {
    "inventoryservice-dev".to_string()
}
fn default_orders_table() -> String {
    "orderservice-dev".to_string()
}
fn default_products_table() -> String {
    "productservice-dev".to_string()
}

/// One scan-and-stage source: a wide-column table scanned page by page and
/// uploaded as newline-delimited JSON objects under `prefix/`.
#[derive(Debug, Deserialize, Clone)]
pub struct StageSourceConfig {
    pub table: String,
    pub bucket: String,
    pub prefix: String,
    /// Optional page size cap forwarded to the scan.
    #[serde(default)]
    pub page_size: Option<u32>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.aws.region.is_empty() {
        anyhow::bail!("aws.region must not be empty");
    }

    if config.athena.database.is_empty() {
        anyhow::bail!("athena.database must not be empty");
    }

    if config.athena.results_bucket.is_empty() {
        anyhow::bail!("athena.results_bucket must not be empty");
    }

    if config.athena.poll_max_attempts == 0 {
        anyhow::bail!("athena.poll_max_attempts must be > 0");
    }

    if config.mysql.host.is_empty() || config.mysql.user.is_empty() {
        anyhow::bail!("mysql.host and mysql.user must not be empty");
    }

    for (name, source) in &config.stage {
        if source.table.is_empty() || source.bucket.is_empty() {
            anyhow::bail!("stage.{}: table and bucket must not be empty", name);
        }
        if source.prefix.is_empty() {
            anyhow::bail!("stage.{}: prefix must not be empty", name);
        }
    }

    Ok(config)
}
