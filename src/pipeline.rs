//! Pipeline orchestration.
//!
//! Drives the per-entity-kind sequence: submit the catalog query, poll it
//! to completion, fetch the result rows, transform them, and load the
//! records. Failures are contained at the entity-kind boundary — a kind
//! that aborts or gets skipped is logged and the run moves on to the next
//! one. Nothing inside the loop can stop the whole run.

use std::time::Duration;
use tracing::{error, info, warn};

use crate::athena::{wait_for_query, QueryStatus};
use crate::config::Config;
use crate::errors::PipelineError;
use crate::models::{IntoRow, LoadRow, RawRow};
use crate::results::fetch_results;
use crate::traits::{Catalog, LoadStats, ObjectStore, RecordSink};
use crate::transform;

/// The fixed set of entity kinds, processed in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Reports,
    Billing,
    Inventory,
    Order,
    Productos,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Reports,
        EntityKind::Billing,
        EntityKind::Inventory,
        EntityKind::Order,
        EntityKind::Productos,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Reports => "Reports",
            Self::Billing => "Billing",
            Self::Inventory => "Inventory",
            Self::Order => "Order",
            Self::Productos => "Productos",
        }
    }

    /// Catalog source table for this kind, from configuration.
    fn source_table(self, config: &Config) -> &str {
        let tables = &config.catalog_tables;
        match self {
            Self::Reports => &tables.reports,
            Self::Billing => &tables.billing,
            Self::Inventory => &tables.inventory,
            Self::Order => &tables.orders,
            Self::Productos => &tables.products,
        }
    }

    /// Full-scan query submitted for this kind.
    pub fn query(self, config: &Config) -> String {
        format!(
            "SELECT * FROM \"AwsDataCatalog\".\"{}\".\"{}\"",
            config.athena.database,
            self.source_table(config)
        )
    }
}

impl std::str::FromStr for EntityKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reports" => Ok(Self::Reports),
            "billing" => Ok(Self::Billing),
            "inventory" => Ok(Self::Inventory),
            "order" | "orders" => Ok(Self::Order),
            "productos" | "products" => Ok(Self::Productos),
            other => anyhow::bail!(
                "Unknown entity kind: '{}'. Available: reports, billing, inventory, order, productos",
                other
            ),
        }
    }
}

/// What happened to one entity kind.
#[derive(Debug)]
pub enum KindOutcome {
    /// Transform and load completed; one stats entry per target table.
    Loaded(Vec<(&'static str, LoadStats)>),
    /// Nothing to do for this kind (query did not succeed in time, or
    /// produced no rows).
    Skipped(String),
    /// A stage failed hard for this kind.
    Aborted(PipelineError),
}

/// Run the pipeline over every entity kind (or a single one).
///
/// Always returns one outcome per processed kind; per-kind failures are
/// reported in the outcome list, never as an error of the run itself.
pub async fn run_pipeline(
    config: &Config,
    catalog: &dyn Catalog,
    store: &dyn ObjectStore,
    sink: &dyn RecordSink,
    only: Option<EntityKind>,
) -> Vec<(EntityKind, KindOutcome)> {
    let mut outcomes = Vec::new();

    for kind in EntityKind::ALL {
        if only.is_some_and(|k| k != kind) {
            continue;
        }

        info!(entity = kind.name(), "processing entity kind");
        let outcome = run_kind(config, catalog, store, sink, kind).await;
        match &outcome {
            KindOutcome::Loaded(stats) => {
                for (table, stats) in stats {
                    info!(
                        entity = kind.name(),
                        table,
                        inserted = stats.inserted,
                        failed = stats.failed,
                        "entity kind loaded"
                    );
                }
            }
            KindOutcome::Skipped(reason) => {
                warn!(entity = kind.name(), reason, "entity kind skipped");
            }
            KindOutcome::Aborted(e) => {
                error!(entity = kind.name(), error = %e, "entity kind aborted");
            }
        }
        outcomes.push((kind, outcome));
    }

    outcomes
}

async fn run_kind(
    config: &Config,
    catalog: &dyn Catalog,
    store: &dyn ObjectStore,
    sink: &dyn RecordSink,
    kind: EntityKind,
) -> KindOutcome {
    let query = kind.query(config);

    let handle = match catalog
        .submit(&query, &config.athena.database, &config.athena.output_location())
        .await
    {
        Ok(handle) => {
            info!(entity = kind.name(), query_id = %handle, "query submitted");
            handle
        }
        Err(e) => return KindOutcome::Aborted(PipelineError::Submission(format!("{:#}", e))),
    };

    let status = wait_for_query(
        catalog,
        &handle,
        config.athena.poll_max_attempts,
        Duration::from_secs(config.athena.poll_interval_secs),
    )
    .await;
    if status != QueryStatus::Succeeded {
        return KindOutcome::Skipped(format!("query ended {}", status));
    }

    let rows = match fetch_results(store, &config.athena.results_bucket, &handle).await {
        Ok(rows) => rows,
        Err(e) => return KindOutcome::Aborted(PipelineError::Fetch(format!("{:#}", e))),
    };
    if rows.is_empty() {
        return KindOutcome::Skipped("query returned no rows".to_string());
    }

    load_kind(sink, kind, &rows).await
}

/// Transform the raw rows for one kind and load each target table.
async fn load_kind(sink: &dyn RecordSink, kind: EntityKind, rows: &[RawRow]) -> KindOutcome {
    let mut loaded = Vec::new();

    let targets: Vec<(&'static str, Vec<LoadRow>)> = match kind {
        EntityKind::Reports => vec![("Reports", into_rows(transform::transform_reports(rows)))],
        EntityKind::Billing => vec![("Billing", into_rows(transform::transform_billing(rows)))],
        EntityKind::Inventory => {
            vec![("Inventory", into_rows(transform::transform_inventory(rows)))]
        }
        EntityKind::Productos => {
            vec![("Productos", into_rows(transform::transform_products(rows)))]
        }
        EntityKind::Order => {
            let (orders, order_products) = transform::transform_orders(rows);
            vec![
                ("Orders", into_rows(orders)),
                ("OrderProductos", into_rows(order_products)),
            ]
        }
    };

    for (table, records) in targets {
        match sink.load(records, table).await {
            Ok(stats) => loaded.push((table, stats)),
            Err(e) => return KindOutcome::Aborted(PipelineError::Connection(format!("{:#}", e))),
        }
    }

    KindOutcome::Loaded(loaded)
}

fn into_rows<T: IntoRow>(records: Vec<T>) -> Vec<LoadRow> {
    records.into_iter().map(IntoRow::into_row).collect()
}
