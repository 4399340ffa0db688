//! Integration tests for the pipeline orchestrator.
//!
//! These drive the real submit → wait → fetch → transform → load sequence
//! through in-memory fakes of the three collaborator seams, proving the
//! containment rules: timeouts skip without fetching, empty results skip
//! without loading, and one kind's failure never stops the others.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use lake_relay::athena::{QueryHandle, QueryStatus};
use lake_relay::config::Config;
use lake_relay::models::{LoadRow, SqlValue};
use lake_relay::pipeline::{run_pipeline, EntityKind, KindOutcome};
use lake_relay::traits::{Catalog, LoadStats, ObjectStore, RecordSink};

// ─── Fakes ──────────────────────────────────────────────────────────

/// Catalog fake: every submission yields the same handle and the scripted
/// status; optionally rejects queries touching one source table.
struct FakeCatalog {
    handle: &'static str,
    status: QueryStatus,
    reject_table: Option<&'static str>,
}

impl FakeCatalog {
    fn succeeding(handle: &'static str) -> Self {
        Self {
            handle,
            status: QueryStatus::Succeeded,
            reject_table: None,
        }
    }
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn submit(&self, query: &str, _: &str, _: &str) -> Result<QueryHandle> {
        if let Some(table) = self.reject_table {
            if query.contains(table) {
                bail!("table not found: {}", table);
            }
        }
        Ok(QueryHandle::new(self.handle))
    }

    async fn status(&self, _: &QueryHandle) -> Result<QueryStatus> {
        Ok(self.status)
    }
}

/// Object store fake backed by a key→bytes map, counting reads.
#[derive(Default)]
struct FakeStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    gets: AtomicUsize,
}

impl FakeStore {
    fn with_object(key: &str, content: &str) -> Self {
        let store = Self::default();
        store
            .objects
            .lock()
            .unwrap()
            .insert(key.to_string(), content.as_bytes().to_vec());
        store
    }

    fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn get_object(&self, _bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        match self.objects.lock().unwrap().get(key) {
            Some(bytes) => Ok(bytes.clone()),
            None => bail!("no such object: {}", key),
        }
    }

    async fn put_object(&self, _bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        self.objects.lock().unwrap().insert(key.to_string(), body);
        Ok(())
    }
}

/// Record sink fake that collects every load call.
#[derive(Default)]
struct FakeSink {
    loads: Mutex<Vec<(String, Vec<LoadRow>)>>,
}

impl FakeSink {
    fn rows_for(&self, table: &str) -> Vec<LoadRow> {
        self.loads
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == table)
            .flat_map(|(_, rows)| rows.clone())
            .collect()
    }

    fn load_count(&self) -> usize {
        self.loads.lock().unwrap().len()
    }
}

#[async_trait]
impl RecordSink for FakeSink {
    async fn load(&self, rows: Vec<LoadRow>, table: &str) -> Result<LoadStats> {
        let stats = LoadStats {
            attempted: rows.len(),
            inserted: rows.len(),
            failed: 0,
        };
        self.loads.lock().unwrap().push((table.to_string(), rows));
        Ok(stats)
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn test_config() -> Config {
    toml::from_str(
        r#"
        [aws]
        region = "us-east-1"

        [athena]
        database = "catalogo"
        results_bucket = "query-results"
        poll_max_attempts = 2
        poll_interval_secs = 0

        [mysql]
        host = "localhost"
        user = "etl"
        database = "warehouse"
        "#,
    )
    .unwrap()
}

fn field<'a>(row: &'a LoadRow, name: &str) -> &'a SqlValue {
    &row.iter().find(|(col, _)| *col == name).unwrap().1
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn timed_out_query_is_skipped_without_fetching() {
    let config = test_config();
    let catalog = FakeCatalog {
        handle: "q-stuck",
        status: QueryStatus::Running,
        reject_table: None,
    };
    let store = FakeStore::default();
    let sink = FakeSink::default();

    let outcomes =
        run_pipeline(&config, &catalog, &store, &sink, Some(EntityKind::Reports)).await;

    assert_eq!(outcomes.len(), 1);
    assert!(matches!(outcomes[0].1, KindOutcome::Skipped(_)));
    assert_eq!(store.get_calls(), 0, "fetch must not run after a timeout");
    assert_eq!(sink.load_count(), 0);
}

#[tokio::test]
async fn failed_query_is_skipped() {
    let config = test_config();
    let catalog = FakeCatalog {
        handle: "q-failed",
        status: QueryStatus::Failed,
        reject_table: None,
    };
    let store = FakeStore::default();
    let sink = FakeSink::default();

    let outcomes =
        run_pipeline(&config, &catalog, &store, &sink, Some(EntityKind::Billing)).await;

    match &outcomes[0].1 {
        KindOutcome::Skipped(reason) => assert!(reason.contains("FAILED"), "got: {reason}"),
        other => panic!("expected Skipped, got {other:?}"),
    }
    assert_eq!(store.get_calls(), 0);
}

#[tokio::test]
async fn empty_result_is_skipped_without_loading() {
    let config = test_config();
    let catalog = FakeCatalog::succeeding("q-empty");
    let store = FakeStore::with_object(
        "q-empty.csv",
        "\"tenant_id\",\"report_id\",\"data\"\n",
    );
    let sink = FakeSink::default();

    let outcomes =
        run_pipeline(&config, &catalog, &store, &sink, Some(EntityKind::Reports)).await;

    match &outcomes[0].1 {
        KindOutcome::Skipped(reason) => assert!(reason.contains("no rows"), "got: {reason}"),
        other => panic!("expected Skipped, got {other:?}"),
    }
    assert_eq!(store.get_calls(), 1);
    assert_eq!(sink.load_count(), 0);
}

#[tokio::test]
async fn missing_result_object_aborts_the_kind() {
    let config = test_config();
    let catalog = FakeCatalog::succeeding("q-gone");
    let store = FakeStore::default();
    let sink = FakeSink::default();

    let outcomes =
        run_pipeline(&config, &catalog, &store, &sink, Some(EntityKind::Reports)).await;

    assert!(matches!(outcomes[0].1, KindOutcome::Aborted(_)));
    assert_eq!(sink.load_count(), 0);
}

#[tokio::test]
async fn billing_rows_survive_repair_end_to_end() {
    let config = test_config();
    let catalog = FakeCatalog::succeeding("q-billing");
    let store = FakeStore::with_object(
        "q-billing.csv",
        "invoice_id,tenant_id,order_id,status,payment_details\n\
         i1,t1,o1,paid,\"method=card, amount=50\"\n\
         i2,t1,o2,pending,???\n",
    );
    let sink = FakeSink::default();

    let outcomes =
        run_pipeline(&config, &catalog, &store, &sink, Some(EntityKind::Billing)).await;

    match &outcomes[0].1 {
        KindOutcome::Loaded(stats) => {
            assert_eq!(stats.len(), 1);
            assert_eq!(stats[0].0, "Billing");
            assert_eq!(stats[0].1.inserted, 2);
        }
        other => panic!("expected Loaded, got {other:?}"),
    }

    let rows = sink.rows_for("Billing");
    assert_eq!(rows.len(), 2);
    assert_eq!(*field(&rows[0], "method"), SqlValue::Text("card".to_string()));
    assert_eq!(*field(&rows[0], "amount"), SqlValue::Text("50".to_string()));
    assert_eq!(*field(&rows[1], "method"), SqlValue::Text(String::new()));
    assert_eq!(*field(&rows[1], "amount"), SqlValue::Int(0));
}

#[tokio::test]
async fn orders_load_headers_and_deduplicated_pairs() {
    let config = test_config();
    let catalog = FakeCatalog::succeeding("q-orders");
    let store = FakeStore::with_object(
        "q-orders.csv",
        "order_id,tenant_id,user_id,status,items\n\
         o1,t1,u1,new,\"[{product_id=p1, price=10}, {product_id=p1, price=10}]\"\n\
         o2,t1,u2,new,???\n",
    );
    let sink = FakeSink::default();

    let outcomes =
        run_pipeline(&config, &catalog, &store, &sink, Some(EntityKind::Order)).await;

    assert!(matches!(outcomes[0].1, KindOutcome::Loaded(_)));

    // Both headers load, including the one whose items were unusable.
    let orders = sink.rows_for("Orders");
    assert_eq!(orders.len(), 2);

    // The duplicated item collapses to one pair; the bad order adds none.
    let pairs = sink.rows_for("OrderProductos");
    assert_eq!(pairs.len(), 1);
    assert_eq!(*field(&pairs[0], "order_id"), SqlValue::Text("o1".to_string()));
    assert_eq!(
        *field(&pairs[0], "product_id"),
        SqlValue::Text("p1".to_string())
    );
}

#[tokio::test]
async fn one_rejected_submission_does_not_stop_the_batch() {
    let config = test_config();
    // Reports is rejected at submission; every other kind succeeds with an
    // empty result and gets skipped.
    let catalog = FakeCatalog {
        handle: "q-shared",
        status: QueryStatus::Succeeded,
        reject_table: Some("api-reportes-dev"),
    };
    let store = FakeStore::with_object("q-shared.csv", "a,b\n");
    let sink = FakeSink::default();

    let outcomes = run_pipeline(&config, &catalog, &store, &sink, None).await;

    assert_eq!(outcomes.len(), EntityKind::ALL.len());
    assert!(matches!(outcomes[0].1, KindOutcome::Aborted(_)));
    for (kind, outcome) in &outcomes[1..] {
        assert!(
            matches!(outcome, KindOutcome::Skipped(_)),
            "{} should have been skipped, got {outcome:?}",
            kind.name()
        );
    }
}
