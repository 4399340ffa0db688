//! Athena-compatible catalog engine client and the bounded poll loop.
//!
//! Talks to the engine's JSON protocol directly over HTTPS with SigV4
//! signing (`StartQueryExecution`, `GetQueryExecution`). Submission returns
//! a [`QueryHandle`]; [`wait_for_query`] polls that handle until a terminal
//! state or until the poll budget runs out.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

use crate::aws::{sign_request, AwsCredentials};
use crate::traits::Catalog;

const JSON_PROTOCOL: &str = "application/x-amz-json-1.1";

/// Opaque identifier for one submitted catalog query.
///
/// Created at submission, consumed by the poll loop and the result fetch,
/// discarded once the entity kind completes. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryHandle(String);

impl QueryHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Execution state of a catalog query.
///
/// `TimedOut` is produced locally by [`wait_for_query`] after exhausting its
/// budget; the engine itself only ever reports the other four.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Running,
    Succeeded,
    Failed,
    Cancelled,
    TimedOut,
}

impl QueryStatus {
    /// Whether the engine has stopped working on the query.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::TimedOut => "TIMED_OUT",
        };
        write!(f, "{}", name)
    }
}

/// Client for an Athena-compatible catalog engine.
pub struct AthenaClient {
    client: reqwest::Client,
    region: String,
    creds: AwsCredentials,
}

impl AthenaClient {
    pub fn new(region: impl Into<String>, creds: AwsCredentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            region: region.into(),
            creds,
        }
    }

    /// Issue one signed JSON-protocol call and return the decoded response.
    async fn json_call(&self, target: &str, body: Value) -> Result<Value> {
        let host = format!("athena.{}.amazonaws.com", self.region);
        let url = format!("https://{}/", host);
        let payload = serde_json::to_vec(&body)?;

        let headers = sign_request(
            &self.creds,
            &self.region,
            "athena",
            "POST",
            &host,
            "/",
            "",
            &[("content-type", JSON_PROTOCOL), ("x-amz-target", target)],
            &payload,
        );

        let mut req = self.client.post(&url).body(payload);
        for (name, value) in &headers {
            req = req.header(name, value);
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("{} request failed", target))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!(
                "{} failed (HTTP {}): {}",
                target,
                status,
                body.chars().take(500).collect::<String>()
            );
        }

        let decoded: Value = resp
            .json()
            .await
            .with_context(|| format!("{} returned malformed JSON", target))?;
        Ok(decoded)
    }
}

#[async_trait]
impl Catalog for AthenaClient {
    async fn submit(
        &self,
        query: &str,
        database: &str,
        output_location: &str,
    ) -> Result<QueryHandle> {
        let body = json!({
            "QueryString": query,
            "QueryExecutionContext": { "Database": database },
            "ResultConfiguration": { "OutputLocation": output_location },
        });

        let resp = self
            .json_call("AmazonAthena.StartQueryExecution", body)
            .await?;

        let id = resp["QueryExecutionId"]
            .as_str()
            .context("StartQueryExecution response missing QueryExecutionId")?;
        Ok(QueryHandle::new(id))
    }

    async fn status(&self, handle: &QueryHandle) -> Result<QueryStatus> {
        let body = json!({ "QueryExecutionId": handle.as_str() });
        let resp = self.json_call("AmazonAthena.GetQueryExecution", body).await?;

        let state = resp["QueryExecution"]["Status"]["State"]
            .as_str()
            .context("GetQueryExecution response missing Status.State")?;

        match state {
            // QUEUED precedes RUNNING in the real engine.
            "QUEUED" | "RUNNING" => Ok(QueryStatus::Running),
            "SUCCEEDED" => Ok(QueryStatus::Succeeded),
            "FAILED" => Ok(QueryStatus::Failed),
            "CANCELLED" => Ok(QueryStatus::Cancelled),
            other => bail!("unknown query state: {}", other),
        }
    }
}

/// Poll `handle` until a terminal status or until the budget runs out.
///
/// A transient status-check error is logged and charged against the same
/// attempt budget — it neither resets the budget nor ends the wait early.
/// Exhausting the budget without ever resolving yields
/// [`QueryStatus::TimedOut`], a normal value the caller must check, not an
/// error. Total wall clock is bounded by `max_attempts × poll_interval`.
pub async fn wait_for_query(
    catalog: &dyn Catalog,
    handle: &QueryHandle,
    max_attempts: u32,
    poll_interval: Duration,
) -> QueryStatus {
    for attempt in 1..=max_attempts {
        match catalog.status(handle).await {
            Ok(QueryStatus::Succeeded) => {
                info!(query_id = %handle, "query completed successfully");
                return QueryStatus::Succeeded;
            }
            Ok(status @ (QueryStatus::Failed | QueryStatus::Cancelled)) => {
                warn!(query_id = %handle, %status, "query reached a non-success terminal state");
                return status;
            }
            Ok(QueryStatus::Running | QueryStatus::TimedOut) => {}
            Err(e) => {
                warn!(query_id = %handle, attempt, error = %e, "status check failed");
            }
        }
        tokio::time::sleep(poll_interval).await;
    }

    warn!(query_id = %handle, max_attempts, "query did not complete within the poll budget");
    QueryStatus::TimedOut
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Catalog fake that replays a fixed sequence of status results and
    /// repeats the last one once the script runs out.
    struct ScriptedCatalog {
        script: Mutex<Vec<Result<QueryStatus>>>,
        calls: AtomicUsize,
    }

    impl ScriptedCatalog {
        fn new(script: Vec<Result<QueryStatus>>) -> Self {
            Self {
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Catalog for ScriptedCatalog {
        async fn submit(&self, _: &str, _: &str, _: &str) -> Result<QueryHandle> {
            Ok(QueryHandle::new("scripted"))
        }

        async fn status(&self, _: &QueryHandle) -> Result<QueryStatus> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.remove(0)
            } else {
                match script.first() {
                    Some(Ok(s)) => Ok(*s),
                    Some(Err(_)) | None => Err(anyhow::anyhow!("status unavailable")),
                }
            }
        }
    }

    const TICK: Duration = Duration::from_millis(1);

    #[tokio::test]
    async fn never_terminal_times_out_after_budget() {
        let catalog = ScriptedCatalog::new(vec![Ok(QueryStatus::Running)]);
        let handle = QueryHandle::new("q1");
        let status = wait_for_query(&catalog, &handle, 4, TICK).await;
        assert_eq!(status, QueryStatus::TimedOut);
        assert_eq!(catalog.calls(), 4);
    }

    #[tokio::test]
    async fn returns_on_first_terminal_status() {
        let catalog = ScriptedCatalog::new(vec![
            Ok(QueryStatus::Running),
            Ok(QueryStatus::Running),
            Ok(QueryStatus::Succeeded),
        ]);
        let handle = QueryHandle::new("q2");
        let status = wait_for_query(&catalog, &handle, 10, TICK).await;
        assert_eq!(status, QueryStatus::Succeeded);
        assert_eq!(catalog.calls(), 3);
    }

    #[tokio::test]
    async fn failed_state_is_returned_not_retried() {
        let catalog = ScriptedCatalog::new(vec![Ok(QueryStatus::Failed)]);
        let handle = QueryHandle::new("q3");
        let status = wait_for_query(&catalog, &handle, 10, TICK).await;
        assert_eq!(status, QueryStatus::Failed);
        assert_eq!(catalog.calls(), 1);
    }

    #[tokio::test]
    async fn poll_errors_consume_the_same_budget() {
        let catalog = ScriptedCatalog::new(vec![
            Err(anyhow::anyhow!("network blip")),
            Ok(QueryStatus::Running),
            Err(anyhow::anyhow!("network blip")),
        ]);
        let handle = QueryHandle::new("q4");
        let status = wait_for_query(&catalog, &handle, 3, TICK).await;
        assert_eq!(status, QueryStatus::TimedOut);
        assert_eq!(catalog.calls(), 3);
    }

    #[tokio::test]
    async fn recovers_after_transient_poll_error() {
        let catalog = ScriptedCatalog::new(vec![
            Err(anyhow::anyhow!("network blip")),
            Ok(QueryStatus::Succeeded),
        ]);
        let handle = QueryHandle::new("q5");
        let status = wait_for_query(&catalog, &handle, 5, TICK).await;
        assert_eq!(status, QueryStatus::Succeeded);
        assert_eq!(catalog.calls(), 2);
    }
}
