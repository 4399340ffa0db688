//! Relational store loader.
//!
//! One call loads one table: a dedicated connection is opened, a single
//! transaction spans every insert, and individual insert failures are
//! logged and skipped so one bad record cannot sink the batch. The commit
//! at the end persists whatever subset succeeded. The connection is
//! dropped on every exit path.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::mysql::MySqlConnectOptions;
use sqlx::{ConnectOptions, Connection};
use tracing::{error, info, warn};

use crate::config::MysqlConfig;
use crate::models::{LoadRow, SqlValue};
use crate::traits::{LoadStats, RecordSink};

pub struct MySqlLoader {
    options: MySqlConnectOptions,
}

impl MySqlLoader {
    pub fn new(config: &MysqlConfig, password: &str) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(password)
            .database(&config.database);
        Self { options }
    }
}

/// Build the parameterized insert for one row: the record's field names
/// become the column list, in field order.
fn insert_statement(table: &str, row: &LoadRow) -> String {
    let columns = row
        .iter()
        .map(|(column, _)| format!("`{}`", column))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; row.len()].join(", ");
    format!(
        "INSERT INTO `{}` ({}) VALUES ({})",
        table, columns, placeholders
    )
}

#[async_trait]
impl RecordSink for MySqlLoader {
    async fn load(&self, rows: Vec<LoadRow>, table: &str) -> Result<LoadStats> {
        if rows.is_empty() {
            warn!(table, "no records to load");
            return Ok(LoadStats::default());
        }

        let mut conn = self
            .options
            .connect()
            .await
            .with_context(|| format!("failed to connect to MySQL for table {}", table))?;

        let mut tx = conn
            .begin()
            .await
            .with_context(|| format!("failed to open transaction for table {}", table))?;

        let mut stats = LoadStats::default();
        for row in &rows {
            stats.attempted += 1;
            let sql = insert_statement(table, row);
            let mut query = sqlx::query(&sql);
            for (_, value) in row {
                query = match value {
                    SqlValue::Text(s) => query.bind(s.as_str()),
                    SqlValue::Int(i) => query.bind(*i),
                    SqlValue::Float(f) => query.bind(*f),
                };
            }
            match query.execute(&mut *tx).await {
                Ok(_) => stats.inserted += 1,
                Err(e) => {
                    stats.failed += 1;
                    error!(table, record = ?row, error = %e, "insert rejected, skipping record");
                }
            }
        }

        tx.commit()
            .await
            .with_context(|| format!("failed to commit load into table {}", table))?;

        info!(
            table,
            inserted = stats.inserted,
            failed = stats.failed,
            "load committed"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_uses_field_names_and_positional_placeholders() {
        let row: LoadRow = vec![
            ("tenant_id", SqlValue::Text("t1".to_string())),
            ("total_sales", SqlValue::Int(10)),
        ];
        assert_eq!(
            insert_statement("Reports", &row),
            "INSERT INTO `Reports` (`tenant_id`, `total_sales`) VALUES (?, ?)"
        );
    }

    #[test]
    fn single_column_row() {
        let row: LoadRow = vec![("a", SqlValue::Int(1))];
        assert_eq!(
            insert_statement("T", &row),
            "INSERT INTO `T` (`a`) VALUES (?)"
        );
    }

    #[tokio::test]
    async fn empty_input_is_a_warned_noop() {
        // No connection is opened for an empty batch, so this runs without
        // a reachable server.
        let config = MysqlConfig {
            host: "localhost".to_string(),
            port: 3306,
            user: "etl".to_string(),
            database: "warehouse".to_string(),
        };
        let loader = MySqlLoader::new(&config, "password");
        let stats = loader.load(Vec::new(), "Reports").await.unwrap();
        assert_eq!(stats, LoadStats::default());
    }
}
