use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::destination::Destination;
use crate::error::{ErrorKind, SignalsResult};
use crate::schema::{TableSchema, TableSpec};
use crate::signals_error;
use crate::types::SignalRow;

#[derive(Debug)]
struct Inner {
    prepared: Option<(TableSpec, TableSchema)>,
    rows: Vec<SignalRow>,
}

/// In-memory destination for testing and development purposes.
///
/// [`MemoryDestination`] stores all appended rows in memory so tests can inspect
/// what the pipeline wrote. It mimics the create/append dispositions of a real
/// destination: preparing an already-prepared table is a no-op that keeps
/// existing rows, and appends only ever accumulate.
#[derive(Debug, Clone)]
pub struct MemoryDestination {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDestination {
    /// Creates a new empty memory destination.
    pub fn new() -> Self {
        let inner = Inner {
            prepared: None,
            rows: Vec::new(),
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Returns a copy of all rows appended to this destination.
    pub async fn rows(&self) -> Vec<SignalRow> {
        let inner = self.inner.lock().await;
        inner.rows.clone()
    }

    /// Returns the table spec and schema this destination was prepared with.
    pub async fn prepared(&self) -> Option<(TableSpec, TableSchema)> {
        let inner = self.inner.lock().await;
        inner.prepared.clone()
    }
}

impl Default for MemoryDestination {
    fn default() -> Self {
        Self::new()
    }
}

impl Destination for MemoryDestination {
    fn name() -> &'static str {
        "memory"
    }

    async fn prepare(&self, table: &TableSpec, schema: &TableSchema) -> SignalsResult<()> {
        let mut inner = self.inner.lock().await;

        match &inner.prepared {
            None => {
                info!(table = %table, "creating in-memory table");
                inner.prepared = Some((table.clone(), schema.clone()));
            }
            Some((existing_table, existing_schema)) => {
                // Reuse semantics: the table survives restarts, existing rows stay.
                if existing_table != table {
                    return Err(signals_error!(
                        ErrorKind::ConfigError,
                        "Memory destination already bound to a different table",
                        format!("bound to `{existing_table}`, requested `{table}`")
                    ));
                }

                if !schema.is_satisfied_by(existing_schema) {
                    return Err(signals_error!(
                        ErrorKind::SchemaMismatch,
                        "Existing in-memory table has an incompatible schema"
                    ));
                }

                info!(table = %table, "reusing existing in-memory table");
            }
        }

        Ok(())
    }

    async fn append_rows(&self, table: &TableSpec, rows: Vec<SignalRow>) -> SignalsResult<()> {
        let mut inner = self.inner.lock().await;

        info!(table = %table, rows = rows.len(), "appending batch of signal rows");

        inner.rows.extend(rows);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::signal_row_schema;
    use bytes::Bytes;

    fn row(id: i64) -> SignalRow {
        SignalRow {
            id,
            payload: Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef]),
        }
    }

    #[tokio::test]
    async fn appends_accumulate_across_batches() {
        let destination = MemoryDestination::new();
        let table = TableSpec::signals_persist("tapglue-signals").unwrap();
        let schema = signal_row_schema();

        destination.prepare(&table, &schema).await.unwrap();
        destination
            .append_rows(&table, vec![row(1), row(2)])
            .await
            .unwrap();
        destination.append_rows(&table, vec![row(3)]).await.unwrap();

        let rows = destination.rows().await;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].id, 3);
    }

    #[tokio::test]
    async fn prepare_twice_keeps_existing_rows() {
        let destination = MemoryDestination::new();
        let table = TableSpec::signals_persist("tapglue-signals").unwrap();
        let schema = signal_row_schema();

        destination.prepare(&table, &schema).await.unwrap();
        destination.append_rows(&table, vec![row(1)]).await.unwrap();

        // A restart prepares the same table again.
        destination.prepare(&table, &schema).await.unwrap();

        assert_eq!(destination.rows().await.len(), 1);
    }

    #[tokio::test]
    async fn prepare_rejects_different_table() {
        let destination = MemoryDestination::new();
        let schema = signal_row_schema();

        let table = TableSpec::signals_persist("project-a").unwrap();
        destination.prepare(&table, &schema).await.unwrap();

        let other = TableSpec::signals_persist("project-b").unwrap();
        let err = destination.prepare(&other, &schema).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }
}
