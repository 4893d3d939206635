use std::fmt;
use std::fs;
use std::sync::Arc;

use futures::StreamExt;
use gcp_bigquery_client::Client;
use gcp_bigquery_client::error::BQError;
use gcp_bigquery_client::model::query_parameter::QueryParameter;
use gcp_bigquery_client::model::query_parameter_type::QueryParameterType;
use gcp_bigquery_client::model::query_parameter_value::QueryParameterValue;
use gcp_bigquery_client::model::query_request::QueryRequest;
use gcp_bigquery_client::model::query_response::ResultSet;
use gcp_bigquery_client::storage::{
    ColumnMode, ColumnType, FieldDescriptor, StorageApi, StreamName, TableDescriptor,
};
use gcp_bigquery_client::yup_oauth2::parse_service_account_key;
use prost::bytes;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::destination::Destination;
use crate::error::{ErrorKind, SignalsResult};
use crate::retries::{MAX_RETRY_ATTEMPTS, calculate_backoff};
use crate::schema::{FieldMode, FieldSchema, FieldType, TableSchema, TableSpec};
use crate::signals_error;
use crate::types::SignalRow;

/// The maximum number of bytes that can be sent per append request.
const MAX_SIZE_BYTES: usize = 9 * 1024 * 1024;

/// The trace id attached to storage write requests.
const PERSIST_TRACE_ID: &str = "Signals BigQueryDestination";

/// A [`SignalRow`] in the wire shape expected by the Storage Write API.
///
/// Field numbers match the table descriptor built from the declared schema:
/// `id` is field 1, `payload` is field 2.
#[derive(Debug)]
struct BigQueryRow(SignalRow);

impl prost::Message for BigQueryRow {
    fn encode_raw(&self, buf: &mut impl bytes::BufMut)
    where
        Self: Sized,
    {
        prost::encoding::int64::encode(1, &self.0.id, buf);
        prost::encoding::bytes::encode(2, &self.0.payload, buf);
    }

    fn merge_field(
        &mut self,
        _tag: u32,
        _wire_type: prost::encoding::WireType,
        _buf: &mut impl bytes::Buf,
        _ctx: prost::encoding::DecodeContext,
    ) -> Result<(), prost::DecodeError>
    where
        Self: Sized,
    {
        unimplemented!("signal rows are only ever encoded");
    }

    fn encoded_len(&self) -> usize {
        prost::encoding::int64::encoded_len(1, &self.0.id)
            + prost::encoding::bytes::encoded_len(2, &self.0.payload)
    }

    fn clear(&mut self) {
        self.0.id = 0;
        self.0.payload.clear();
    }
}

/// Checks if a [`BQError`] represents a transient condition worth retrying.
fn is_retryable_bq_error(error: &BQError) -> bool {
    match error {
        // Transport-level failures (network drops, connection resets).
        BQError::RequestError(_) => true,
        BQError::TonicTransportError(_) => true,

        // Server-side throttling and availability errors.
        BQError::ResponseError { error } => {
            matches!(error.error.code, 429 | 500 | 502 | 503)
        }

        _ => false,
    }
}

/// Google BigQuery destination for signal rows.
///
/// Honors the create and append dispositions: the destination table is created
/// from the declared schema when absent and reused as-is when present (after an
/// order-insensitive compatibility check), and rows are only ever appended via
/// the Storage Write API. Transient append failures are retried with exponential
/// backoff; everything else surfaces as a destination error.
#[derive(Clone)]
pub struct BigQueryDestination {
    client: Arc<Mutex<Client>>,
}

impl BigQueryDestination {
    /// Creates a destination from a Google Cloud service account key string.
    pub async fn new_with_key(sa_key: &str) -> SignalsResult<Self> {
        let sa_key = parse_service_account_key(sa_key).map_err(|err| {
            signals_error!(
                ErrorKind::ConfigError,
                "Invalid service account key for BigQuery",
                source: err
            )
        })?;
        let client = Client::from_service_account_key(sa_key, false)
            .await
            .map_err(connection_error)?;

        Ok(Self {
            client: Arc::new(Mutex::new(client)),
        })
    }

    /// Creates a destination from a service account key file path.
    pub async fn new_with_key_path(sa_key_path: &str) -> SignalsResult<Self> {
        let sa_key = fs::read_to_string(sa_key_path).map_err(|err| {
            signals_error!(
                ErrorKind::ConfigError,
                "Failed to read service account key file",
                sa_key_path,
                source: err
            )
        })?;

        Self::new_with_key(&sa_key).await
    }

    /// Executes an SQL query and returns the result set.
    async fn query(&self, project_id: &str, request: QueryRequest) -> Result<ResultSet, BQError> {
        let client = self.client.lock().await;
        let query_response = client.job().query(project_id, request).await?;

        Ok(ResultSet::new_from_query_response(query_response))
    }

    /// Checks if the destination table exists.
    async fn table_exists(&self, table: &TableSpec) -> SignalsResult<bool> {
        let query = format!(
            "select exists (select 1 from `{}.{}.INFORMATION_SCHEMA.TABLES` where table_name = @table_name) as table_exists",
            table.project(),
            table.dataset()
        );

        let mut request = QueryRequest::new(query);
        request.query_parameters = Some(vec![table_name_parameter(table)]);

        let mut result_set = self
            .query(table.project(), request)
            .await
            .map_err(query_error(table, "Failed to check destination table existence"))?;

        let mut exists = false;
        if result_set.next_row() {
            exists = result_set
                .get_bool_by_name("table_exists")
                .map_err(query_error(table, "Failed to check destination table existence"))?
                .unwrap_or(false);
        }

        Ok(exists)
    }

    /// Creates the destination table from the declared schema.
    async fn create_table(&self, table: &TableSpec, schema: &TableSchema) -> SignalsResult<()> {
        let columns_spec = create_columns_spec(schema);

        info!(table = %table, "creating destination table in bigquery");

        let query = format!("create table {} {}", full_table_name(table), columns_spec);

        let _ = self
            .query(table.project(), QueryRequest::new(query))
            .await
            .map_err(query_error(table, "Failed to create destination table"))?;

        Ok(())
    }

    /// Fetches the live schema of an existing destination table.
    ///
    /// Columns with types outside the schema vocabulary are dropped when
    /// nullable (extra columns are tolerated) and rejected when required, since
    /// appends omitting them would fail on every row.
    async fn fetch_table_schema(&self, table: &TableSpec) -> SignalsResult<TableSchema> {
        let query = format!(
            "select column_name, data_type, is_nullable from `{}.{}.INFORMATION_SCHEMA.COLUMNS` where table_name = @table_name",
            table.project(),
            table.dataset()
        );

        let mut request = QueryRequest::new(query);
        request.query_parameters = Some(vec![table_name_parameter(table)]);

        let mut result_set = self
            .query(table.project(), request)
            .await
            .map_err(query_error(table, "Failed to fetch destination table schema"))?;

        let mut fields = Vec::new();
        while result_set.next_row() {
            let name = get_string_column(&mut result_set, table, "column_name")?;
            let data_type = get_string_column(&mut result_set, table, "data_type")?;
            let is_nullable = get_string_column(&mut result_set, table, "is_nullable")?;

            let mode = if is_nullable == "YES" {
                FieldMode::Nullable
            } else {
                FieldMode::Required
            };

            let typ = match data_type.as_str() {
                "INT64" | "INTEGER" => FieldType::Integer,
                "BYTES" => FieldType::Bytes,
                other => {
                    if mode == FieldMode::Required {
                        return Err(signals_error!(
                            ErrorKind::SchemaMismatch,
                            "Destination table has a required column of unsupported type",
                            format!("column `{name}` of type `{other}` in `{table}`")
                        ));
                    }

                    debug!(table = %table, column = %name, data_type = %other, "ignoring nullable column of unsupported type");
                    continue;
                }
            };

            fields.push(FieldSchema::new(name, typ, mode));
        }

        Ok(TableSchema::new(fields))
    }

    /// Streams rows to the destination table using the Storage Write API.
    ///
    /// Rows are sent in chunks respecting the maximum request size. Transient
    /// failures are retried per chunk with exponential backoff; everything else
    /// surfaces as a destination error.
    async fn stream_rows(&self, table: &TableSpec, rows: &[BigQueryRow]) -> SignalsResult<()> {
        let mut rows = rows;

        let table_descriptor = table_descriptor(&crate::schema::signal_row_schema());
        let default_stream = StreamName::new_default(
            table.project().to_string(),
            table.dataset().to_string(),
            table.table().to_string(),
        );

        let mut client = self.client.lock().await;

        while !rows.is_empty() {
            let mut attempt = 0;

            let num_processed_rows = loop {
                let (encoded_rows, num_processed_rows) =
                    StorageApi::create_rows(&table_descriptor, rows, MAX_SIZE_BYTES);

                ensure_chunk_progress(num_processed_rows, table)?;

                let sent: Result<(), BQError> = async {
                    let mut response_stream = client
                        .storage_mut()
                        .append_rows(&default_stream, encoded_rows, PERSIST_TRACE_ID.to_owned())
                        .await?;

                    if let Some(response) = response_stream.next().await {
                        let _ = response?;
                    }

                    Ok(())
                }
                .await;

                match sent {
                    Ok(()) => break num_processed_rows,
                    Err(err) if is_retryable_bq_error(&err) && attempt < MAX_RETRY_ATTEMPTS => {
                        attempt += 1;
                        let backoff = calculate_backoff(attempt);
                        warn!(
                            table = %table,
                            %attempt,
                            backoff_ms = backoff.as_millis() as u64,
                            error = %err,
                            "transient append failure, retrying"
                        );
                        sleep(backoff).await;
                    }
                    Err(err) => {
                        return Err(signals_error!(
                            ErrorKind::DestinationQueryFailed,
                            "Failed to append signal rows",
                            table.to_string(),
                            source: err
                        ));
                    }
                }
            };

            rows = &rows[num_processed_rows..];
        }

        Ok(())
    }
}

impl Destination for BigQueryDestination {
    fn name() -> &'static str {
        "bigquery"
    }

    async fn prepare(&self, table: &TableSpec, schema: &TableSchema) -> SignalsResult<()> {
        if !self.table_exists(table).await? {
            self.create_table(table, schema).await?;
            return Ok(());
        }

        // The table survives restarts; it is reused without reapplying the
        // schema, only presence and type compatibility are verified.
        let actual = self.fetch_table_schema(table).await?;
        if !schema.is_satisfied_by(&actual) {
            return Err(signals_error!(
                ErrorKind::SchemaMismatch,
                "Destination table exists with an incompatible schema",
                format!("table `{table}` does not match the declared signal row schema")
            ));
        }

        info!(table = %table, "reusing existing destination table");

        Ok(())
    }

    async fn append_rows(&self, table: &TableSpec, rows: Vec<SignalRow>) -> SignalsResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let row_count = rows.len();
        let rows: Vec<BigQueryRow> = rows.into_iter().map(BigQueryRow).collect();

        self.stream_rows(table, &rows).await?;

        debug!(table = %table, rows = row_count, "appended batch of signal rows");

        Ok(())
    }
}

impl fmt::Debug for BigQueryDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BigQueryDestination").finish()
    }
}

/// Returns the backticked fully qualified name of the destination table.
///
/// Segments are already restricted to identifier-safe characters by
/// [`TableSpec`], so no further escaping is needed.
fn full_table_name(table: &TableSpec) -> String {
    format!(
        "`{}.{}.{}`",
        table.project(),
        table.dataset(),
        table.table()
    )
}

/// Builds the `@table_name` query parameter for information schema lookups.
fn table_name_parameter(table: &TableSpec) -> QueryParameter {
    QueryParameter {
        name: Some("table_name".to_string()),
        parameter_type: Some(QueryParameterType {
            r#type: "string".to_string(),
            array_type: None,
            struct_types: None,
        }),
        parameter_value: Some(QueryParameterValue {
            value: Some(table.table().to_string()),
            array_values: None,
            struct_values: None,
        }),
    }
}

/// Generates the SQL column specification for a `CREATE TABLE` statement.
fn create_columns_spec(schema: &TableSchema) -> String {
    let columns = schema
        .fields()
        .iter()
        .map(|field| {
            let typ = match field.typ {
                FieldType::Integer => "int64",
                FieldType::Bytes => "bytes",
            };

            let mut spec = format!("`{}` {}", field.name, typ);
            if field.mode == FieldMode::Required {
                spec.push_str(" not null");
            }

            spec
        })
        .collect::<Vec<_>>()
        .join(",");

    format!("({columns})")
}

/// Converts the declared schema to a Storage Write API table descriptor.
fn table_descriptor(schema: &TableSchema) -> TableDescriptor {
    let mut field_descriptors = Vec::with_capacity(schema.fields().len());
    let mut number = 1;
    for field in schema.fields() {
        let typ = match field.typ {
            FieldType::Integer => ColumnType::Int64,
            FieldType::Bytes => ColumnType::Bytes,
        };
        let mode = match field.mode {
            FieldMode::Required => ColumnMode::Required,
            FieldMode::Nullable => ColumnMode::Nullable,
        };

        field_descriptors.push(FieldDescriptor {
            number,
            name: field.name.clone(),
            typ,
            mode,
        });
        number += 1;
    }

    TableDescriptor { field_descriptors }
}

/// Rejects a chunk that made no progress.
///
/// [`StorageApi::create_rows`] returns zero processed rows when the first
/// pending row alone exceeds the size limit, so retrying the chunk would spin
/// forever on the same row.
fn ensure_chunk_progress(num_processed_rows: usize, table: &TableSpec) -> SignalsResult<()> {
    if num_processed_rows == 0 {
        return Err(signals_error!(
            ErrorKind::InvalidData,
            "Signal row exceeds the maximum append request size",
            format!("a single row for `{table}` does not fit into {MAX_SIZE_BYTES} bytes")
        ));
    }

    Ok(())
}

/// Reads a string column from the current result set row.
fn get_string_column(
    result_set: &mut ResultSet,
    table: &TableSpec,
    column: &'static str,
) -> SignalsResult<String> {
    result_set
        .get_string_by_name(column)
        .map_err(query_error(table, "Failed to read destination table schema"))?
        .ok_or_else(|| {
            signals_error!(
                ErrorKind::DestinationQueryFailed,
                "Destination schema query returned a null column",
                column
            )
        })
}

/// Maps a [`BQError`] into a destination connection error.
fn connection_error(err: BQError) -> crate::error::SignalsError {
    signals_error!(
        ErrorKind::DestinationConnectionFailed,
        "Failed to connect to BigQuery",
        source: err
    )
}

/// Returns a closure mapping a [`BQError`] into a destination query error.
fn query_error(
    table: &TableSpec,
    description: &'static str,
) -> impl FnOnce(BQError) -> crate::error::SignalsError {
    let table = table.to_string();
    move |err| signals_error!(ErrorKind::DestinationQueryFailed, description, table, source: err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::signal_row_schema;
    use bytes::Bytes;
    use prost::Message;

    #[test]
    fn bigquery_row_encodes_id_and_payload() {
        let row = BigQueryRow(SignalRow {
            id: 42,
            payload: Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef]),
        });

        let encoded = row.encode_to_vec();

        // Field 1, varint 42; field 2, 4 bytes of payload.
        assert_eq!(
            encoded,
            vec![0x08, 0x2a, 0x12, 0x04, 0xde, 0xad, 0xbe, 0xef]
        );
        assert_eq!(row.encoded_len(), encoded.len());
    }

    #[test]
    fn table_descriptor_matches_row_encoding() {
        let descriptor = table_descriptor(&signal_row_schema());

        assert_eq!(descriptor.field_descriptors.len(), 2);

        let id = &descriptor.field_descriptors[0];
        assert_eq!(id.number, 1);
        assert_eq!(id.name, "id");

        let payload = &descriptor.field_descriptors[1];
        assert_eq!(payload.number, 2);
        assert_eq!(payload.name, "payload");
    }

    #[test]
    fn columns_spec_declares_required_fields() {
        let spec = create_columns_spec(&signal_row_schema());

        assert_eq!(spec, "(`id` int64 not null,`payload` bytes not null)");
    }

    #[test]
    fn oversized_row_fails_instead_of_stalling() {
        let table = TableSpec::signals_persist("tapglue-signals").unwrap();

        let err = ensure_chunk_progress(0, &table).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);

        assert!(ensure_chunk_progress(1, &table).is_ok());
    }
}
