use std::future::Future;

use crate::error::SignalsResult;
use crate::schema::{TableSchema, TableSpec};
use crate::types::SignalRow;

/// Trait for systems that can receive signal rows from the pipeline.
///
/// A destination is an append-only analytical table endpoint. Implementations
/// must honor two write dispositions:
///
/// - Create: [`Destination::prepare`] creates the table from the declared schema
///   when it is absent and verifies compatibility when it exists. It never drops,
///   truncates, or replaces an existing table.
/// - Append: [`Destination::append_rows`] only ever adds rows. Existing rows are
///   never mutated or deleted, so a redelivered signal shows up as a duplicate
///   row rather than an overwrite.
///
/// Appends may be retried by the caller or by the implementation, so they should
/// be safe to repeat (at the cost of duplicate rows, which are tolerated).
pub trait Destination {
    /// Returns the name of the destination.
    fn name() -> &'static str;

    /// Prepares the destination table for appends.
    ///
    /// Called exactly once at pipeline startup. A schema incompatible with the
    /// declared one is a fatal error here, not a per-row error later.
    fn prepare(
        &self,
        table: &TableSpec,
        schema: &TableSchema,
    ) -> impl Future<Output = SignalsResult<()>> + Send;

    /// Appends a batch of signal rows to the destination table.
    fn append_rows(
        &self,
        table: &TableSpec,
        rows: Vec<SignalRow>,
    ) -> impl Future<Output = SignalsResult<()>> + Send;
}
