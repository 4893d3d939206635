//! Destination schema definition and table naming.
//!
//! The schema of the destination table is static and versionless: two required
//! fields, `id: INTEGER` and `payload: BYTES`. Changing it means redeploying the
//! whole pipeline, there is no migration path.

mod fields;
mod table;

pub use fields::{FieldMode, FieldSchema, FieldType, TableSchema, signal_row_schema};
pub use table::{SIGNALS_DATASET_ID, SIGNALS_TABLE_ID, TableSpec};
