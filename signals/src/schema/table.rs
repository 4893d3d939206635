use std::fmt;

use crate::error::{ErrorKind, SignalsResult};
use crate::signals_error;

/// Dataset under which all signal rows are persisted.
pub const SIGNALS_DATASET_ID: &str = "signals_persist";

/// Table holding all signal rows, not sharded by content.
pub const SIGNALS_TABLE_ID: &str = "all";

/// Fully-qualified identifier of the destination table.
///
/// Constant for the lifetime of one pipeline run; every signal lands in this one
/// table. The display form is `{project}:{dataset}.{table}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableSpec {
    project: String,
    dataset: String,
    table: String,
}

impl TableSpec {
    /// Creates a table spec after validating each identifier segment.
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> SignalsResult<Self> {
        let project = sanitize_segment(project.into(), "project")?;
        let dataset = sanitize_segment(dataset.into(), "dataset")?;
        let table = sanitize_segment(table.into(), "table")?;

        Ok(Self {
            project,
            dataset,
            table,
        })
    }

    /// Returns the destination table spec for signal persistence under a project.
    ///
    /// Deterministically `{project}:signals_persist.all` for any valid project.
    pub fn signals_persist(project: impl Into<String>) -> SignalsResult<Self> {
        Self::new(project, SIGNALS_DATASET_ID, SIGNALS_TABLE_ID)
    }

    /// Returns the project segment.
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Returns the dataset segment.
    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    /// Returns the table segment.
    pub fn table(&self) -> &str {
        &self.table
    }
}

impl fmt::Display for TableSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}", self.project, self.dataset, self.table)
    }
}

/// Validates a table spec segment.
///
/// Segments must be non-empty and restricted to alphanumerics, underscores, and
/// hyphens, which rules out identifiers that would need quoting or escaping in
/// destination queries.
fn sanitize_segment(segment: String, what: &'static str) -> SignalsResult<String> {
    if segment.is_empty() {
        return Err(signals_error!(
            ErrorKind::DestinationTableInvalid,
            "Invalid destination table identifier",
            format!("{what} segment must not be empty")
        ));
    }

    if !segment
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(signals_error!(
            ErrorKind::DestinationTableInvalid,
            "Invalid destination table identifier",
            format!("{what} segment `{segment}` contains unsupported characters")
        ));
    }

    Ok(segment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signals_persist_formats_deterministically() {
        let spec = TableSpec::signals_persist("tapglue-signals").unwrap();

        assert_eq!(spec.to_string(), "tapglue-signals:signals_persist.all");
        assert_eq!(spec.dataset(), SIGNALS_DATASET_ID);
        assert_eq!(spec.table(), SIGNALS_TABLE_ID);
    }

    #[test]
    fn rejects_empty_project() {
        let err = TableSpec::signals_persist("").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DestinationTableInvalid);
    }

    #[test]
    fn rejects_segments_needing_quoting() {
        assert!(TableSpec::new("proj", "data set", "all").is_err());
        assert!(TableSpec::new("proj", "dataset", "all`; drop").is_err());
        assert!(TableSpec::new("pro:ject", "dataset", "all").is_err());
    }
}
