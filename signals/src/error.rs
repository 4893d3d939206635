//! Error types and result definitions for the signals pipeline.
//!
//! Provides a kind-classified error type with captured location and optional source
//! error. Startup failures (configuration, schema) carry enough detail to explain
//! why the process refuses to run; steady-state failures are classified so callers
//! can decide whether they are worth retrying.

use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for pipeline operations using [`SignalsError`] as the error type.
pub type SignalsResult<T> = Result<T, SignalsError>;

/// Specific categories of errors that can occur in the pipeline.
///
/// Error kinds are organized by functional area. Configuration and schema kinds are
/// fatal at startup; the remaining kinds surface during steady-state operation and
/// are handled (retried, skipped, or logged) by the component that owns them.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Startup errors.
    ConfigError,
    SchemaMismatch,
    DestinationTableInvalid,

    // Source errors.
    SourceConnectionFailed,
    SourceReadFailed,
    DecodeError,

    // Destination errors.
    DestinationConnectionFailed,
    DestinationQueryFailed,

    // Data errors.
    InvalidData,

    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::ConfigError => "config_error",
            ErrorKind::SchemaMismatch => "schema_mismatch",
            ErrorKind::DestinationTableInvalid => "destination_table_invalid",
            ErrorKind::SourceConnectionFailed => "source_connection_failed",
            ErrorKind::SourceReadFailed => "source_read_failed",
            ErrorKind::DecodeError => "decode_error",
            ErrorKind::DestinationConnectionFailed => "destination_connection_failed",
            ErrorKind::DestinationQueryFailed => "destination_query_failed",
            ErrorKind::InvalidData => "invalid_data",
            ErrorKind::Unknown => "unknown",
        };

        f.write_str(name)
    }
}

/// Main error type for pipeline operations.
///
/// Carries a static description, an optional dynamic detail, an optional source
/// error, and the code location at which it was created. Construction usually goes
/// through the [`crate::signals_error!`] and [`crate::bail!`] macros.
#[derive(Debug, Clone)]
pub struct SignalsError {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
}

impl SignalsError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the static description of this error.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the dynamic detail of this error, if any.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Returns the location at which this error was created.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Attaches a source error, preserving kind, description, and detail.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }
}

impl fmt::Display for SignalsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description, self.kind)?;

        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }

        if let Some(source) = &self.source {
            write!(f, " (caused by: {source})")?;
        }

        Ok(())
    }
}

impl error::Error for SignalsError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn error::Error + 'static))
    }
}

impl From<(ErrorKind, &'static str)> for SignalsError {
    #[track_caller]
    fn from((kind, description): (ErrorKind, &'static str)) -> Self {
        Self {
            kind,
            description: Cow::Borrowed(description),
            detail: None,
            source: None,
            location: Location::caller(),
        }
    }
}

impl From<(ErrorKind, &'static str, String)> for SignalsError {
    #[track_caller]
    fn from((kind, description, detail): (ErrorKind, &'static str, String)) -> Self {
        Self {
            kind,
            description: Cow::Borrowed(description),
            detail: Some(Cow::Owned(detail)),
            source: None,
            location: Location::caller(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_exposes_kind_and_description() {
        let err = SignalsError::from((ErrorKind::ConfigError, "Missing project"));

        assert_eq!(err.kind(), ErrorKind::ConfigError);
        assert_eq!(err.description(), "Missing project");
        assert!(err.detail().is_none());
    }

    #[test]
    fn error_display_includes_detail_and_source() {
        let io_err = std::io::Error::other("boom");
        let err = SignalsError::from((
            ErrorKind::DestinationQueryFailed,
            "Append failed",
            "table `t`".to_string(),
        ))
        .with_source(io_err);

        let rendered = err.to_string();
        assert!(rendered.contains("Append failed"));
        assert!(rendered.contains("table `t`"));
        assert!(rendered.contains("boom"));
    }
}
