use bytes::Bytes;

/// The two-field projection of a signal written to the destination table.
///
/// `payload` always holds the full original wire encoding of the signal, which
/// keeps the destination a lossless archive even though the declared schema
/// looks narrow. Rows are created once per signal and discarded after the
/// append returns.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalRow {
    /// Integer identifier, copied from the signal.
    pub id: i64,
    /// Raw bytes of the original encoded signal.
    pub payload: Bytes,
}
