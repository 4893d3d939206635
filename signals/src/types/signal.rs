use std::collections::HashMap;

use bytes::Bytes;
use prost::Message;

use crate::error::{ErrorKind, SignalsResult};
use crate::signals_error;

/// A binary-encoded event record produced upstream.
///
/// Signals are immutable once created. The only field the pipeline relies on is
/// `id`; the remaining fields travel through untouched inside the raw encoding.
/// No value-range validation is performed on `id`, a degenerate or default id
/// still produces a row downstream.
#[derive(Clone, PartialEq, Message)]
pub struct Signal {
    /// Integer identifier of the event.
    #[prost(int64, tag = "1")]
    pub id: i64,
    /// Name of the event that produced this signal.
    #[prost(string, tag = "2")]
    pub event: String,
    /// Milliseconds since the Unix epoch at which the event occurred.
    #[prost(int64, tag = "3")]
    pub occurred_at_ms: i64,
    /// Free-form event attributes.
    #[prost(map = "string, string", tag = "4")]
    pub attributes: HashMap<String, String>,
}

/// A decoded [`Signal`] paired with the exact bytes it was decoded from.
///
/// Sources hand over both so the destination retains a lossless, replayable copy
/// of every signal. `raw` is always the original wire encoding, never a
/// re-serialization of the decoded value.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedSignal {
    /// The decoded signal.
    pub signal: Signal,
    /// The original encoded bytes of the signal.
    pub raw: Bytes,
}

impl ReceivedSignal {
    /// Decodes a signal from its wire encoding, keeping the raw bytes alongside.
    ///
    /// Decode failures belong to the source that calls this, the row converter
    /// never sees undecodable bytes.
    pub fn decode(raw: Bytes) -> SignalsResult<Self> {
        let signal = Signal::decode(raw.clone()).map_err(|err| {
            signals_error!(
                ErrorKind::DecodeError,
                "Failed to decode signal",
                format!("{} bytes of undecodable signal data", raw.len()),
                source: err
            )
        })?;

        Ok(Self { signal, raw })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_keeps_original_bytes() {
        let signal = Signal {
            id: 42,
            event: "app.opened".to_string(),
            occurred_at_ms: 1_462_300_800_000,
            attributes: HashMap::new(),
        };
        let raw = Bytes::from(signal.encode_to_vec());

        let received = ReceivedSignal::decode(raw.clone()).unwrap();

        assert_eq!(received.signal, signal);
        assert_eq!(received.raw, raw);
    }

    #[test]
    fn decode_rejects_malformed_bytes() {
        let raw = Bytes::from_static(&[0xff, 0xff, 0xff, 0xff]);

        let err = ReceivedSignal::decode(raw).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeError);
    }

    #[test]
    fn decode_accepts_default_id() {
        let signal = Signal {
            id: 0,
            event: String::new(),
            occurred_at_ms: 0,
            attributes: HashMap::new(),
        };
        let raw = Bytes::from(signal.encode_to_vec());

        let received = ReceivedSignal::decode(raw).unwrap();
        assert_eq!(received.signal.id, 0);
    }
}
