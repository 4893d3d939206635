use crate::types::{ReceivedSignal, SignalRow};

/// Converts one received signal into exactly one destination row.
///
/// Pure, stateless, and re-entrant: the execution engine may invoke this
/// concurrently and redundantly for the same signal (speculative retries), so it
/// must not branch on content or touch shared state. The id is copied as-is, with
/// no range validation, and the payload is the original wire encoding of the
/// signal, not a re-serialization.
pub fn signal_to_row(received: &ReceivedSignal) -> SignalRow {
    SignalRow {
        id: received.signal.id,
        payload: received.raw.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Signal;
    use bytes::Bytes;
    use prost::Message;
    use std::collections::HashMap;

    fn received(id: i64) -> ReceivedSignal {
        let signal = Signal {
            id,
            event: "app.opened".to_string(),
            occurred_at_ms: 1_462_300_800_000,
            attributes: HashMap::from([("platform".to_string(), "ios".to_string())]),
        };
        let raw = Bytes::from(signal.encode_to_vec());

        ReceivedSignal { signal, raw }
    }

    #[test]
    fn row_projects_id_and_raw_payload() {
        let received = received(42);

        let row = signal_to_row(&received);

        assert_eq!(row.id, 42);
        assert_eq!(row.payload, received.raw);
    }

    #[test]
    fn payload_round_trips_to_the_original_signal() {
        let received = received(7);

        let row = signal_to_row(&received);
        let decoded = Signal::decode(row.payload).unwrap();

        assert_eq!(decoded, received.signal);
    }

    #[test]
    fn conversion_is_idempotent() {
        let received = received(42);

        let first = signal_to_row(&received);
        let second = signal_to_row(&received);

        assert_eq!(first, second);
    }

    #[test]
    fn degenerate_ids_still_convert() {
        for id in [0, -1, i64::MIN, i64::MAX] {
            let received = received(id);
            let row = signal_to_row(&received);
            assert_eq!(row.id, id);
        }
    }
}
