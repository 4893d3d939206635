use std::collections::VecDeque;
use std::future::pending;

use tracing::info;

use crate::error::SignalsResult;
use crate::source::SignalSource;
use crate::types::ReceivedSignal;

/// In-memory source for testing and development purposes.
///
/// Replays a scripted sequence of batches. Once the script is exhausted the
/// source pends forever, matching the streaming semantics of a real subscription
/// that currently has nothing to deliver.
#[derive(Debug)]
pub struct MemorySource {
    batches: VecDeque<Vec<ReceivedSignal>>,
}

impl MemorySource {
    /// Creates a source that replays the given batches in order.
    pub fn new(batches: Vec<Vec<ReceivedSignal>>) -> Self {
        Self {
            batches: batches.into(),
        }
    }

    /// Creates a source with nothing to deliver.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

impl SignalSource for MemorySource {
    fn name() -> &'static str {
        "memory"
    }

    async fn next_batch(&mut self) -> SignalsResult<Vec<ReceivedSignal>> {
        match self.batches.pop_front() {
            Some(batch) => Ok(batch),
            None => {
                info!("memory source script exhausted, pending until shutdown");
                pending().await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Signal;
    use bytes::Bytes;
    use prost::Message;
    use std::collections::HashMap;
    use std::time::Duration;

    fn received(id: i64) -> ReceivedSignal {
        let signal = Signal {
            id,
            event: "test".to_string(),
            occurred_at_ms: 0,
            attributes: HashMap::new(),
        };
        let raw = Bytes::from(signal.encode_to_vec());

        ReceivedSignal { signal, raw }
    }

    #[tokio::test]
    async fn replays_batches_in_order() {
        let mut source = MemorySource::new(vec![
            vec![received(1), received(2)],
            vec![received(3)],
        ]);

        let first = source.next_batch().await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].signal.id, 1);

        let second = source.next_batch().await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].signal.id, 3);
    }

    #[tokio::test]
    async fn pends_after_exhaustion() {
        let mut source = MemorySource::empty();

        let timed_out = tokio::time::timeout(Duration::from_millis(20), source.next_batch())
            .await
            .is_err();

        assert!(timed_out);
    }
}
