use std::future::Future;

use crate::error::SignalsResult;
use crate::types::ReceivedSignal;

/// Trait for systems that emit decoded signals to the pipeline.
///
/// A source wraps a subscription to the message bus. Batching behavior (size and
/// fill time) is the source's concern; the pipeline only loops over batches.
/// Implementations acknowledge consumed messages on their own schedule, so a
/// restart may redeliver signals that were already persisted. The pipeline
/// tolerates that: downstream consumers must accept duplicate rows.
pub trait SignalSource {
    /// Returns the name of the source.
    fn name() -> &'static str;

    /// Waits for and returns the next batch of signals.
    ///
    /// An empty batch is allowed and means the source currently has nothing to
    /// hand over. The future may pend indefinitely; the pipeline races it against
    /// its shutdown signal.
    fn next_batch(&mut self) -> impl Future<Output = SignalsResult<Vec<ReceivedSignal>>> + Send;
}
