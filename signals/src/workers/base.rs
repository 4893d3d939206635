use std::future::Future;

use crate::error::SignalsResult;

/// Trait for background workers in the pipeline.
///
/// Workers return handles that can be used to wait for completion. Starting a
/// worker begins background processing and returns immediately.
pub trait Worker<H>
where
    H: WorkerHandle,
{
    /// Error type returned when worker startup fails.
    type Error;

    /// Starts the worker and returns a handle for monitoring its execution.
    fn start(self) -> impl Future<Output = Result<H, Self::Error>> + Send;
}

/// Handle for waiting on a running worker.
pub trait WorkerHandle {
    /// Waits for the worker to complete and returns the final result.
    ///
    /// Blocks until the worker finishes, which for the persist worker normally
    /// means a shutdown was requested. The handle is consumed by this operation.
    fn wait(self) -> impl Future<Output = SignalsResult<()>> + Send;
}
