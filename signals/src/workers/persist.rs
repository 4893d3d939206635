use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::concurrency::shutdown::ShutdownRx;
use crate::conversions::signal_to_row;
use crate::destination::Destination;
use crate::error::{ErrorKind, SignalsResult};
use crate::schema::TableSpec;
use crate::signals_error;
use crate::source::SignalSource;
use crate::workers::base::{Worker, WorkerHandle};

/// Worker that moves signals from a source into a destination.
///
/// The persist worker runs the core loop of the pipeline: read a batch of
/// signals, convert each one to a row, append the rows to the destination
/// table. It runs until a shutdown signal is received.
#[derive(Debug)]
pub struct PersistWorker<S, D> {
    source: S,
    destination: D,
    table: TableSpec,
    shutdown_rx: ShutdownRx,
}

impl<S, D> PersistWorker<S, D> {
    pub fn new(source: S, destination: D, table: TableSpec, shutdown_rx: ShutdownRx) -> Self {
        Self {
            source,
            destination,
            table,
            shutdown_rx,
        }
    }
}

impl<S, D> Worker<PersistWorkerHandle> for PersistWorker<S, D>
where
    S: SignalSource + Send + 'static,
    D: Destination + Send + Sync + 'static,
{
    type Error = crate::error::SignalsError;

    async fn start(mut self) -> Result<PersistWorkerHandle, Self::Error> {
        info!(source = S::name(), destination = D::name(), table = %self.table, "starting persist worker");

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    // Shutdown wins over a pending batch. Unconverted signals stay
                    // unacknowledged at the source and will be redelivered.
                    _ = self.shutdown_rx.changed() => {
                        info!("shutting down persist worker");

                        return Ok(());
                    }

                    batch = self.source.next_batch() => {
                        let signals = batch?;
                        if signals.is_empty() {
                            continue;
                        }

                        debug!(signals = signals.len(), "received batch of signals");

                        let rows = signals.iter().map(signal_to_row).collect();

                        self.destination.append_rows(&self.table, rows).await?;
                    }
                }
            }
        });

        Ok(PersistWorkerHandle { handle })
    }
}

/// Handle to a running [`PersistWorker`].
#[derive(Debug)]
pub struct PersistWorkerHandle {
    handle: JoinHandle<SignalsResult<()>>,
}

impl WorkerHandle for PersistWorkerHandle {
    async fn wait(self) -> SignalsResult<()> {
        match self.handle.await {
            Ok(result) => {
                if let Err(err) = &result {
                    error!(kind = %err.kind(), "persist worker failed: {err}");
                }

                result
            }
            Err(err) => Err(signals_error!(
                ErrorKind::Unknown,
                "Persist worker task panicked or was aborted",
                source: err
            )),
        }
    }
}
