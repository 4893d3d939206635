use config::shared::PipelineConfig;
use tracing::{error, info};

use crate::concurrency::shutdown::{ShutdownRx, ShutdownTx, create_shutdown_channel};
use crate::destination::Destination;
use crate::error::{ErrorKind, SignalsResult};
use crate::schema::{TableSpec, signal_row_schema};
use crate::signals_error;
use crate::source::{SignalSource, resolve_topic};
use crate::workers::base::{Worker, WorkerHandle};
use crate::workers::persist::{PersistWorker, PersistWorkerHandle};

#[derive(Debug)]
enum PipelineState {
    NotStarted,
    Started { persist_worker: PersistWorkerHandle },
}

/// Streaming pipeline that persists signals from a source into a destination.
///
/// The pipeline owns the end-to-end chain: it resolves the destination table from
/// its configuration, prepares the table at the destination, and hands the source
/// to a background persist worker. From then on the worker runs indefinitely,
/// converting every signal to a row and appending it, until shutdown is requested
/// or an unrecoverable error occurs.
#[derive(Debug)]
pub struct Pipeline<S, D> {
    config: PipelineConfig,
    source: Option<S>,
    destination: D,
    state: PipelineState,
    shutdown_tx: ShutdownTx,
    shutdown_rx: ShutdownRx,
}

impl<S, D> Pipeline<S, D>
where
    S: SignalSource + Send + 'static,
    D: Destination + Clone + Send + Sync + 'static,
{
    /// Creates a new pipeline from configuration, a source, and a destination.
    ///
    /// Nothing runs until [`Pipeline::start`] is called.
    pub fn new(config: PipelineConfig, source: S, destination: D) -> Self {
        // The receiver is kept from channel creation so that a shutdown issued
        // before `start` is still observed by the worker.
        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();

        Self {
            config,
            source: Some(source),
            destination,
            state: PipelineState::NotStarted,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Returns a clone of the shutdown transmitter.
    ///
    /// Useful for wiring the pipeline to external shutdown triggers such as
    /// process signal handlers.
    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    /// Starts the pipeline.
    ///
    /// Validates the configuration, resolves and prepares the destination table,
    /// and spawns the persist worker. Errors surfaced here are startup errors:
    /// an invalid configuration, an unreachable destination, or an existing
    /// table whose schema does not accommodate signal rows. Callers are expected
    /// to treat them as fatal.
    pub async fn start(&mut self) -> SignalsResult<()> {
        let Some(source) = self.source.take() else {
            return Err(signals_error!(
                ErrorKind::ConfigError,
                "Pipeline was already started"
            ));
        };

        self.config
            .validate()
            .map_err(|err| signals_error!(ErrorKind::ConfigError, "Invalid pipeline configuration", source: err))?;

        let topic = resolve_topic(self.config.topic.as_deref());
        let table = TableSpec::signals_persist(&self.config.project)?;

        info!(
            topic = topic.as_str(),
            table = %table,
            source = S::name(),
            destination = D::name(),
            "starting signals pipeline"
        );

        // The table is created when missing and verified when present. Existing
        // rows are never touched; the pipeline only ever appends.
        self.destination
            .prepare(&table, &signal_row_schema())
            .await?;

        let persist_worker = PersistWorker::new(
            source,
            self.destination.clone(),
            table,
            self.shutdown_rx.clone(),
        )
        .start()
        .await?;

        self.state = PipelineState::Started { persist_worker };

        Ok(())
    }

    /// Waits for the pipeline to complete.
    ///
    /// Returns once the persist worker has stopped, either because shutdown was
    /// requested or because it failed. Waiting on a pipeline that was never
    /// started returns immediately.
    pub async fn wait(self) -> SignalsResult<()> {
        let PipelineState::Started { persist_worker } = self.state else {
            info!("pipeline was not started, nothing to wait for");

            return Ok(());
        };

        info!("waiting for persist worker to complete");

        persist_worker.wait().await
    }

    /// Requests a graceful shutdown of the pipeline.
    ///
    /// The persist worker finishes its in-flight batch and stops. Use
    /// [`Pipeline::wait`] to observe completion.
    pub fn shutdown(&self) {
        info!("trying to shut down the pipeline");

        if let Err(err) = self.shutdown_tx.shutdown() {
            error!("failed to send shutdown signal to the pipeline: {}", err);
            return;
        }

        info!("shutdown signal successfully sent to the persist worker");
    }

    /// Shuts the pipeline down and waits for it to complete.
    pub async fn shutdown_and_wait(self) -> SignalsResult<()> {
        self.shutdown();
        self.wait().await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use bytes::Bytes;
    use config::shared::{BatchConfig, PipelineConfig};
    use prost::Message;

    use super::*;
    use crate::destination::MemoryDestination;
    use crate::source::MemorySource;
    use crate::types::{ReceivedSignal, Signal};

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            project: "tapglue-signals".to_string(),
            topic: None,
            batch: BatchConfig::default(),
        }
    }

    fn received(id: i64) -> ReceivedSignal {
        let signal = Signal {
            id,
            event: "app.install".to_string(),
            occurred_at_ms: 1_500_000_000_000,
            attributes: HashMap::new(),
        };
        let raw = Bytes::from(signal.encode_to_vec());

        ReceivedSignal { signal, raw }
    }

    async fn wait_for_rows(destination: &MemoryDestination, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if destination.rows().await.len() >= count {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("destination did not receive the expected rows in time");
    }

    #[tokio::test]
    async fn persists_signals_as_rows() {
        let source = MemorySource::new(vec![vec![received(1), received(2)], vec![received(3)]]);
        let destination = MemoryDestination::new();

        let mut pipeline = Pipeline::new(test_config(), source, destination.clone());
        pipeline.start().await.unwrap();

        wait_for_rows(&destination, 3).await;
        pipeline.shutdown_and_wait().await.unwrap();

        let rows = destination.rows().await;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].id, 1);
        assert_eq!(rows[2].id, 3);

        // The payload column carries the signal exactly as it arrived.
        assert_eq!(rows[0].payload, received(1).raw);
    }

    #[tokio::test]
    async fn prepares_destination_table_on_start() {
        let source = MemorySource::empty();
        let destination = MemoryDestination::new();

        let mut pipeline = Pipeline::new(test_config(), source, destination.clone());
        pipeline.start().await.unwrap();
        pipeline.shutdown_and_wait().await.unwrap();

        let (table, schema) = destination.prepared().await.unwrap();
        assert_eq!(table.to_string(), "tapglue-signals:signals_persist.all");
        assert!(schema.is_satisfied_by(&signal_row_schema()));
    }

    #[tokio::test]
    async fn restart_appends_to_existing_rows() {
        let destination = MemoryDestination::new();

        let source = MemorySource::new(vec![vec![received(1), received(2)]]);
        let mut pipeline = Pipeline::new(test_config(), source, destination.clone());
        pipeline.start().await.unwrap();
        wait_for_rows(&destination, 2).await;
        pipeline.shutdown_and_wait().await.unwrap();

        // A second run against the same destination must keep the first run's rows.
        let source = MemorySource::new(vec![vec![received(3)]]);
        let mut pipeline = Pipeline::new(test_config(), source, destination.clone());
        pipeline.start().await.unwrap();
        wait_for_rows(&destination, 3).await;
        pipeline.shutdown_and_wait().await.unwrap();

        assert_eq!(destination.rows().await.len(), 3);
    }

    #[tokio::test]
    async fn start_fails_on_invalid_config() {
        let config = PipelineConfig {
            project: String::new(),
            topic: None,
            batch: BatchConfig::default(),
        };

        let mut pipeline = Pipeline::new(config, MemorySource::empty(), MemoryDestination::new());
        let err = pipeline.start().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }

    #[tokio::test]
    async fn start_twice_fails() {
        let mut pipeline = Pipeline::new(
            test_config(),
            MemorySource::empty(),
            MemoryDestination::new(),
        );

        pipeline.start().await.unwrap();
        let err = pipeline.start().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigError);

        pipeline.shutdown_and_wait().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_before_start_is_not_lost() {
        let source = MemorySource::empty();
        let destination = MemoryDestination::new();

        let mut pipeline = Pipeline::new(test_config(), source, destination.clone());
        pipeline.shutdown();
        pipeline.start().await.unwrap();

        // The worker must observe the earlier shutdown and stop on its own.
        tokio::time::timeout(Duration::from_secs(5), pipeline.wait())
            .await
            .expect("pipeline did not observe the pre-start shutdown")
            .unwrap();
    }

    #[tokio::test]
    async fn wait_without_start_returns_immediately() {
        let pipeline = Pipeline::new(
            test_config(),
            MemorySource::empty(),
            MemoryDestination::new(),
        );

        pipeline.wait().await.unwrap();
    }
}
