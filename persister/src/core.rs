use std::sync::Once;

use config::shared::{DestinationConfig, PersisterConfig, PipelineConfig, SourceConfig};
use secrecy::{ExposeSecret, SecretString};
use signals::destination::bigquery::BigQueryDestination;
use signals::destination::{Destination, MemoryDestination};
use signals::pipeline::Pipeline;
use signals::source::pubsub::{PubSubSource, subscription_for_topic};
use signals::source::{MemorySource, SignalSource, resolve_topic};
use tracing::{error, info, warn};

static INIT_CRYPTO: Once = Once::new();

/// Installs the default TLS crypto provider for the process.
///
/// Required before any TLS connection is opened by the Pub/Sub or BigQuery
/// clients. Installing twice is a hard failure in rustls, hence the `Once`.
fn install_crypto_provider() {
    INIT_CRYPTO.call_once(|| {
        rustls::crypto::aws_lc_rs::default_provider()
            .install_default()
            .expect("failed to install default crypto provider");
    });
}

// Macro to statically dispatch pipeline creation and starting
macro_rules! start_pipeline_dispatch {
    ($pipeline_config:expr, $source:expr, $destination:expr) => {{
        let pipeline = Pipeline::new($pipeline_config, $source, $destination);
        start_pipeline(pipeline).await
    }};
}

/// Assembles and runs the pipeline described by the given configuration.
///
/// Runs until the pipeline completes, which for streaming sources only happens
/// on shutdown or on an unrecoverable error.
pub async fn start_persister_with_config(config: PersisterConfig) -> anyhow::Result<()> {
    let PersisterConfig {
        pipeline: pipeline_config,
        source,
        destination,
    } = config;

    // For each source and destination pair, we start the pipeline. This is more
    // verbose due to static dispatch, but we prefer more performance at the cost
    // of ergonomics.
    match (source, destination) {
        (SourceConfig::Memory, DestinationConfig::Memory) => {
            let source = MemorySource::empty();
            let destination = MemoryDestination::new();

            start_pipeline_dispatch!(pipeline_config, source, destination)?;
        }
        (
            SourceConfig::Memory,
            DestinationConfig::BigQuery {
                service_account_key,
            },
        ) => {
            install_crypto_provider();
            let source = MemorySource::empty();
            let destination =
                BigQueryDestination::new_with_key(service_account_key.expose_secret()).await?;

            start_pipeline_dispatch!(pipeline_config, source, destination)?;
        }
        (
            SourceConfig::PubSub {
                subscription,
                service_account_key,
            },
            DestinationConfig::Memory,
        ) => {
            install_crypto_provider();
            let source =
                build_pubsub_source(&pipeline_config, subscription, &service_account_key).await?;
            let destination = MemoryDestination::new();

            start_pipeline_dispatch!(pipeline_config, source, destination)?;
        }
        (
            SourceConfig::PubSub {
                subscription,
                service_account_key,
            },
            DestinationConfig::BigQuery {
                service_account_key: destination_key,
            },
        ) => {
            install_crypto_provider();
            let source =
                build_pubsub_source(&pipeline_config, subscription, &service_account_key).await?;
            let destination = BigQueryDestination::new_with_key(destination_key.expose_secret()).await?;

            start_pipeline_dispatch!(pipeline_config, source, destination)?;
        }
    }

    Ok(())
}

/// Builds the Pub/Sub source for the configured topic.
///
/// An explicit subscription wins; otherwise the subscription name is derived
/// from the resolved topic.
async fn build_pubsub_source(
    pipeline_config: &PipelineConfig,
    subscription: Option<String>,
    service_account_key: &SecretString,
) -> anyhow::Result<PubSubSource> {
    let topic = resolve_topic(pipeline_config.topic.as_deref());
    let subscription = subscription.unwrap_or_else(|| subscription_for_topic(&topic));

    info!(topic = %topic, subscription = %subscription, "binding pub/sub source");

    let source = PubSubSource::new_with_key(
        subscription,
        service_account_key.expose_secret(),
        pipeline_config.batch.clone(),
    )
    .await?;

    Ok(source)
}

async fn start_pipeline<S, D>(mut pipeline: Pipeline<S, D>) -> anyhow::Result<()>
where
    S: SignalSource + Send + 'static,
    D: Destination + Clone + Send + Sync + 'static,
{
    // Start the pipeline.
    pipeline.start().await?;

    // Spawn a task to listen for Ctrl+C and trigger shutdown.
    let shutdown_tx = pipeline.shutdown_tx();
    let shutdown_handle = tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {:?}", e);
            return;
        }

        info!("Ctrl+C received, shutting down pipeline...");
        if let Err(e) = shutdown_tx.shutdown() {
            warn!("Failed to send shutdown signal: {:?}", e);
        }
    });

    // Wait for the pipeline to finish (either normally or via shutdown).
    let result = pipeline.wait().await;

    // Ensure the shutdown task is finished before returning. If the pipeline
    // finished before Ctrl+C, the task is still waiting and must be aborted.
    shutdown_handle.abort();
    let _ = shutdown_handle.await;

    // Propagate any pipeline error as anyhow error.
    result?;

    Ok(())
}
