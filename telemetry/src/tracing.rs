use config::Environment;
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Default filter directive applied when `RUST_LOG` is unset.
const DEFAULT_LOG_DIRECTIVE: &str = "info";

/// Errors that can occur while initializing tracing.
#[derive(Debug, Error)]
pub enum InitTracingError {
    /// The runtime environment could not be determined.
    #[error("failed to determine runtime environment: {0}")]
    Environment(#[from] std::io::Error),

    /// A global subscriber was already installed.
    #[error("failed to install tracing subscriber: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),
}

/// Initializes the global tracing subscriber for a service.
///
/// Respects `RUST_LOG` for filtering and falls back to `info`. In the dev
/// environment logs are human-readable; in prod they are emitted as JSON,
/// one object per line, with the service name attached to every event.
pub fn init_tracing(service_name: &str) -> Result<(), InitTracingError> {
    let environment = Environment::load()?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_DIRECTIVE.into());

    let fmt_layer = if environment.is_prod() {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::info!(service = service_name, %environment, "tracing initialized");

    Ok(())
}
