//! Signals persister service binary.
//!
//! Loads configuration, initializes tracing, starts the async runtime, and runs
//! the signals persistence pipeline until shutdown. Startup errors (invalid
//! configuration, unreachable destination, incompatible destination schema) are
//! fatal and terminate the process with a non-zero exit code.

use crate::config::load_persister_config;
use crate::core::start_persister_with_config;

use telemetry::init_tracing;

mod config;
mod core;

fn main() -> anyhow::Result<()> {
    let persister_config = load_persister_config()?;

    init_tracing(env!("CARGO_BIN_NAME"))?;

    // We start the runtime.
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(start_persister_with_config(persister_config))?;

    Ok(())
}
